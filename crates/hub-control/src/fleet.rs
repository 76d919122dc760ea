//! Fleet client: the hub's composition root.
//!
//! Owns the transport, the pending-wait table with its scanner and the
//! status fan-in. Uploads and commands are only handed out after
//! [`FleetClient::start`] subscribed to the result and status topics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use printlink_correlator::Correlator;
use printlink_fleet_status::{StatusFanIn, StatusView};
use printlink_protocol::Topics;
use printlink_transport::Transport;

use crate::commands::DeviceCommands;
use crate::error::ControlError;
use crate::session::UploadSession;
use crate::types::{EventCallback, FleetOptions, UploadReport, UploadRequest};

pub struct FleetClient {
    transport: Arc<dyn Transport>,
    topics: Topics,
    options: FleetOptions,
    correlator: Arc<Correlator>,
    status: StatusFanIn,
    cancel: CancellationToken,
    scanner: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl FleetClient {
    pub fn new(transport: Arc<dyn Transport>, options: FleetOptions) -> Self {
        let topics = Topics::new(&options.topic_prefix);
        Self {
            transport,
            correlator: Correlator::new(topics.clone()),
            topics,
            options,
            status: StatusFanIn::new(),
            cancel: CancellationToken::new(),
            scanner: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Connects and subscribes to every device's result and status topics.
    ///
    /// Idempotent: later calls return immediately. A client that was shut
    /// down cannot be started again.
    pub async fn start(&self) -> Result<(), ControlError> {
        let mut scanner = self.scanner.lock().await;
        if scanner.is_some() {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(ControlError::Cancelled);
        }

        self.transport.connect().await?;

        let result_filter = self.topics.result_filter();
        let correlator = self.correlator.clone();
        self.transport
            .subscribe(
                &result_filter,
                Arc::new(move |topic: &str, payload: &[u8]| correlator.on_message(topic, payload)),
            )
            .await?;

        if let Err(e) = self.status.attach(self.transport.as_ref(), &self.topics).await {
            // Leave no half-started state behind for the next attempt.
            if let Err(unsub) = self.transport.unsubscribe(&result_filter).await {
                warn!(error = %unsub, "failed to drop result subscription");
            }
            return Err(e.into());
        }

        *scanner = Some(
            self.correlator
                .spawn_scanner(self.options.scan_interval, self.cancel.child_token()),
        );
        self.started.store(true, Ordering::Release);
        info!(prefix = %self.topics.prefix(), "fleet client started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Read-only view of the fleet status.
    pub fn status(&self) -> StatusView {
        self.status.view()
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// A fresh upload session. Its token is a child of the client's, so
    /// [`shutdown`](Self::shutdown) cancels it too.
    pub fn upload_session(&self) -> Result<UploadSession, ControlError> {
        self.ensure_started()?;
        Ok(UploadSession::new(
            self.transport.clone(),
            self.correlator.clone(),
            self.topics.clone(),
            self.options.upload,
        )
        .with_cancel(self.cancel.child_token()))
    }

    pub async fn upload(
        &self,
        request: UploadRequest,
        events: Option<EventCallback>,
    ) -> Result<UploadReport, ControlError> {
        let mut session = self.upload_session()?;
        if let Some(events) = events {
            session = session.with_events(events);
        }
        session.run(request).await
    }

    /// Runs several uploads concurrently. Results are in request order.
    pub async fn upload_all(
        &self,
        requests: Vec<UploadRequest>,
        events: Option<EventCallback>,
    ) -> Vec<Result<UploadReport, ControlError>> {
        join_all(
            requests
                .into_iter()
                .map(|request| self.upload(request, events.clone())),
        )
        .await
    }

    pub fn commands(&self) -> Result<DeviceCommands, ControlError> {
        self.ensure_started()?;
        Ok(DeviceCommands::new(
            self.transport.clone(),
            self.correlator.clone(),
            self.topics.clone(),
            self.options.command_timeout,
        ))
    }

    /// Cancels running uploads and stops the scanner.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(scanner) = self.scanner.lock().await.take() {
            let _ = scanner.await;
        }
        self.started.store(false, Ordering::Release);
        info!("fleet client stopped");
    }

    fn ensure_started(&self) -> Result<(), ControlError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(ControlError::NotStarted)
        }
    }
}

impl Drop for FleetClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
