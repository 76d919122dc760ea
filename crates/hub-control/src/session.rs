//! Upload session: drives one transfer from first chunk to result.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use printlink_correlator::{Correlator, CorrelatorError, WaitKey};
use printlink_protocol::{CommitMessage, DeviceReply, Topics};
use printlink_transfer::{ChunkPlan, Transfer, TransferState, new_transfer_id, validate_filename};
use printlink_transport::Transport;

use crate::error::ControlError;
use crate::types::{EventCallback, UploadEvent, UploadOptions, UploadOutcome, UploadReport, UploadRequest};

/// Sends files to controllers.
///
/// Chunks of one transfer are published strictly in order, each publish
/// awaited before the next. The commit follows the last chunk, then the
/// session waits for the controller's `upload_result`. Nothing is retried;
/// a retry is a new [`run`](Self::run) with a new transfer id.
pub struct UploadSession {
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    topics: Topics,
    options: UploadOptions,
    cancel: CancellationToken,
    events: Option<EventCallback>,
}

impl UploadSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        correlator: Arc<Correlator>,
        topics: Topics,
        options: UploadOptions,
    ) -> Self {
        Self {
            transport,
            correlator,
            topics,
            options,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Replaces the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: EventCallback) -> Self {
        self.events = Some(events);
        self
    }

    /// Token that cancels this session's uploads.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads one file.
    ///
    /// Returns `Ok` once the controller answered or the deadline passed;
    /// see [`UploadOutcome`]. Transport failures and cancellation are
    /// errors.
    pub async fn run(&self, request: UploadRequest) -> Result<UploadReport, ControlError> {
        validate_filename(&request.filename)?;
        let transfer_id = new_transfer_id();
        let plan = ChunkPlan::new(
            &transfer_id,
            &request.filename,
            request.destination,
            &request.data,
            self.options.chunk_size,
        )?;
        let mut transfer = Transfer::new(
            transfer_id.clone(),
            &request.device_id,
            &request.filename,
            plan.total_size(),
            request.destination,
            self.options.chunk_size,
        );

        info!(
            device = %request.device_id,
            transfer = %transfer_id,
            file = %request.filename,
            bytes = plan.total_size(),
            chunks = plan.chunk_count(),
            "upload started"
        );
        self.emit(&UploadEvent::Started {
            transfer_id: transfer_id.clone(),
            device_id: request.device_id.clone(),
            filename: request.filename.clone(),
            total_size: plan.total_size(),
            chunks: plan.chunk_count(),
        });

        let topic = self.topics.upload(&request.device_id);

        // 1. Chunks, strictly sequential.
        for envelope in plan.envelopes() {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&mut transfer));
            }

            let index = envelope.index;
            let len = envelope.payload_length;
            let payload = serde_json::to_vec(&envelope)?;
            self.publish(&mut transfer, &topic, payload).await?;
            transfer.record_chunk(len)?;

            debug!(
                device = %request.device_id,
                transfer = %transfer_id,
                index,
                sent = transfer.sent_bytes(),
                "published chunk"
            );
            self.emit(&UploadEvent::Progress {
                transfer_id: transfer_id.clone(),
                device_id: request.device_id.clone(),
                sent_bytes: transfer.sent_bytes(),
                total_size: transfer.total_size(),
                percent: transfer.progress(),
            });
        }

        if self.cancel.is_cancelled() {
            return Err(self.cancelled(&mut transfer));
        }

        // 2. Commit. The wait exists before the commit leaves, so a fast
        // controller cannot answer into the void.
        self.set_state(&mut transfer, TransferState::Committing)?;
        let key = WaitKey::transfer(&request.device_id, &transfer_id);
        let mut handle = match &self.events {
            Some(events) => self.correlator.register_with_progress(
                key,
                self.options.result_timeout,
                controller_progress(events.clone()),
            )?,
            None => self.correlator.register(key, self.options.result_timeout)?,
        };

        let commit = serde_json::to_vec(&CommitMessage::new(&transfer_id, request.destination))?;
        self.publish(&mut transfer, &topic, commit).await?;
        self.set_state(&mut transfer, TransferState::AwaitingResult)?;
        debug!(device = %request.device_id, transfer = %transfer_id, "commit published");

        // 3. Result.
        let reply = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            reply = handle.wait() => Some(reply),
        };
        let Some(reply) = reply else {
            handle.abandon();
            return Err(self.cancelled(&mut transfer));
        };

        let outcome = self.settle(&mut transfer, reply)?;

        Ok(UploadReport {
            transfer_id,
            device_id: request.device_id,
            filename: request.filename,
            total_size: transfer.total_size(),
            chunks_sent: transfer.chunks_sent(),
            state: transfer.state(),
            outcome,
        })
    }

    /// Maps the controller's answer onto the transfer's final state.
    ///
    /// Every path leaves the transfer terminal, including replies that
    /// cannot answer an upload.
    fn settle(
        &self,
        transfer: &mut Transfer,
        reply: Result<DeviceReply, CorrelatorError>,
    ) -> Result<UploadOutcome, ControlError> {
        match reply {
            Ok(DeviceReply::UploadResult(result)) if result.success => {
                self.set_state(transfer, TransferState::Succeeded)?;
                info!(device = %transfer.device_id(), transfer = %transfer.transfer_id(), "upload confirmed");
                self.emit(&UploadEvent::Progress {
                    transfer_id: transfer.transfer_id().to_string(),
                    device_id: transfer.device_id().to_string(),
                    sent_bytes: transfer.sent_bytes(),
                    total_size: transfer.total_size(),
                    percent: transfer.progress(),
                });
                Ok(UploadOutcome::Succeeded {
                    filename: result.filename,
                    target: result.target,
                })
            }
            Ok(DeviceReply::UploadResult(result)) => {
                let error = result
                    .error
                    .unwrap_or_else(|| "controller reported failure".to_string());
                warn!(device = %transfer.device_id(), transfer = %transfer.transfer_id(), error = %error, "upload rejected");
                transfer.fail(error.clone())?;
                self.emit_state(transfer);
                Ok(UploadOutcome::Rejected { error })
            }
            Ok(other) => {
                let msg_type = other.msg_type();
                warn!(device = %transfer.device_id(), transfer = %transfer.transfer_id(), ?msg_type, "unexpected reply to upload");
                transfer.fail(format!("unexpected {msg_type:?} reply"))?;
                self.emit_state(transfer);
                Err(ControlError::UnexpectedReply(msg_type))
            }
            Err(CorrelatorError::Timeout(_)) => {
                warn!(device = %transfer.device_id(), transfer = %transfer.transfer_id(), "no confirmation received");
                self.set_state(transfer, TransferState::TimedOut)?;
                Ok(UploadOutcome::Unconfirmed)
            }
            Err(e) => {
                warn!(device = %transfer.device_id(), transfer = %transfer.transfer_id(), error = %e, "result wait failed");
                transfer.fail(e.to_string())?;
                self.emit_state(transfer);
                Err(e.into())
            }
        }
    }

    /// Publishes one message, failing the transfer on transport error.
    async fn publish(
        &self,
        transfer: &mut Transfer,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<(), ControlError> {
        if let Err(e) = self.transport.publish(topic, payload).await {
            warn!(
                device = %transfer.device_id(),
                transfer = %transfer.transfer_id(),
                error = %e,
                "publish failed, aborting upload"
            );
            transfer.fail(e.to_string())?;
            self.emit_state(transfer);
            return Err(e.into());
        }
        Ok(())
    }

    fn set_state(&self, transfer: &mut Transfer, state: TransferState) -> Result<(), ControlError> {
        transfer.advance(state)?;
        self.emit_state(transfer);
        Ok(())
    }

    fn cancelled(&self, transfer: &mut Transfer) -> ControlError {
        info!(device = %transfer.device_id(), transfer = %transfer.transfer_id(), "upload cancelled");
        match self.set_state(transfer, TransferState::Cancelled) {
            Ok(()) => ControlError::Cancelled,
            Err(e) => e,
        }
    }

    fn emit_state(&self, transfer: &Transfer) {
        self.emit(&UploadEvent::StateChanged {
            transfer_id: transfer.transfer_id().to_string(),
            device_id: transfer.device_id().to_string(),
            state: transfer.state(),
        });
    }

    fn emit(&self, event: &UploadEvent) {
        if let Some(events) = &self.events {
            events(event);
        }
    }
}

fn controller_progress(events: EventCallback) -> printlink_correlator::ProgressCallback {
    Arc::new(move |reply: &DeviceReply| {
        if let DeviceReply::UploadProgress(p) = reply {
            events(&UploadEvent::ControllerProgress {
                transfer_id: p.transfer_id.clone(),
                device_id: p.device_id.clone().unwrap_or_default(),
                received_bytes: p.received_bytes,
                percent: p.percent,
            });
        }
    })
}
