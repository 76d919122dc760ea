//! Correlated device commands (print, pause, resume, cancel).

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use printlink_correlator::{Correlator, CorrelatorError, ProgressCallback, WaitKey};
use printlink_protocol::{CommandMessage, Destination, DeviceCommand, DeviceReply, Topics};
use printlink_transport::Transport;

use crate::error::ControlError;
use crate::types::{CommandOutcome, CommandReport};

/// Sends commands and waits for each `command_result`.
#[derive(Clone)]
pub struct DeviceCommands {
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    topics: Topics,
    timeout: Duration,
}

impl DeviceCommands {
    pub fn new(
        transport: Arc<dyn Transport>,
        correlator: Arc<Correlator>,
        topics: Topics,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            correlator,
            topics,
            timeout,
        }
    }

    pub async fn send(&self, device_id: &str, command: DeviceCommand) -> Result<CommandReport, ControlError> {
        self.send_inner(device_id, command, None).await
    }

    /// Like [`send`](Self::send), forwarding `command_progress` replies.
    pub async fn send_with_progress(
        &self,
        device_id: &str,
        command: DeviceCommand,
        progress: ProgressCallback,
    ) -> Result<CommandReport, ControlError> {
        self.send_inner(device_id, command, Some(progress)).await
    }

    pub async fn start_print(
        &self,
        device_id: &str,
        filename: &str,
        origin: Destination,
    ) -> Result<CommandReport, ControlError> {
        let command = DeviceCommand::Print {
            filename: filename.to_string(),
            origin,
        };
        self.send(device_id, command).await
    }

    pub async fn pause(&self, device_id: &str) -> Result<CommandReport, ControlError> {
        self.send(device_id, DeviceCommand::Pause).await
    }

    pub async fn resume(&self, device_id: &str) -> Result<CommandReport, ControlError> {
        self.send(device_id, DeviceCommand::Resume).await
    }

    pub async fn cancel(&self, device_id: &str) -> Result<CommandReport, ControlError> {
        self.send(device_id, DeviceCommand::Cancel).await
    }

    async fn send_inner(
        &self,
        device_id: &str,
        command: DeviceCommand,
        progress: Option<ProgressCallback>,
    ) -> Result<CommandReport, ControlError> {
        let job_id = uuid::Uuid::new_v4().simple().to_string();
        let key = WaitKey::job(device_id, &job_id);
        let mut handle = match progress {
            Some(cb) => self.correlator.register_with_progress(key, self.timeout, cb)?,
            None => self.correlator.register(key, self.timeout)?,
        };

        let payload = serde_json::to_vec(&CommandMessage::new(device_id, &job_id, &command))?;
        self.transport
            .publish(&self.topics.command(device_id), payload)
            .await?;
        info!(device = %device_id, job = %job_id, command = command.name(), "command sent");

        let outcome = command_outcome(device_id, &job_id, handle.wait().await)?;

        Ok(CommandReport {
            job_id,
            device_id: device_id.to_string(),
            command,
            outcome,
        })
    }
}

/// Maps the controller's answer for one job.
fn command_outcome(
    device_id: &str,
    job_id: &str,
    reply: Result<DeviceReply, CorrelatorError>,
) -> Result<CommandOutcome, ControlError> {
    match reply {
        Ok(DeviceReply::CommandResult(result)) if result.success => Ok(CommandOutcome::Succeeded),
        Ok(DeviceReply::CommandResult(result)) => {
            let error = result
                .error
                .unwrap_or_else(|| "controller reported failure".to_string());
            warn!(device = %device_id, job = %job_id, error = %error, "command rejected");
            Ok(CommandOutcome::Rejected { error })
        }
        Ok(other) => {
            let msg_type = other.msg_type();
            warn!(device = %device_id, job = %job_id, ?msg_type, "unexpected reply to command");
            Err(ControlError::UnexpectedReply(msg_type))
        }
        Err(CorrelatorError::Timeout(_)) => {
            warn!(device = %device_id, job = %job_id, "no confirmation received");
            Ok(CommandOutcome::Unconfirmed)
        }
        Err(e) => {
            warn!(device = %device_id, job = %job_id, error = %e, "result wait failed");
            Err(e.into())
        }
    }
}
