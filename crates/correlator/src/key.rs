use std::fmt;

use printlink_protocol::Correlation;

/// Identifies one pending wait: a device plus a transfer or job id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaitKey {
    pub device_id: String,
    pub correlation: Correlation,
}

impl WaitKey {
    pub fn new(device_id: &str, correlation: Correlation) -> Self {
        Self {
            device_id: device_id.to_string(),
            correlation,
        }
    }

    pub fn transfer(device_id: &str, transfer_id: &str) -> Self {
        Self::new(device_id, Correlation::Transfer(transfer_id.to_string()))
    }

    pub fn job(device_id: &str, job_id: &str) -> Self {
        Self::new(device_id, Correlation::Job(job_id.to_string()))
    }
}

impl fmt::Display for WaitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.correlation)
    }
}
