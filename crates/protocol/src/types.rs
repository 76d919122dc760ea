use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Storage target on the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Local,
    Sdcard,
}

impl Destination {
    pub fn as_str(self) -> &'static str {
        match self {
            Destination::Local => "local",
            Destination::Sdcard => "sdcard",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Destination::Local),
            "sdcard" | "sd" => Ok(Destination::Sdcard),
            other => Err(ProtocolError::InvalidValue(format!(
                "unknown destination {other:?} (expected local or sdcard)"
            ))),
        }
    }
}

/// What a controller reply correlates to.
///
/// Uploads are keyed by transfer id, every other command by job id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Correlation {
    Transfer(String),
    Job(String),
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Transfer(id) => write!(f, "transfer:{id}"),
            Correlation::Job(id) => write!(f, "job:{id}"),
        }
    }
}

/// A command a client can send to a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Starts printing a file already stored on the controller.
    Print {
        filename: String,
        origin: Destination,
    },
    Pause,
    Resume,
    Cancel,
}

impl DeviceCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::Print { .. } => "print",
            DeviceCommand::Pause => "pause",
            DeviceCommand::Resume => "resume",
            DeviceCommand::Cancel => "cancel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_serialization() {
        assert_eq!(
            serde_json::to_string(&Destination::Sdcard).unwrap(),
            "\"sdcard\""
        );
        let d: Destination = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(d, Destination::Local);
    }

    #[test]
    fn destination_from_str() {
        assert_eq!("SDCARD".parse::<Destination>().unwrap(), Destination::Sdcard);
        assert_eq!("sd".parse::<Destination>().unwrap(), Destination::Sdcard);
        assert_eq!("local".parse::<Destination>().unwrap(), Destination::Local);
        assert!("usb".parse::<Destination>().is_err());
    }

    #[test]
    fn correlation_display() {
        assert_eq!(Correlation::Transfer("t1".into()).to_string(), "transfer:t1");
        assert_eq!(Correlation::Job("j9".into()).to_string(), "job:j9");
    }

    #[test]
    fn correlation_kinds_never_collide() {
        assert_ne!(
            Correlation::Transfer("same".into()),
            Correlation::Job("same".into())
        );
    }
}
