//! Topic naming for the per-device channels.
//!
//! Every controller owns four topics under a shared prefix:
//! `{prefix}/{deviceId}/{upload|command|result|status}`.

use crate::constants::DEFAULT_TOPIC_PREFIX;

const UPLOAD: &str = "upload";
const COMMAND: &str = "command";
const RESULT: &str = "result";
const STATUS: &str = "status";

/// Builds and parses device topics for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

impl Topics {
    /// Creates a topic scheme. Leading/trailing slashes are trimmed.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Chunks and commits for a device.
    pub fn upload(&self, device_id: &str) -> String {
        self.device_topic(device_id, UPLOAD)
    }

    /// Commands for a device.
    pub fn command(&self, device_id: &str) -> String {
        self.device_topic(device_id, COMMAND)
    }

    /// Results published by a device.
    pub fn result(&self, device_id: &str) -> String {
        self.device_topic(device_id, RESULT)
    }

    /// Status heartbeats published by a device.
    pub fn status(&self, device_id: &str) -> String {
        self.device_topic(device_id, STATUS)
    }

    /// Filter matching the result topic of every device.
    pub fn result_filter(&self) -> String {
        self.device_topic("+", RESULT)
    }

    /// Filter matching the status topic of every device.
    pub fn status_filter(&self) -> String {
        self.device_topic("+", STATUS)
    }

    /// Extracts the device id from a topic of this scheme.
    ///
    /// Returns `None` for topics outside the prefix or with an empty
    /// device segment.
    pub fn device_id<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let rest = if self.prefix.is_empty() {
            topic
        } else {
            topic.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?
        };
        let (device, channel) = rest.split_once('/')?;
        if device.is_empty() || channel.contains('/') {
            return None;
        }
        Some(device)
    }

    fn device_topic(&self, device_id: &str, channel: &str) -> String {
        if self.prefix.is_empty() {
            format!("{device_id}/{channel}")
        } else {
            format!("{}/{device_id}/{channel}", self.prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_topics() {
        let t = Topics::default();
        assert_eq!(t.upload("p1"), "printers/p1/upload");
        assert_eq!(t.command("p1"), "printers/p1/command");
        assert_eq!(t.result("p1"), "printers/p1/result");
        assert_eq!(t.status("p1"), "printers/p1/status");
        assert_eq!(t.status_filter(), "printers/+/status");
        assert_eq!(t.result_filter(), "printers/+/result");
    }

    #[test]
    fn prefix_is_trimmed() {
        let t = Topics::new("/farm/east/");
        assert_eq!(t.prefix(), "farm/east");
        assert_eq!(t.status("x"), "farm/east/x/status");
    }

    #[test]
    fn device_id_extraction() {
        let t = Topics::new("farm/east");
        assert_eq!(t.device_id("farm/east/printer-7/status"), Some("printer-7"));
        assert_eq!(t.device_id("farm/east/printer-7/result"), Some("printer-7"));
        assert_eq!(t.device_id("farm/west/printer-7/status"), None);
        assert_eq!(t.device_id("farm/east//status"), None);
        assert_eq!(t.device_id("farm/east/a/b/status"), None);
        assert_eq!(t.device_id("farm/eastern/a/status"), None);
    }

    #[test]
    fn empty_prefix() {
        let t = Topics::new("");
        assert_eq!(t.upload("d"), "d/upload");
        assert_eq!(t.status_filter(), "+/status");
        assert_eq!(t.device_id("d/status"), Some("d"));
    }
}
