//! MQTT-style topic filters.
//!
//! `+` matches exactly one level, `#` (last level only) matches the rest of
//! the topic including nothing at all.

use crate::TransportError;

/// Checks that wildcards occupy whole levels and `#` is last.
pub fn validate_filter(filter: &str) -> Result<(), TransportError> {
    if filter.is_empty() {
        return Err(TransportError::InvalidFilter("empty filter".into()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        let wild = level.contains('+') || level.contains('#');
        if wild && level.len() != 1 {
            return Err(TransportError::InvalidFilter(format!(
                "wildcard must fill its level: {filter}"
            )));
        }
        if *level == "#" && i != last {
            return Err(TransportError::InvalidFilter(format!(
                "'#' must be the last level: {filter}"
            )));
        }
    }
    Ok(())
}

/// Returns `true` if `topic` matches `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut f = filter.split('/');
    let mut t = topic.split('/');
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(fl), Some(tl)) if fl == tl => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(topic_matches("printers/p1/status", "printers/p1/status"));
        assert!(!topic_matches("printers/p1/status", "printers/p2/status"));
        assert!(!topic_matches("printers/p1", "printers/p1/status"));
        assert!(!topic_matches("printers/p1/status", "printers/p1"));
    }

    #[test]
    fn single_level_wildcard() {
        assert!(topic_matches("printers/+/status", "printers/p1/status"));
        assert!(topic_matches("printers/+/status", "printers/x-9/status"));
        assert!(!topic_matches("printers/+/status", "printers/p1/result"));
        assert!(!topic_matches("printers/+/status", "printers/a/b/status"));
    }

    #[test]
    fn multi_level_wildcard() {
        assert!(topic_matches("printers/#", "printers/p1/status"));
        assert!(topic_matches("printers/#", "printers"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("printers/#", "farm/p1/status"));
    }

    #[test]
    fn validation() {
        assert!(validate_filter("printers/+/status").is_ok());
        assert!(validate_filter("printers/#").is_ok());
        assert!(validate_filter("").is_err());
        assert!(validate_filter("printers/#/status").is_err());
        assert!(validate_filter("printers/p+/status").is_err());
        assert!(validate_filter("printers/a#").is_err());
    }
}
