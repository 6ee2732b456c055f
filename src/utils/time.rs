//! Timestamp helpers
//!
//! All persisted timestamps are RFC 3339 strings in UTC; TTL comparisons
//! use unix seconds so SQLite can compare them as plain integers.

use std::time::Duration;

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Current time as unix seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Expiry timestamp (unix seconds) a retention window from now.
pub fn expires_at(retention: Duration) -> i64 {
    now_unix() + retention.as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at_is_in_the_future() {
        let now = now_unix();
        let exp = expires_at(Duration::from_secs(3600));
        assert!(exp >= now + 3599);
    }

    #[test]
    fn test_rfc3339_parses_back() {
        let ts = now_rfc3339();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
