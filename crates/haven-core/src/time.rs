//! Timestamp helpers.
//!
//! All persisted timestamps are UTC epoch milliseconds stored in INTEGER
//! columns.

use chrono::Utc;

/// Current UTC time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_recent() {
        // Sanity check: after 2024-01-01 and monotonically non-decreasing
        // across two calls.
        let a = now_ms();
        let b = now_ms();
        assert!(a > 1_704_067_200_000);
        assert!(b >= a);
    }
}
