//! Retention clock for ephemeral interaction records and recordings

use chrono::{DateTime, Duration, Utc};

pub const RETENTION_DAYS: i64 = 30;

/// 30 days in seconds
pub const EPHEMERAL_TTL_SECONDS: i64 = RETENTION_DAYS * 24 * 60 * 60;

/// Expiry for chat messages and reactions created at `created_at`
pub fn ephemeral_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::seconds(EPHEMERAL_TTL_SECONDS)
}

/// Recordings are kept exactly 30 days past the end of the broadcast
pub fn recording_expiry(end_time: DateTime<Utc>) -> DateTime<Utc> {
    end_time + Duration::days(RETENTION_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ttl_constant() {
        assert_eq!(EPHEMERAL_TTL_SECONDS, 2_592_000);
    }

    #[test]
    fn test_recording_expiry_is_thirty_days_after_end() {
        let ended = Utc.with_ymd_and_hms(2025, 9, 30, 16, 30, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 10, 30, 16, 30, 0).unwrap();
        assert_eq!(recording_expiry(ended), expected);
    }

    #[test]
    fn test_ephemeral_expiry_matches_ttl() {
        let created = Utc.with_ymd_and_hms(2025, 2, 20, 8, 0, 0).unwrap();
        let expiry = ephemeral_expiry(created);
        assert_eq!((expiry - created).num_seconds(), EPHEMERAL_TTL_SECONDS);
        assert_eq!(expiry, Utc.with_ymd_and_hms(2025, 3, 22, 8, 0, 0).unwrap());
    }
}
