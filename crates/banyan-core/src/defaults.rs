//! Default values and named constants shared across banyan crates.

/// Sentinel user id whose access row supplies the default token for a
/// file when no user-specific row exists.
pub const OTHER_USER_ID: &str = "Other";

/// Maximum length of a note file name.
pub const FILE_NAME_MAX: usize = 20;

/// Maximum length of a note file title.
pub const FILE_TITLE_MAX: usize = 200;

/// Maximum length of a note subject.
pub const SUBJECT_MAX: usize = 200;

/// Maximum length of a linked-file shared secret.
pub const SECRET_MAX: usize = 50;

/// Default polling interval for the replication worker (milliseconds).
pub const SYNC_POLL_INTERVAL_MS: u64 = 2_000;

/// Default number of linked-file queues drained concurrently.
pub const SYNC_MAX_CONCURRENT_FILES: usize = 4;

/// Default timeout for one outbound delivery attempt (seconds).
pub const SYNC_DELIVERY_TIMEOUT_SECS: u64 = 30;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Number of times an ordinal-allocating insert is retried after losing
/// a uniqueness race before the conflict is surfaced to the caller.
pub const ORDINAL_RETRIES: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_user_id_is_stable() {
        // Persisted in every NoteAccess table; changing it would orphan
        // existing default rows.
        assert_eq!(OTHER_USER_ID, "Other");
    }

    #[test]
    fn test_length_caps_match_schema() {
        assert_eq!(FILE_NAME_MAX, 20);
        assert_eq!(FILE_TITLE_MAX, 200);
        assert_eq!(SECRET_MAX, 50);
    }
}
