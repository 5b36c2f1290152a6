//! Structured logging schema and field name constants for banyan.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "sync"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "worker", "acceptor", "notes"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_base", "deliver", "start_pass"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note file id being operated on.
pub const FILE_ID: &str = "file_id";

/// Archive id within the file.
pub const ARCHIVE_ID: &str = "archive_id";

/// Note header id.
pub const HEADER_ID: &str = "header_id";

/// Linked-file id whose queue is being drained.
pub const LINKED_FILE_ID: &str = "linked_file_id";

/// Cross-instance link GUID.
pub const LINK_GUID: &str = "link_guid";

/// User id a sequencer or access row belongs to.
pub const USER_ID: &str = "user_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned or affected.
pub const RESULT_COUNT: &str = "result_count";

/// Number of queue rows claimed for a delivery batch.
pub const BATCH_SIZE: &str = "batch_size";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
