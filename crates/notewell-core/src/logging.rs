//! Structured logging field name constants for notewell.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "data", "sync", "inference", "api"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "snapshot", "reconciler", "draft", "fallback", "rest"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "load", "commit", "apply_change", "assist"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Change-feed table the event belongs to.
pub const TABLE: &str = "table";

/// Change-feed operation (insert/update/delete).
pub const EVENT_OP: &str = "event_op";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a read.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a prompt sent to the AI service.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of an AI service response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for generation.
pub const MODEL: &str = "model";

/// Assist action requested (improve/summarize/expand/tone/generate).
pub const ACTION: &str = "action";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
