//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), task completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Task UUID being processed.
pub const TASK_ID: &str = "task_id";

/// Task kind enum variant.
pub const TASK_KIND: &str = "task_kind";

/// Owning user UUID.
pub const OWNER_ID: &str = "owner_id";

/// Pipeline stage label.
pub const STAGE: &str = "stage";

/// Subsystem originating the log event.
/// Values: "api", "pipeline", "inference", "registry", "cache"
pub const SUBSYSTEM: &str = "subsystem";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Task progress percentage (0–100).
pub const PROGRESS: &str = "progress";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for a call.
pub const MODEL: &str = "model";

/// Logical model operation ("ocr", "correct", "summarize", "generate_tags").
pub const OPERATION: &str = "op";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Cache hit indicator.
pub const CACHE_HIT: &str = "cache_hit";
