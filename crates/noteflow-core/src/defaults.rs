//! Centralized default constants for the noteflow system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers. Each value can be overridden through the environment variable of
//! the same name (see [`crate::config::PipelineConfig::from_env`]).

// =============================================================================
// TASK ORCHESTRATION
// =============================================================================

/// Maximum number of tasks in `running` state at once.
pub const MAX_CONCURRENT_TASKS: usize = 10;

/// Per-task wall-clock deadline in seconds, measured from `started_at`.
pub const TASK_TIMEOUT_SECS: u64 = 300;

/// How long a pending task may wait for a concurrency slot before it
/// fails with `capacity_exceeded`.
pub const QUEUE_WAIT_TIMEOUT_SECS: u64 = 30;

/// Terminal tasks are swept from the registry after this many seconds.
pub const TASK_RETENTION_TTL_SECS: u64 = 3600;

/// Interval between registry sweeper passes.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

// =============================================================================
// EVENT BUS / STREAMING
// =============================================================================

/// Per-task bounded event channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 32;

/// SSE heartbeat comment interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

/// Intermediates larger than this are elided from task status snapshots.
pub const SNAPSHOT_INTERMEDIATE_MAX_BYTES: usize = 64 * 1024;

// =============================================================================
// MULTI-NOTE WORKFLOW
// =============================================================================

/// Below this note count the single-summary path is taken (`<` comparator).
pub const MIN_NOTES_THRESHOLD: usize = 3;

/// Mean confidence at or above this accepts the comprehensive summary
/// without a correction pass.
pub const CONFIDENCE_THRESHOLD: f32 = 0.60;

/// Maximum per-note text length in characters; longer notes are truncated
/// with an ellipsis before summarization.
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// Upper bound on notes accepted by one multi-note workflow.
pub const MAX_NOTES_PER_SUMMARY: usize = 64;

/// Bounded parallelism for the per-note summary fan-out.
pub const FANOUT_LIMIT: usize = 4;

// =============================================================================
// TAG GENERATION
// =============================================================================

/// Maximum tags persisted per content item.
pub const MAX_TAGS_PER_CONTENT: usize = 5;

/// How many existing tag names are offered to the tag model for reuse.
pub const MAX_EXISTING_TAGS: usize = 200;

/// Confidence assigned to tags the model matched from the existing set.
pub const EXISTING_TAG_CONFIDENCE: f32 = 0.8;

// =============================================================================
// RESULT CACHE
// =============================================================================

/// Maximum entries retained by the content-hash cache.
pub const CACHE_MAX_ENTRIES: usize = 10_000;

/// Cache entry lifetime in seconds.
pub const CACHE_TTL_SECS: u64 = 86_400;

// =============================================================================
// MODEL CLIENT
// =============================================================================

/// Retries after the initial attempt for transient model failures.
pub const AI_MAX_RETRIES: u32 = 3;

/// Exponential backoff base in seconds.
pub const AI_RETRY_BASE_SECS: u64 = 1;

/// Exponential backoff multiplier per attempt.
pub const AI_RETRY_FACTOR: f64 = 2.0;

/// Jitter applied to each backoff delay, as a fraction (0.25 = ±25%).
pub const AI_RETRY_JITTER: f64 = 0.25;

/// Latency budget for OCR calls in seconds.
pub const OCR_TIMEOUT_SECS: u64 = 60;

/// Latency budget for correction calls in seconds.
pub const CORRECTION_TIMEOUT_SECS: u64 = 45;

/// Latency budget for summarization calls in seconds.
pub const SUMMARY_TIMEOUT_SECS: u64 = 60;

/// Latency budget for tag generation calls in seconds.
pub const TAG_TIMEOUT_SECS: u64 = 45;

/// Default OpenAI-compatible endpoint.
pub const MODEL_ENDPOINT_URL: &str = "https://api.ppinfra.com/v3/openai";

/// Default vision model for OCR.
pub const OCR_MODEL: &str = "qwen/qwen2.5-vl-72b-instruct";

/// Default correction model.
pub const CORRECTION_MODEL: &str = "deepseek/deepseek-v3";

/// Default summarization model.
pub const SUMMARY_MODEL: &str = "moonshotai/kimi-k2-instruct";

/// Default tag generation model.
pub const TAG_MODEL: &str = "moonshotai/kimi-k2-instruct";

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Maximum accepted image payload in bytes (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;
