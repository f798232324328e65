//! Pipeline configuration, environment-driven with defaults.

use std::time::Duration;

use crate::defaults;

/// Orchestration and workflow configuration.
///
/// Every field has a default from [`crate::defaults`] and can be overridden
/// through the environment variable of the matching name:
///
/// | Variable | Default |
/// |----------|---------|
/// | `MAX_CONCURRENT_TASKS` | 10 |
/// | `TASK_TIMEOUT_S` | 300 |
/// | `QUEUE_WAIT_TIMEOUT_S` | 30 |
/// | `MIN_NOTES_THRESHOLD` | 3 |
/// | `CONFIDENCE_THRESHOLD` | 0.60 |
/// | `MAX_CONTENT_LENGTH` | 2000 |
/// | `MAX_TAGS_PER_CONTENT` | 5 |
/// | `MAX_EXISTING_TAGS` | 200 |
/// | `CACHE_MAX_ENTRIES` | 10000 |
/// | `CACHE_TTL_S` | 86400 |
/// | `TASK_RETENTION_TTL_S` | 3600 |
/// | `FANOUT_LIMIT` | 4 |
/// | `MAX_NOTES` | 64 |
/// | `MAX_IMAGE_BYTES` | 10485760 |
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrent_tasks: usize,
    pub task_timeout: Duration,
    pub queue_wait_timeout: Duration,
    pub min_notes_threshold: usize,
    pub confidence_threshold: f32,
    pub max_content_length: usize,
    pub max_tags_per_content: usize,
    pub max_existing_tags: usize,
    pub cache_max_entries: usize,
    pub cache_ttl: Duration,
    pub task_retention_ttl: Duration,
    pub fanout_limit: usize,
    pub max_notes: usize,
    pub max_image_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: defaults::MAX_CONCURRENT_TASKS,
            task_timeout: Duration::from_secs(defaults::TASK_TIMEOUT_SECS),
            queue_wait_timeout: Duration::from_secs(defaults::QUEUE_WAIT_TIMEOUT_SECS),
            min_notes_threshold: defaults::MIN_NOTES_THRESHOLD,
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            max_content_length: defaults::MAX_CONTENT_LENGTH,
            max_tags_per_content: defaults::MAX_TAGS_PER_CONTENT,
            max_existing_tags: defaults::MAX_EXISTING_TAGS,
            cache_max_entries: defaults::CACHE_MAX_ENTRIES,
            cache_ttl: Duration::from_secs(defaults::CACHE_TTL_SECS),
            task_retention_ttl: Duration::from_secs(defaults::TASK_RETENTION_TTL_SECS),
            fanout_limit: defaults::FANOUT_LIMIT,
            max_notes: defaults::MAX_NOTES_PER_SUMMARY,
            max_image_bytes: defaults::MAX_IMAGE_BYTES,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            max_concurrent_tasks: env_parse("MAX_CONCURRENT_TASKS", base.max_concurrent_tasks)
                .max(1),
            task_timeout: Duration::from_secs(env_parse(
                "TASK_TIMEOUT_S",
                defaults::TASK_TIMEOUT_SECS,
            )),
            queue_wait_timeout: Duration::from_secs(env_parse(
                "QUEUE_WAIT_TIMEOUT_S",
                defaults::QUEUE_WAIT_TIMEOUT_SECS,
            )),
            min_notes_threshold: env_parse("MIN_NOTES_THRESHOLD", base.min_notes_threshold),
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", base.confidence_threshold)
                .clamp(0.0, 1.0),
            max_content_length: env_parse("MAX_CONTENT_LENGTH", base.max_content_length),
            max_tags_per_content: env_parse("MAX_TAGS_PER_CONTENT", base.max_tags_per_content),
            max_existing_tags: env_parse("MAX_EXISTING_TAGS", base.max_existing_tags),
            cache_max_entries: env_parse("CACHE_MAX_ENTRIES", base.cache_max_entries),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_S", defaults::CACHE_TTL_SECS)),
            task_retention_ttl: Duration::from_secs(env_parse(
                "TASK_RETENTION_TTL_S",
                defaults::TASK_RETENTION_TTL_SECS,
            )),
            fanout_limit: env_parse("FANOUT_LIMIT", base.fanout_limit).max(1),
            max_notes: env_parse("MAX_NOTES", base.max_notes),
            max_image_bytes: env_parse("MAX_IMAGE_BYTES", base.max_image_bytes),
        }
    }

    /// Set the maximum concurrent running tasks.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max.max(1);
        self
    }

    /// Set the per-task deadline.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the gate acquisition timeout.
    pub fn with_queue_wait_timeout(mut self, timeout: Duration) -> Self {
        self.queue_wait_timeout = timeout;
        self
    }

    /// Set the multi-note single-path threshold.
    pub fn with_min_notes_threshold(mut self, threshold: usize) -> Self {
        self.min_notes_threshold = threshold;
        self
    }

    /// Set the confidence acceptance threshold.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the terminal-task retention TTL.
    pub fn with_task_retention_ttl(mut self, ttl: Duration) -> Self {
        self.task_retention_ttl = ttl;
        self
    }
}
