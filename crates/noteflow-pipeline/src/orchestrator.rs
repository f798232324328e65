//! Task orchestrator: submission, validation, scheduling, and terminal
//! transitions for both pipeline kinds.
//!
//! One worker routine is spawned per task. It acquires a concurrency slot,
//! consults the result cache, drives the pipeline under the task deadline,
//! and performs exactly one terminal transition whatever the outcome. The
//! gate permit is dropped with the worker, releasing the slot on every path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use noteflow_core::{
    content_hash, defaults, detect_image_type, multi_note_hash, CancelToken, ContentHash,
    ContentStore, Error, NoteInput, PipelineConfig, Result, TaskInput, TaskResult,
};
use noteflow_inference::{CallContext, ModelClient};

use crate::cache::ResultCache;
use crate::gate::ConcurrencyGate;
use crate::multi_note::MultiNoteWorkflow;
use crate::registry::TaskRegistry;
use crate::smart_note::SmartNotePipeline;

/// Orchestrates smart-note and multi-note tasks.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    gate: Arc<ConcurrencyGate>,
    cache: Arc<ResultCache>,
    smart_note: Arc<SmartNotePipeline>,
    multi_note: Arc<MultiNoteWorkflow>,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Wire up the orchestrator from its collaborators.
    pub fn new(
        models: Arc<dyn ModelClient>,
        store: Arc<dyn ContentStore>,
        config: PipelineConfig,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new(config.task_retention_ttl));
        let gate = Arc::new(ConcurrencyGate::new(
            config.max_concurrent_tasks,
            config.queue_wait_timeout,
        ));
        let cache = Arc::new(ResultCache::new(config.cache_max_entries, config.cache_ttl));
        let smart_note = Arc::new(SmartNotePipeline::new(models.clone(), store, &config));
        let multi_note = Arc::new(MultiNoteWorkflow::new(models, config.clone()));

        Self {
            registry,
            gate,
            cache,
            smart_note,
            multi_note,
            config,
        }
    }

    /// The task registry, for reads, subscriptions, and cancellation.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Free concurrency slots.
    pub fn available_slots(&self) -> usize {
        self.gate.available()
    }

    /// Submit a smart-note task over free text.
    pub fn submit_smart_note_text(
        &self,
        owner: Uuid,
        text: &str,
        title: Option<&str>,
    ) -> Result<Uuid> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }
        self.spawn_task(
            owner,
            TaskInput::TextNote {
                text: text.to_string(),
                title: title.map(str::to_string),
            },
        )
    }

    /// Submit a smart-note task over an image payload.
    pub fn submit_smart_note_image(
        &self,
        owner: Uuid,
        image: Vec<u8>,
        title: Option<&str>,
    ) -> Result<Uuid> {
        if image.is_empty() {
            return Err(Error::InvalidInput("image must not be empty".to_string()));
        }
        if image.len() > self.config.max_image_bytes {
            return Err(Error::InvalidInput(format!(
                "image exceeds {} bytes",
                self.config.max_image_bytes
            )));
        }
        if detect_image_type(&image).is_none() {
            return Err(Error::InvalidInput(
                "unsupported image type".to_string(),
            ));
        }
        self.spawn_task(
            owner,
            TaskInput::ImageNote {
                image,
                title: title.map(str::to_string),
            },
        )
    }

    /// Submit a multi-note summary task.
    pub fn submit_multi_summary(
        &self,
        owner: Uuid,
        notes: Vec<NoteInput>,
        min_notes_threshold: Option<usize>,
    ) -> Result<Uuid> {
        if notes.is_empty() {
            return Err(Error::InvalidInput("notes must not be empty".to_string()));
        }
        if notes.len() > self.config.max_notes {
            return Err(Error::InvalidInput(format!(
                "at most {} notes per summary",
                self.config.max_notes
            )));
        }
        if notes.iter().any(|n| n.content.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "every note needs non-empty content".to_string(),
            ));
        }
        self.spawn_task(
            owner,
            TaskInput::MultiNote {
                notes,
                min_notes_threshold,
            },
        )
    }

    /// Create the task record and spawn its worker routine.
    fn spawn_task(&self, owner: Uuid, input: TaskInput) -> Result<Uuid> {
        let (id, cancel, _bus) = self.registry.create(owner, input.clone());
        info!(task_id = %id, owner_id = %owner, task_kind = %input.kind(), "task submitted");

        let this = self.clone();
        tokio::spawn(async move {
            this.run_task(id, owner, input, cancel).await;
        });
        Ok(id)
    }

    /// Worker routine for one task. Performs exactly one terminal transition.
    async fn run_task(&self, id: Uuid, owner: Uuid, input: TaskInput, cancel: CancelToken) {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                self.registry.fail(id, &e);
                return;
            }
        };

        if cancel.is_cancelled() {
            self.registry.fail(id, &Error::Cancelled);
            return;
        }

        self.registry.mark_running(id, self.config.task_timeout);

        // Cache shortcut before stage 1. Image tasks skip the cache.
        let cache_key = cache_key_for(&input);
        if let Some(key) = cache_key {
            if let Some(result) = self.cache.get(&key) {
                debug!(task_id = %id, cache_hit = true, "serving cached result");
                self.registry.record_intermediate(
                    id,
                    "cache_hit",
                    json!({ "hash": hex(&key) }),
                    None,
                    None,
                    None,
                );
                self.registry.complete(id, result);
                return;
            }
        }

        let started = Instant::now();
        let ctx = CallContext::new(Some(started + self.config.task_timeout), cancel);

        let work = async {
            match input {
                TaskInput::ImageNote { .. } | TaskInput::TextNote { .. } => self
                    .smart_note
                    .run(&self.registry, id, owner, input, &ctx)
                    .await
                    .map(TaskResult::SmartNote),
                TaskInput::MultiNote {
                    notes,
                    min_notes_threshold,
                } => self
                    .multi_note
                    .run(&self.registry, id, notes, min_notes_threshold, &ctx)
                    .await
                    .map(TaskResult::MultiSummary),
            }
        };

        match tokio::time::timeout(self.config.task_timeout, work).await {
            Err(_) => {
                self.registry
                    .fail(id, &Error::Timeout("task deadline exceeded".to_string()));
            }
            Ok(Err(e)) => {
                self.registry.fail(id, &e);
            }
            Ok(Ok(result)) => {
                if let Some(key) = cache_key {
                    self.cache.insert(key, result.clone());
                }
                self.registry.complete(id, result);
            }
        }
    }

    /// Spawn the background sweeper that evicts expired terminal tasks.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let interval = Duration::from_secs(defaults::SWEEP_INTERVAL_SECS);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                registry.sweep();
            }
        })
    }
}

/// Cache key for an input, `None` when the input is not cacheable.
fn cache_key_for(input: &TaskInput) -> Option<ContentHash> {
    match input {
        TaskInput::TextNote { text, title } => Some(content_hash(
            noteflow_core::TaskKind::SmartNote,
            text,
            title.as_deref(),
        )),
        TaskInput::MultiNote { notes, .. } => Some(multi_note_hash(notes)),
        // Byte-identical images are rare and perceptual hashing is out of
        // scope, so image tasks always run the pipeline.
        TaskInput::ImageNote { .. } => None,
    }
}

fn hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}
