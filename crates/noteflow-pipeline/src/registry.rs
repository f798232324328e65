//! In-memory task registry.
//!
//! Process-wide map of task id → task state. All observable mutation goes
//! through registry transition methods, which also publish the matching
//! event on the task's bus; that is what keeps the task record, the event
//! stream, and the lifecycle invariants (terminal immutability,
//! progress/result coupling) in agreement.
//!
//! Locks are held only for the duration of a map mutation; no model call or
//! persistence call ever happens under the registry lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use noteflow_core::{
    defaults, CancelHandle, CancelToken, Error, Result, StageLabel, Task, TaskError, TaskEvent,
    TaskEventBus, TaskInput, TaskResult, TaskSnapshot, TaskStatus,
};

struct TaskEntry {
    task: Task,
    bus: Arc<TaskEventBus>,
    cancel: CancelHandle,
    /// When the task entered a terminal state (monotonic clock for sweeping).
    terminal_at: Option<Instant>,
}

/// Thread-safe in-memory task registry with TTL cleanup.
pub struct TaskRegistry {
    inner: RwLock<HashMap<Uuid, TaskEntry>>,
    retention: Duration,
}

impl TaskRegistry {
    /// Create a registry retaining terminal tasks for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Create a new pending task with an attached bus and cancellation signal.
    pub fn create(&self, owner: Uuid, input: TaskInput) -> (Uuid, CancelToken, Arc<TaskEventBus>) {
        let task = Task::new(owner, input);
        let id = task.id;
        let (cancel, token) = CancelHandle::new();
        let bus = Arc::new(TaskEventBus::new(defaults::EVENT_BUS_CAPACITY));

        let entry = TaskEntry {
            task,
            bus: bus.clone(),
            cancel,
            terminal_at: None,
        };
        self.inner.write().unwrap().insert(id, entry);

        debug!(task_id = %id, owner_id = %owner, "task created");
        (id, token, bus)
    }

    /// Snapshot read of one task.
    pub fn get(&self, id: Uuid) -> Option<TaskSnapshot> {
        self.inner
            .read()
            .unwrap()
            .get(&id)
            .map(|entry| entry.task.snapshot())
    }

    /// The task's event bus, for subscriptions.
    pub fn bus(&self, id: Uuid) -> Option<Arc<TaskEventBus>> {
        self.inner.read().unwrap().get(&id).map(|e| e.bus.clone())
    }

    /// Snapshots of an owner's tasks, newest first, capped at `limit`.
    /// An optional status filter narrows the result.
    pub fn list(
        &self,
        owner: Uuid,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Vec<TaskSnapshot> {
        let inner = self.inner.read().unwrap();
        let mut snapshots: Vec<TaskSnapshot> = inner
            .values()
            .filter(|e| e.task.owner == owner)
            .filter(|e| status.map(|s| e.task.status == s).unwrap_or(true))
            .map(|e| e.task.snapshot())
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit);
        snapshots
    }

    /// Number of tasks currently tracked.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether the registry tracks no tasks.
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Request cooperative cancellation.
    ///
    /// Running stages observe the signal between stages and at model-call
    /// boundaries; the task transitions to `cancelled` once the worker
    /// acknowledges. Errors with `Conflict` if the task is already terminal.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let inner = self.inner.read().unwrap();
        let entry = inner
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        if entry.task.status.is_terminal() {
            return Err(Error::Conflict(format!(
                "task {} already {}",
                id, entry.task.status
            )));
        }
        entry.cancel.cancel();
        info!(task_id = %id, "cancellation requested");
        Ok(())
    }

    /// Remove terminal tasks older than the retention TTL.
    /// Returns the number of tasks removed.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.write().unwrap();
        let before = inner.len();
        inner.retain(|_, entry| match entry.terminal_at {
            Some(at) => at.elapsed() < self.retention,
            None => true,
        });
        let removed = before - inner.len();
        if removed > 0 {
            info!(removed, "swept terminal tasks");
        }
        removed
    }

    // =========================================================================
    // Registry-mediated transitions
    // =========================================================================

    /// Transition `pending → running`, stamping `started_at` and the deadline.
    ///
    /// Publishes no event by itself: the first stage entry (or the cache-hit
    /// shortcut) produces the first observable event.
    pub fn mark_running(&self, id: Uuid, timeout: Duration) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(&id) {
            if entry.task.status.is_terminal() {
                return;
            }
            let now = Utc::now();
            entry.task.status = TaskStatus::Running;
            entry.task.started_at = Some(now);
            entry.task.deadline =
                Some(now + chrono::Duration::from_std(timeout).unwrap_or_default());
        }
    }

    /// Enter a stage: set `current_step`, raise progress, publish `status`.
    ///
    /// Progress is clamped to be non-decreasing.
    pub fn set_stage(&self, id: Uuid, stage: StageLabel, progress: u8) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(&id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.current_step = Some(stage);
            entry.task.progress = entry.task.progress.max(progress.min(99));
            let event = TaskEvent::Status {
                progress: entry.task.progress,
                current_step: entry.task.current_step,
                status: entry.task.status,
            };
            entry.bus.publish(event);
        }
    }

    /// Raise progress without changing the stage, publishing `status`.
    pub fn set_progress(&self, id: Uuid, progress: u8) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(&id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.progress = entry.task.progress.max(progress.min(99));
            let event = TaskEvent::Status {
                progress: entry.task.progress,
                current_step: entry.task.current_step,
                status: entry.task.status,
            };
            entry.bus.publish(event);
        }
    }

    /// Record a stage artifact and publish the matching `intermediate` event.
    pub fn record_intermediate(
        &self,
        id: Uuid,
        stage: &str,
        payload: serde_json::Value,
        index: Option<usize>,
        total: Option<usize>,
        skipped: Option<bool>,
    ) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(&id) {
            if entry.task.status.is_terminal() {
                return;
            }
            let key = match index {
                Some(i) => format!("{}:{}", stage, i),
                None => stage.to_string(),
            };
            entry.task.intermediates.insert(key, payload.clone());
            entry.bus.publish(TaskEvent::Intermediate {
                stage: stage.to_string(),
                payload,
                index,
                total,
                skipped,
            });
        }
    }

    /// Terminal success: progress 100, result stored, `complete` published.
    pub fn complete(&self, id: Uuid, result: TaskResult) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(&id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.status = TaskStatus::Completed;
            entry.task.progress = 100;
            entry.task.current_step = None;
            entry.task.result = Some(result.clone());
            entry.task.completed_at = Some(Utc::now());
            entry.terminal_at = Some(Instant::now());
            entry.bus.publish(TaskEvent::Complete { result });
            info!(task_id = %id, "task completed");
        }
    }

    /// Terminal failure: classify the error, store it, publish `error`.
    ///
    /// `Cancelled` and `Timeout` errors map to their dedicated statuses;
    /// everything else becomes `failed`.
    pub fn fail(&self, id: Uuid, error: &Error) {
        let status = match error {
            Error::Cancelled => TaskStatus::Cancelled,
            Error::Timeout(_) => TaskStatus::TimedOut,
            _ => TaskStatus::Failed,
        };
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(&id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.status = status;
            entry.task.current_step = None;
            entry.task.error = Some(TaskError {
                kind: error.kind().to_string(),
                message: error.to_string(),
            });
            entry.task.completed_at = Some(Utc::now());
            entry.terminal_at = Some(Instant::now());
            entry.bus.publish(TaskEvent::Error {
                kind: error.kind().to_string(),
                message: error.to_string(),
            });
            info!(task_id = %id, status = %status, error = %error, "task terminated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noteflow_core::{ProcessingMethod, SummaryResult};
    use serde_json::json;

    fn text_input() -> TaskInput {
        TaskInput::TextNote {
            text: "hello".into(),
            title: None,
        }
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::new(Duration::from_secs(3600))
    }

    fn summary_result() -> TaskResult {
        TaskResult::MultiSummary(SummaryResult {
            title: "t".into(),
            topic: "x".into(),
            content_markdown: "m".into(),
            confidence_scores: vec![1.0],
            processing_method: ProcessingMethod::Single,
        })
    }

    #[test]
    fn test_create_and_get() {
        let registry = registry();
        let owner = Uuid::new_v4();
        let (id, token, _bus) = registry.create(owner, text_input());

        let snap = registry.get(id).unwrap();
        assert_eq!(snap.owner, owner);
        assert_eq!(snap.status, TaskStatus::Pending);
        assert_eq!(snap.progress, 0);
        assert!(!token.is_cancelled());
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_list_is_owner_scoped_and_newest_first() {
        let registry = registry();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (first, ..) = registry.create(owner, text_input());
        let (second, ..) = registry.create(owner, text_input());
        registry.create(other, text_input());

        let list = registry.list(owner, None, 10);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|s| s.owner == owner));
        // created_at ties are possible at clock resolution; both orders valid
        // only when equal, so just assert membership and the cap.
        assert!(list.iter().any(|s| s.id == first));
        assert!(list.iter().any(|s| s.id == second));
        assert_eq!(registry.list(owner, None, 1).len(), 1);
    }

    #[test]
    fn test_list_filters_by_status() {
        let registry = registry();
        let owner = Uuid::new_v4();
        let (done, ..) = registry.create(owner, text_input());
        registry.create(owner, text_input());
        registry.complete(done, summary_result());

        let completed = registry.list(owner, Some(TaskStatus::Completed), 10);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done);

        let pending = registry.list(owner, Some(TaskStatus::Pending), 10);
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].id, done);
    }

    #[test]
    fn test_progress_monotonic() {
        let registry = registry();
        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.mark_running(id, Duration::from_secs(300));

        registry.set_stage(id, StageLabel::ErrorCorrection, 30);
        assert_eq!(registry.get(id).unwrap().progress, 30);

        // A lower value never regresses the counter.
        registry.set_progress(id, 10);
        assert_eq!(registry.get(id).unwrap().progress, 30);

        registry.set_progress(id, 55);
        assert_eq!(registry.get(id).unwrap().progress, 55);
    }

    #[test]
    fn test_progress_100_only_via_complete() {
        let registry = registry();
        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.mark_running(id, Duration::from_secs(300));

        registry.set_progress(id, 200);
        assert_eq!(registry.get(id).unwrap().progress, 99);

        registry.complete(id, summary_result());
        let snap = registry.get(id).unwrap();
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.status, TaskStatus::Completed);
        assert!(snap.result.is_some());
        assert!(snap.error.is_none());
        assert!(snap.completed_at.is_some());
    }

    #[test]
    fn test_fail_classification() {
        let registry = registry();

        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.fail(id, &Error::Cancelled);
        assert_eq!(registry.get(id).unwrap().status, TaskStatus::Cancelled);

        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.fail(id, &Error::Timeout("deadline".into()));
        let snap = registry.get(id).unwrap();
        assert_eq!(snap.status, TaskStatus::TimedOut);
        assert_eq!(snap.error.as_ref().unwrap().kind, "timeout");

        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.fail(id, &Error::ModelUnavailable("down".into()));
        assert_eq!(registry.get(id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn test_terminal_tasks_are_immutable() {
        let registry = registry();
        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.complete(id, summary_result());

        registry.set_progress(id, 10);
        registry.set_stage(id, StageLabel::NoteSummary, 50);
        registry.record_intermediate(id, "late", json!("x"), None, None, None);
        registry.fail(id, &Error::Internal("late".into()));

        let snap = registry.get(id).unwrap();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert!(snap.error.is_none());
        assert!(!snap.intermediates.contains_key("late"));
    }

    #[test]
    fn test_cancel_terminal_is_conflict() {
        let registry = registry();
        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.complete(id, summary_result());

        let result = registry.cancel(id);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_cancel_unknown_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.cancel(Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_cancel_sets_signal() {
        let registry = registry();
        let (id, token, _) = registry.create(Uuid::new_v4(), text_input());
        registry.cancel(id).unwrap();
        assert!(token.is_cancelled());
        // The status only changes once the worker acknowledges.
        assert_eq!(registry.get(id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_sweep_removes_only_expired_terminal_tasks() {
        let registry = TaskRegistry::new(Duration::ZERO);
        let (live, ..) = registry.create(Uuid::new_v4(), text_input());
        let (done, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.complete(done, summary_result());

        let removed = registry.sweep();
        assert_eq!(removed, 1);
        assert!(registry.get(live).is_some());
        assert!(registry.get(done).is_none());
    }

    #[test]
    fn test_sweep_respects_retention() {
        let registry = TaskRegistry::new(Duration::from_secs(3600));
        let (id, ..) = registry.create(Uuid::new_v4(), text_input());
        registry.complete(id, summary_result());

        assert_eq!(registry.sweep(), 0);
        assert!(registry.get(id).is_some());
    }

    #[tokio::test]
    async fn test_transitions_publish_matching_events() {
        let registry = registry();
        let (id, _, bus) = registry.create(Uuid::new_v4(), text_input());
        let (_, rx) = bus.subscribe();
        let mut rx = rx.unwrap();

        registry.mark_running(id, Duration::from_secs(300));
        registry.set_stage(id, StageLabel::OcrRecognition, 5);
        registry.record_intermediate(id, "ocr_text", json!("HELLO"), None, None, None);
        registry.fail(id, &Error::ModelUnavailable("down".into()));

        let e1 = rx.recv().await.unwrap();
        assert!(matches!(e1, TaskEvent::Status { progress: 5, .. }));
        let e2 = rx.recv().await.unwrap();
        assert!(matches!(e2, TaskEvent::Intermediate { .. }));
        let e3 = rx.recv().await.unwrap();
        assert!(matches!(e3, TaskEvent::Error { .. }));
    }
}
