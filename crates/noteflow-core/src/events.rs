//! Per-task progress event bus.
//!
//! Each task owns one [`TaskEventBus`]: a bounded broadcast channel plus a
//! small replay state. Producers (pipeline stages) never block; a slow
//! consumer simply lags and skips older non-terminal events, which is the
//! intended backpressure behavior for live progress streams. The replay
//! state guarantees two things the raw channel cannot:
//!
//! - late subscribers receive a synthesized initial burst (latest status
//!   snapshot plus one `intermediate` per populated stage key, in stage
//!   order) before joining the live stream
//! - the terminal event is never lost: once latched, every current and
//!   future subscriber observes it, and the bus emits nothing further

use std::sync::Mutex;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use crate::models::{StageLabel, TaskResult, TaskStatus};

/// Event published for a single task.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Snapshot of the task's progress counters.
    Status {
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_step: Option<StageLabel>,
        status: TaskStatus,
    },
    /// A stage artifact, published as soon as the stage produces it.
    Intermediate {
        stage: String,
        payload: JsonValue,
        /// Position within a fan-out, when applicable.
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
        /// True when the stage was skipped (e.g. OCR for text input).
        #[serde(skip_serializing_if = "Option::is_none")]
        skipped: Option<bool>,
    },
    /// Terminal success event carrying the full result.
    Complete { result: TaskResult },
    /// Terminal failure event carrying the error classification.
    Error { kind: String, message: String },
}

impl TaskEvent {
    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Complete { .. } | TaskEvent::Error { .. })
    }

    /// Event type name used for SSE `event:` fields.
    pub fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::Status { .. } => "status",
            TaskEvent::Intermediate { .. } => "intermediate",
            TaskEvent::Complete { .. } => "complete",
            TaskEvent::Error { .. } => "error",
        }
    }
}

/// Replay state retained alongside the broadcast channel.
#[derive(Default)]
struct ReplayState {
    /// Latest status snapshot.
    status: Option<TaskEvent>,
    /// One entry per `(stage, index)` key, in first-publication order.
    intermediates: Vec<TaskEvent>,
    /// Latched terminal event; once set the bus is closed.
    terminal: Option<TaskEvent>,
}

/// Broadcast-based progress bus for one task.
pub struct TaskEventBus {
    tx: broadcast::Sender<TaskEvent>,
    state: Mutex<ReplayState>,
}

impl TaskEventBus {
    /// Create a bus with the given channel capacity
    /// (see [`crate::defaults::EVENT_BUS_CAPACITY`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Publish an event to all subscribers and fold it into the replay state.
    ///
    /// Events published after the terminal latch are silently discarded;
    /// the stream contract guarantees nothing follows a terminal event.
    pub fn publish(&self, event: TaskEvent) {
        let mut state = self.state.lock().unwrap();
        if state.terminal.is_some() {
            tracing::debug!(event_type = event.event_type(), "event after terminal dropped");
            return;
        }

        match &event {
            TaskEvent::Status { .. } => state.status = Some(event.clone()),
            TaskEvent::Intermediate { stage, index, .. } => {
                let key = (stage.clone(), *index);
                if let Some(existing) = state.intermediates.iter_mut().find(|e| {
                    matches!(e, TaskEvent::Intermediate { stage: s, index: i, .. }
                        if *s == key.0 && *i == key.1)
                }) {
                    *existing = event.clone();
                } else {
                    state.intermediates.push(event.clone());
                }
            }
            TaskEvent::Complete { .. } | TaskEvent::Error { .. } => {
                state.terminal = Some(event.clone());
            }
        }

        // Send while holding the lock so a concurrent subscriber either sees
        // the event in its burst or on its receiver, never neither.
        let _ = self.tx.send(event);
    }

    /// Subscribe to the task's events.
    ///
    /// Returns the synthesized initial burst and, while the task is live,
    /// a receiver for subsequent events. A `None` receiver signals
    /// end-of-stream: the burst already ends with the terminal event.
    pub fn subscribe(&self) -> (Vec<TaskEvent>, Option<broadcast::Receiver<TaskEvent>>) {
        let state = self.state.lock().unwrap();
        let mut burst = Vec::with_capacity(state.intermediates.len() + 2);
        if let Some(status) = &state.status {
            burst.push(status.clone());
        }
        burst.extend(state.intermediates.iter().cloned());
        match &state.terminal {
            Some(terminal) => {
                burst.push(terminal.clone());
                (burst, None)
            }
            None => (burst, Some(self.tx.subscribe())),
        }
    }

    /// Whether the terminal event has been latched.
    pub fn is_terminal(&self) -> bool {
        self.state.lock().unwrap().terminal.is_some()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
