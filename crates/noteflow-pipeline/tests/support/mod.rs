//! Shared helpers for pipeline integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use noteflow_core::{TaskEvent, TaskEventBus, TaskSnapshot};
use noteflow_pipeline::TaskRegistry;

/// Drain a task's bus until (and including) the terminal event.
///
/// Subscribe immediately after submitting: with no intervening await the
/// worker cannot have started yet on a current-thread runtime, so the
/// collected sequence is the task's complete event history.
pub async fn collect_events(bus: Arc<TaskEventBus>) -> Vec<TaskEvent> {
    let (mut events, rx) = bus.subscribe();
    if events.last().map(TaskEvent::is_terminal).unwrap_or(false) {
        return events;
    }
    let mut rx = match rx {
        Some(rx) => rx,
        None => return events,
    };

    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Ok(event)) => {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    return events;
                }
            }
            Ok(Err(RecvError::Lagged(_))) => continue,
            Ok(Err(RecvError::Closed)) => return events,
            Err(_) => panic!("timed out waiting for the terminal event"),
        }
    }
}

/// Poll the registry until the task reaches a terminal state.
pub async fn wait_terminal(registry: &TaskRegistry, id: Uuid) -> TaskSnapshot {
    for _ in 0..500 {
        if let Some(snapshot) = registry.get(id) {
            if snapshot.status.is_terminal() {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached a terminal state", id);
}

/// Stage labels of all `status` events, in order.
pub fn status_stages(events: &[TaskEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::Status {
                current_step: Some(step),
                ..
            } => Some(step.to_string()),
            _ => None,
        })
        .collect()
}

/// Progress values of all `status` events, in order.
pub fn progress_sequence(events: &[TaskEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::Status { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect()
}

/// Assert the event-stream invariants: exactly one terminal event,
/// positioned last, and monotonically non-decreasing progress.
pub fn assert_stream_invariants(events: &[TaskEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "exactly one terminal event: {:?}", events);
    assert!(
        events.last().unwrap().is_terminal(),
        "terminal event must be last"
    );

    let progress = progress_sequence(events);
    assert!(
        progress.windows(2).all(|w| w[0] <= w[1]),
        "progress must be non-decreasing: {:?}",
        progress
    );
}
