//! Orchestrator-level tests: caching, concurrency gate, cancellation,
//! timeout, and registry cleanup.

mod support;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use noteflow_core::{PipelineConfig, TaskEvent, TaskStatus};
use noteflow_inference::MockModelClient;
use noteflow_pipeline::{MemoryContentStore, Orchestrator};

use support::{assert_stream_invariants, collect_events, wait_terminal};

fn orchestrator(mock: MockModelClient, config: PipelineConfig) -> Orchestrator {
    Orchestrator::new(Arc::new(mock), Arc::new(MemoryContentStore::new()), config)
}

#[tokio::test]
async fn test_cache_hit_replays_result_without_model_calls() {
    let mock = MockModelClient::new();
    let orch = orchestrator(mock.clone(), PipelineConfig::default());
    let owner = Uuid::new_v4();

    // First run computes and populates the cache.
    let first = orch
        .submit_smart_note_text(owner, "光速约为3×10^8 m/s", Some("Physics"))
        .unwrap();
    let first_snapshot = wait_terminal(orch.registry(), first).await;
    assert_eq!(first_snapshot.status, TaskStatus::Completed);
    let calls_after_first = mock.summarize_call_count() + mock.correct_call_count();

    // Second, identical submission: events are exactly one cache_hit
    // intermediate followed by complete, with no further model calls.
    let second = orch
        .submit_smart_note_text(owner, "光速约为3×10^8 m/s", Some("Physics"))
        .unwrap();
    let bus = orch.registry().bus(second).unwrap();
    let events = collect_events(bus).await;

    assert_eq!(events.len(), 2, "unexpected events: {:?}", events);
    assert!(matches!(
        &events[0],
        TaskEvent::Intermediate { stage, .. } if stage == "cache_hit"
    ));
    assert!(matches!(&events[1], TaskEvent::Complete { .. }));

    let second_snapshot = orch.registry().get(second).unwrap();
    assert_eq!(second_snapshot.result, first_snapshot.result);
    assert_eq!(
        mock.summarize_call_count() + mock.correct_call_count(),
        calls_after_first,
        "cache hit must not touch the models"
    );
}

#[tokio::test]
async fn test_normalized_input_shares_cache_entry() {
    let mock = MockModelClient::new();
    let orch = orchestrator(mock.clone(), PipelineConfig::default());
    let owner = Uuid::new_v4();

    let first = orch
        .submit_smart_note_text(owner, "  hello world  ", Some("Title"))
        .unwrap();
    wait_terminal(orch.registry(), first).await;
    let calls_after_first = mock.summarize_call_count();

    // Differs only in surrounding whitespace and title casing.
    let second = orch
        .submit_smart_note_text(owner, "hello world", Some("title"))
        .unwrap();
    let snapshot = wait_terminal(orch.registry(), second).await;

    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(mock.summarize_call_count(), calls_after_first);
}

#[tokio::test]
async fn test_image_tasks_bypass_cache() {
    let mock = MockModelClient::new().with_ocr_text("SAME");
    let orch = orchestrator(mock.clone(), PipelineConfig::default());
    let owner = Uuid::new_v4();

    let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0u8; 32]);

    let first = orch
        .submit_smart_note_image(owner, png.clone(), None)
        .unwrap();
    wait_terminal(orch.registry(), first).await;
    let second = orch.submit_smart_note_image(owner, png, None).unwrap();
    wait_terminal(orch.registry(), second).await;

    assert_eq!(mock.ocr_call_count(), 2, "identical images are re-processed");
}

#[tokio::test]
async fn test_saturated_gate_fails_with_capacity_exceeded() {
    let mock = MockModelClient::new().with_latency(Duration::from_millis(500));
    let config = PipelineConfig::default()
        .with_max_concurrent(1)
        .with_queue_wait_timeout(Duration::from_millis(50));
    let orch = orchestrator(mock, config);
    let owner = Uuid::new_v4();

    let slow = orch.submit_smart_note_text(owner, "slow note", None).unwrap();
    // Give the first worker time to take the only slot.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let rejected = orch
        .submit_smart_note_text(owner, "queued note", None)
        .unwrap();
    let rejected_snapshot = wait_terminal(orch.registry(), rejected).await;
    assert_eq!(rejected_snapshot.status, TaskStatus::Failed);
    let error = rejected_snapshot.error.unwrap();
    assert_eq!(error.kind, "capacity_exceeded");
    assert!(error.message.contains("capacity exceeded"));

    // The slot holder still completes normally.
    let slow_snapshot = wait_terminal(orch.registry(), slow).await;
    assert_eq!(slow_snapshot.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_queued_task_runs_once_slot_frees() {
    let mock = MockModelClient::new().with_latency(Duration::from_millis(100));
    let config = PipelineConfig::default()
        .with_max_concurrent(1)
        .with_queue_wait_timeout(Duration::from_secs(5));
    let orch = orchestrator(mock, config);
    let owner = Uuid::new_v4();

    let first = orch.submit_smart_note_text(owner, "first", None).unwrap();
    let second = orch.submit_smart_note_text(owner, "second", None).unwrap();

    assert_eq!(
        wait_terminal(orch.registry(), first).await.status,
        TaskStatus::Completed
    );
    assert_eq!(
        wait_terminal(orch.registry(), second).await.status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn test_cancellation_terminates_with_cancelled_error_event() {
    let mock = MockModelClient::new().with_latency(Duration::from_millis(200));
    let orch = orchestrator(mock, PipelineConfig::default());

    let id = orch
        .submit_smart_note_text(Uuid::new_v4(), "note to cancel", None)
        .unwrap();
    let bus = orch.registry().bus(id).unwrap();

    // Let the first stage start, then cancel.
    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.registry().cancel(id).unwrap();

    let events = collect_events(bus).await;
    assert_stream_invariants(&events);
    match events.last().unwrap() {
        TaskEvent::Error { kind, .. } => assert_eq!(kind, "cancelled"),
        other => panic!("expected error event, got {:?}", other),
    }

    let snapshot = orch.registry().get(id).unwrap();
    assert_eq!(snapshot.status, TaskStatus::Cancelled);
    assert!(snapshot.result.is_none());

    // Cancelling a terminal task is a conflict (the 409 case).
    assert!(matches!(
        orch.registry().cancel(id),
        Err(noteflow_core::Error::Conflict(_))
    ));
}

#[tokio::test]
async fn test_deadline_exceeded_transitions_to_timed_out() {
    let mock = MockModelClient::new().with_latency(Duration::from_secs(2));
    let config = PipelineConfig::default().with_task_timeout(Duration::from_millis(100));
    let orch = orchestrator(mock, config);

    let id = orch
        .submit_smart_note_text(Uuid::new_v4(), "too slow", None)
        .unwrap();
    let snapshot = wait_terminal(orch.registry(), id).await;

    assert_eq!(snapshot.status, TaskStatus::TimedOut);
    let error = snapshot.error.unwrap();
    assert_eq!(error.kind, "timeout");
    assert!(snapshot.result.is_none());
}

#[tokio::test]
async fn test_completed_task_invariants() {
    let orch = orchestrator(MockModelClient::new(), PipelineConfig::default());

    let id = orch
        .submit_smart_note_text(Uuid::new_v4(), "invariant check", None)
        .unwrap();
    let snapshot = wait_terminal(orch.registry(), id).await;

    // completed ⇔ progress == 100 ⇔ result defined
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 100);
    assert!(snapshot.result.is_some());
    assert!(snapshot.error.is_none());
    assert!(snapshot.started_at.unwrap() <= snapshot.completed_at.unwrap());
}

#[tokio::test]
async fn test_sweeper_removes_expired_terminal_tasks() {
    let config = PipelineConfig::default().with_task_retention_ttl(Duration::ZERO);
    let orch = orchestrator(MockModelClient::new(), config);

    let id = orch
        .submit_smart_note_text(Uuid::new_v4(), "ephemeral", None)
        .unwrap();
    wait_terminal(orch.registry(), id).await;

    assert_eq!(orch.registry().sweep(), 1);
    assert!(orch.registry().get(id).is_none());
}

#[tokio::test]
async fn test_list_returns_owner_tasks() {
    let orch = orchestrator(MockModelClient::new(), PipelineConfig::default());
    let owner = Uuid::new_v4();

    let a = orch.submit_smart_note_text(owner, "first note", None).unwrap();
    let b = orch.submit_smart_note_text(owner, "second note", None).unwrap();
    orch.submit_smart_note_text(Uuid::new_v4(), "someone else", None)
        .unwrap();

    wait_terminal(orch.registry(), a).await;
    wait_terminal(orch.registry(), b).await;

    let tasks = orch.registry().list(owner, None, 10);
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.owner == owner));
}

#[tokio::test]
async fn test_late_subscriber_sees_terminal_event() {
    let orch = orchestrator(MockModelClient::new(), PipelineConfig::default());

    let id = orch
        .submit_smart_note_text(Uuid::new_v4(), "already done", None)
        .unwrap();
    wait_terminal(orch.registry(), id).await;

    // Subscribing after completion yields the synthesized burst ending in
    // the terminal event and no live receiver.
    let bus = orch.registry().bus(id).unwrap();
    let (burst, rx) = bus.subscribe();
    assert!(rx.is_none());
    assert!(burst.last().unwrap().is_terminal());
    assert!(burst
        .iter()
        .any(|e| matches!(e, TaskEvent::Intermediate { stage, .. } if stage == "summary")));
}
