//! End-to-end tests for the multi-note summary workflow.

mod support;

use std::sync::Arc;

use uuid::Uuid;

use noteflow_core::{
    confidence_scores, Error, NoteInput, PipelineConfig, ProcessingMethod, SummaryArtifact,
    TaskEvent, TaskResult,
};
use noteflow_inference::{MockModelClient, SummaryTemplate};
use noteflow_pipeline::{MemoryContentStore, Orchestrator};

use support::{assert_stream_invariants, collect_events, wait_terminal};

fn note(title: &str, content: &str) -> NoteInput {
    NoteInput {
        title: title.to_string(),
        content: content.to_string(),
    }
}

fn orchestrator(mock: MockModelClient, config: PipelineConfig) -> Orchestrator {
    Orchestrator::new(Arc::new(mock), Arc::new(MemoryContentStore::new()), config)
}

fn summary_of(snapshot_result: TaskResult) -> noteflow_core::SummaryResult {
    match snapshot_result {
        TaskResult::MultiSummary(s) => s,
        other => panic!("expected a multi-summary result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_below_threshold_takes_single_path() {
    let mock = MockModelClient::new();
    let orch = orchestrator(mock.clone(), PipelineConfig::default());

    let id = orch
        .submit_multi_summary(
            Uuid::new_v4(),
            vec![note("A", "太阳是恒星"), note("B", "月亮绕地球转")],
            Some(3),
        )
        .unwrap();
    let snapshot = wait_terminal(orch.registry(), id).await;

    let result = summary_of(snapshot.result.unwrap());
    assert_eq!(result.processing_method, ProcessingMethod::Single);
    assert_eq!(result.confidence_scores.len(), 1);
    // Single pass: exactly one summarize call, no correction.
    assert_eq!(mock.summarize_call_count(), 1);
    assert_eq!(mock.correct_call_count(), 0);
}

#[tokio::test]
async fn test_note_count_equal_to_threshold_takes_multi_path() {
    let mock = MockModelClient::new();
    let orch = orchestrator(mock.clone(), PipelineConfig::default());

    let id = orch
        .submit_multi_summary(
            Uuid::new_v4(),
            vec![
                note("A", "梯度下降是一阶优化算法"),
                note("B", "梯度下降沿负梯度方向迭代"),
                note("C", "梯度下降需要选择学习率"),
            ],
            Some(3),
        )
        .unwrap();
    let snapshot = wait_terminal(orch.registry(), id).await;

    let result = summary_of(snapshot.result.unwrap());
    assert_ne!(result.processing_method, ProcessingMethod::Single);
    assert_eq!(result.confidence_scores.len(), 3);
    // Three per-note passes plus the comprehensive pass.
    assert_eq!(mock.summarize_call_count(), 4);
}

#[tokio::test]
async fn test_high_confidence_accepts_without_correction() {
    // Five near-duplicate notes: the echoing mock summarizer yields highly
    // similar per-note and comprehensive summaries, so the mean clears 0.60.
    let mock = MockModelClient::new();
    let orch = orchestrator(mock.clone(), PipelineConfig::default());

    let notes: Vec<NoteInput> = (0..5)
        .map(|i| note(&format!("N{}", i), "梯度下降是常用的优化算法 gradient descent"))
        .collect();
    let id = orch.submit_multi_summary(Uuid::new_v4(), notes, None).unwrap();
    let bus = orch.registry().bus(id).unwrap();
    let events = collect_events(bus).await;

    assert_stream_invariants(&events);

    let result = summary_of(match events.last().unwrap() {
        TaskEvent::Complete { result } => result.clone(),
        other => panic!("expected complete, got {:?}", other),
    });
    assert_eq!(result.processing_method, ProcessingMethod::MultiWorkflow);
    assert_eq!(result.confidence_scores.len(), 5);
    let mean: f32 = result.confidence_scores.iter().sum::<f32>() / 5.0;
    assert!(mean >= 0.60, "expected high confidence, got {}", mean);
    // No correction call was made.
    assert_eq!(mock.correct_call_count(), 0);
}

#[tokio::test]
async fn test_fanout_emits_one_intermediate_per_index() {
    let mock = MockModelClient::new();
    let orch = orchestrator(mock, PipelineConfig::default());

    let notes: Vec<NoteInput> = (0..5)
        .map(|i| note(&format!("N{}", i), &format!("note body {}", i)))
        .collect();
    let id = orch.submit_multi_summary(Uuid::new_v4(), notes, None).unwrap();
    let bus = orch.registry().bus(id).unwrap();
    let events = collect_events(bus).await;

    let mut indices: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::Intermediate {
                stage,
                index: Some(i),
                total,
                ..
            } if stage == "per_note_summary" => {
                assert_eq!(*total, Some(5));
                Some(*i)
            }
            _ => None,
        })
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3, 4], "one event per input index");
}

#[tokio::test]
async fn test_low_confidence_triggers_exactly_one_correction() {
    // Per-note summaries echo their (pairwise disjoint) notes while the
    // comprehensive summary shares no tokens with any of them, forcing the
    // mean similarity to zero.
    let corrected_text = "replacement summary alpha beta gamma";
    let mock = MockModelClient::new()
        .with_summarize_fn(|text, template| {
            let content = match template {
                SummaryTemplate::Comprehensive => "orthogonal xyzzy plugh".to_string(),
                _ => text.to_string(),
            };
            SummaryArtifact {
                title: "Merged".to_string(),
                topic: "mixed".to_string(),
                content_markdown: content,
                keywords: vec![],
            }
        })
        .with_correct_response(corrected_text);
    let orch = orchestrator(mock.clone(), PipelineConfig::default());

    let notes = vec![
        note("A", "apples oranges"),
        note("B", "二进制 编码"),
        note("C", "volcano magma"),
        note("D", "violin sonata"),
        note("E", "glacier moraine"),
    ];
    let id = orch.submit_multi_summary(Uuid::new_v4(), notes, None).unwrap();
    let snapshot = wait_terminal(orch.registry(), id).await;

    let result = summary_of(snapshot.result.unwrap());
    assert_eq!(
        result.processing_method,
        ProcessingMethod::MultiWorkflowCorrected
    );
    // The correction model ran exactly once, and the result carries its output.
    assert_eq!(mock.correct_call_count(), 1);
    assert_eq!(result.content_markdown, corrected_text);

    // Final scores were recomputed against the corrected content. The
    // per-note summaries echoed the five note bodies above, so the expected
    // scores are reproducible here.
    let per_note_contents: Vec<String> = [
        "apples oranges",
        "二进制 编码",
        "volcano magma",
        "violin sonata",
        "glacier moraine",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let expected = confidence_scores(corrected_text, &per_note_contents);
    assert_eq!(result.confidence_scores, expected);
}

#[tokio::test]
async fn test_mean_equal_to_threshold_accepts() {
    // Threshold zero makes any mean (including exactly 0.0 from fully
    // disjoint summaries) satisfy `mean >= threshold` without correction.
    let mock = MockModelClient::new().with_summarize_fn(|text, template| {
        let content = match template {
            SummaryTemplate::Comprehensive => "disjoint everywhere".to_string(),
            _ => text.to_string(),
        };
        SummaryArtifact {
            title: "T".to_string(),
            topic: "t".to_string(),
            content_markdown: content,
            keywords: vec![],
        }
    });
    let config = PipelineConfig::default().with_confidence_threshold(0.0);
    let orch = orchestrator(mock.clone(), config);

    let notes = vec![
        note("A", "первый"),
        note("B", "второй"),
        note("C", "третий"),
    ];
    let id = orch.submit_multi_summary(Uuid::new_v4(), notes, None).unwrap();
    let snapshot = wait_terminal(orch.registry(), id).await;

    let result = summary_of(snapshot.result.unwrap());
    assert_eq!(result.processing_method, ProcessingMethod::MultiWorkflow);
    assert_eq!(mock.correct_call_count(), 0, "equality must accept");
}

#[tokio::test]
async fn test_note_count_validation() {
    let orch = orchestrator(MockModelClient::new(), PipelineConfig::default());
    let owner = Uuid::new_v4();

    assert!(matches!(
        orch.submit_multi_summary(owner, vec![], None),
        Err(Error::InvalidInput(_))
    ));

    let too_many: Vec<NoteInput> = (0..65).map(|i| note("t", &format!("body {}", i))).collect();
    assert!(matches!(
        orch.submit_multi_summary(owner, too_many, None),
        Err(Error::InvalidInput(_))
    ));

    assert!(matches!(
        orch.submit_multi_summary(owner, vec![note("empty", "   ")], None),
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_long_notes_are_truncated_before_summarization() {
    use std::sync::Mutex;

    let seen_lengths: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let lengths = seen_lengths.clone();
    let mock = MockModelClient::new().with_summarize_fn(move |text, _| {
        lengths.lock().unwrap().push(text.chars().count());
        SummaryArtifact {
            title: "T".to_string(),
            topic: "t".to_string(),
            content_markdown: text.to_string(),
            keywords: vec![],
        }
    });
    let orch = orchestrator(mock, PipelineConfig::default());

    let long_body = "字".repeat(3000);
    // One note with threshold 1 takes the multi path with a single fan-out.
    let id = orch
        .submit_multi_summary(Uuid::new_v4(), vec![note("long", &long_body)], Some(1))
        .unwrap();
    wait_terminal(orch.registry(), id).await;

    let lengths = seen_lengths.lock().unwrap();
    // First call is the per-note pass: 2000-char budget plus the ellipsis.
    assert_eq!(lengths[0], 2003);
}
