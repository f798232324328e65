//! Core data model for tasks, inputs, and pipeline artifacts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// TASK LIFECYCLE
// =============================================================================

/// Kind of pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Four-stage smart-note enrichment (OCR → correct → summarize → persist+tag).
    SmartNote,
    /// Fan-out/fan-in multi-note summary workflow.
    MultiSummary,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SmartNote => write!(f, "smart_note"),
            Self::MultiSummary => write!(f, "multi_summary"),
        }
    }
}

/// Status of a task. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl TaskStatus {
    /// Whether the status is one of the absorbing terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// Stage labels across both pipeline kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageLabel {
    // Smart-note stages
    OcrRecognition,
    ErrorCorrection,
    NoteSummary,
    SaveToDatabase,
    // Multi-note stages
    PerNoteSummaries,
    ComprehensiveSummary,
    ConfidenceScoring,
    SummaryCorrection,
}

impl std::fmt::Display for StageLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OcrRecognition => "ocr_recognition",
            Self::ErrorCorrection => "error_correction",
            Self::NoteSummary => "note_summary",
            Self::SaveToDatabase => "save_to_database",
            Self::PerNoteSummaries => "per_note_summaries",
            Self::ComprehensiveSummary => "comprehensive_summary",
            Self::ConfidenceScoring => "confidence_scoring",
            Self::SummaryCorrection => "summary_correction",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// INPUTS
// =============================================================================

/// One note in a multi-note summary request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
}

/// Raw payload of a task. Held by the registry, never exposed on snapshots.
#[derive(Debug, Clone)]
pub enum TaskInput {
    /// Image bytes plus optional title; enters the pipeline at OCR.
    ImageNote {
        image: Vec<u8>,
        title: Option<String>,
    },
    /// Free text plus optional title; skips the OCR stage.
    TextNote {
        text: String,
        title: Option<String>,
    },
    /// Ordered list of notes for the multi-note workflow.
    MultiNote {
        notes: Vec<NoteInput>,
        min_notes_threshold: Option<usize>,
    },
}

impl TaskInput {
    /// The task kind this input selects.
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::ImageNote { .. } | Self::TextNote { .. } => TaskKind::SmartNote,
            Self::MultiNote { .. } => TaskKind::MultiSummary,
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Structured summary produced by the summarization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryArtifact {
    pub title: String,
    pub topic: String,
    pub content_markdown: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// A tag attached to a stored content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TagAssignment {
    pub name: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
    /// True when the tag was minted on first reference.
    pub is_new: bool,
}

/// Final artifact of a completed smart-note task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SmartNoteResult {
    pub ocr_result: String,
    pub corrected_result: String,
    pub summary: SummaryArtifact,
    pub content_id: i64,
    pub tags: Vec<TagAssignment>,
}

/// How a multi-note summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    /// Below-threshold input summarized in one pass.
    Single,
    /// Fan-out workflow, comprehensive summary accepted as-is.
    MultiWorkflow,
    /// Fan-out workflow with one correction pass applied.
    MultiWorkflowCorrected,
}

/// Final artifact of a completed multi-note summary task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryResult {
    pub title: String,
    pub topic: String,
    pub content_markdown: String,
    pub confidence_scores: Vec<f32>,
    pub processing_method: ProcessingMethod,
}

/// Final artifact of any completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    SmartNote(SmartNoteResult),
    MultiSummary(SummaryResult),
}

// =============================================================================
// TASK RECORD
// =============================================================================

/// Classified task failure, surfaced on snapshots and error events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskError {
    /// Wire-level code from the error taxonomy.
    pub kind: String,
    /// Human-readable classification.
    pub message: String,
}

/// One pipeline invocation tracked by the registry.
///
/// Invariants (enforced by registry-mediated transitions):
/// - terminal tasks are immutable until swept
/// - `progress == 100` iff `status == Completed`
/// - `result` is set iff `status == Completed`
/// - `error` is set iff status is `Failed`, `Cancelled`, or `TimedOut`
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    /// Owning user; never mutated after creation.
    pub owner: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// 0–100, monotonically non-decreasing while running.
    pub progress: u8,
    pub current_step: Option<StageLabel>,
    /// Raw request payload.
    pub input: TaskInput,
    /// Artifacts produced so far, keyed by stage output name.
    pub intermediates: BTreeMap<String, JsonValue>,
    pub result: Option<TaskResult>,
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Absolute wall-clock deadline once running.
    pub deadline: Option<DateTime<Utc>>,
}

impl Task {
    /// Construct a new pending task.
    pub fn new(owner: Uuid, input: TaskInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            kind: input.kind(),
            status: TaskStatus::Pending,
            progress: 0,
            current_step: None,
            input,
            intermediates: BTreeMap::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            deadline: None,
        }
    }

    /// Read-only snapshot for API consumers. Omits the input payload and
    /// elides intermediates larger than the snapshot byte limit.
    pub fn snapshot(&self) -> TaskSnapshot {
        let intermediates = self
            .intermediates
            .iter()
            .map(|(k, v)| {
                let rendered = serde_json::to_string(v).unwrap_or_default();
                if rendered.len() > crate::defaults::SNAPSHOT_INTERMEDIATE_MAX_BYTES {
                    (k.clone(), JsonValue::String("<elided>".to_string()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();

        TaskSnapshot {
            id: self.id,
            owner: self.owner,
            kind: self.kind,
            status: self.status,
            progress: self.progress,
            current_step: self.current_step,
            intermediates,
            result: self.result.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Immutable view of a task returned by registry reads.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub owner: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StageLabel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intermediates: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
