//! The model client contract shared by all backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use noteflow_core::{CancelToken, Result, SummaryArtifact};

/// Per-call execution context.
///
/// Carries the task's absolute deadline and cancellation token so retry
/// waits never outlive the task budget and cancellation is observed at
/// every model-call boundary.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Absolute deadline inherited from the owning task, if any.
    pub deadline: Option<Instant>,
    /// Cooperative cancellation signal.
    pub cancel: CancelToken,
}

impl CallContext {
    /// Context with no deadline and a never-firing cancellation token.
    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            cancel: CancelToken::never(),
        }
    }

    /// Context bound to a task's deadline and cancellation token.
    pub fn new(deadline: Option<Instant>, cancel: CancelToken) -> Self {
        Self { deadline, cancel }
    }

    /// Time left until the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Which summary prompt template to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTemplate {
    /// Smart-note study summary of a single corrected note.
    Note,
    /// Below-threshold multi-note input summarized in one pass.
    Single,
    /// One note inside a fan-out.
    PerNote,
    /// Comprehensive synthesis of per-note summaries.
    Comprehensive,
}

impl SummaryTemplate {
    /// Registry key for this template.
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Note => "note_summary",
            Self::Single => "summary_single",
            Self::PerNote => "summary_per_note",
            Self::Comprehensive => "summary_comprehensive",
        }
    }
}

/// A tag the model proposes to mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Output of the tag generation operation.
///
/// The model is instructed to prefer reusing names from the provided set and
/// to mint new ones only when no existing name fits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagProposal {
    #[serde(default)]
    pub existing: Vec<String>,
    #[serde(default)]
    pub new: Vec<NewTag>,
}

/// Uniform interface to the OCR, correction, summarization, and tag models.
///
/// Implementations own their retry policy; callers only provide the
/// [`CallContext`] bounding each call.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Extract text from an image. `prompt` overrides the default OCR prompt.
    async fn ocr(&self, ctx: &CallContext, image: &[u8], prompt: Option<&str>) -> Result<String>;

    /// Correct recognition or synthesis errors without rewriting content.
    async fn correct(&self, ctx: &CallContext, text: &str) -> Result<String>;

    /// Produce a structured summary using the selected template.
    async fn summarize(
        &self,
        ctx: &CallContext,
        text: &str,
        template: SummaryTemplate,
    ) -> Result<SummaryArtifact>;

    /// Match existing tags and propose new ones for a stored content item.
    async fn generate_tags(
        &self,
        ctx: &CallContext,
        summary: &str,
        knowledge_text: &str,
        existing: &[String],
    ) -> Result<TagProposal>;
}
