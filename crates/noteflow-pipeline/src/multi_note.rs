//! The fan-out/fan-in multi-note summary workflow.
//!
//! Below the note-count threshold the input is summarized in one pass.
//! At or above it: per-note summaries run in parallel (bounded fan-out,
//! order-preserving results, each emitted as it arrives), a comprehensive
//! summary is synthesized, its confidence against every per-note summary is
//! scored, and a single correction pass runs when the mean falls below the
//! acceptance threshold.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};
use uuid::Uuid;

use noteflow_core::{
    confidence_scores, cosine_similarity, Error, NoteInput, PipelineConfig, ProcessingMethod,
    Result, StageLabel, SummaryArtifact, SummaryResult,
};
use noteflow_inference::{CallContext, ModelClient, SummaryTemplate};

use crate::registry::TaskRegistry;

// Fan-out progress advances proportionally inside the 10–60 band.
const PROGRESS_FANOUT_ENTRY: u8 = 10;
const PROGRESS_FANOUT_BAND: u8 = 50;
const PROGRESS_COMPREHENSIVE_EXIT: u8 = 75;
const PROGRESS_SCORING_EXIT: u8 = 85;
const PROGRESS_CORRECTION_EXIT: u8 = 95;

// Single-path progress points.
const PROGRESS_SINGLE_ENTRY: u8 = 20;
const PROGRESS_SINGLE_EXIT: u8 = 90;

/// Fan-out/fan-in workflow over an ordered list of notes.
pub struct MultiNoteWorkflow {
    models: Arc<dyn ModelClient>,
    config: PipelineConfig,
}

impl MultiNoteWorkflow {
    pub fn new(models: Arc<dyn ModelClient>, config: PipelineConfig) -> Self {
        Self { models, config }
    }

    /// Drive one multi-note task to its result.
    #[instrument(skip_all, fields(task_id = %id, notes = notes.len()))]
    pub async fn run(
        &self,
        registry: &TaskRegistry,
        id: Uuid,
        notes: Vec<NoteInput>,
        min_notes_threshold: Option<usize>,
        ctx: &CallContext,
    ) -> Result<SummaryResult> {
        let threshold = min_notes_threshold.unwrap_or(self.config.min_notes_threshold);
        if notes.len() < threshold {
            self.run_single(registry, id, notes, ctx).await
        } else {
            self.run_workflow(registry, id, notes, ctx).await
        }
    }

    /// Below-threshold path: one summarization pass over the joined notes.
    async fn run_single(
        &self,
        registry: &TaskRegistry,
        id: Uuid,
        notes: Vec<NoteInput>,
        ctx: &CallContext,
    ) -> Result<SummaryResult> {
        check_cancelled(ctx)?;
        registry.set_stage(id, StageLabel::NoteSummary, PROGRESS_SINGLE_ENTRY);

        let joined = notes
            .iter()
            .map(|n| truncate_content(&n.content, self.config.max_content_length))
            .collect::<Vec<_>>()
            .join("\n\n");
        let artifact = self
            .models
            .summarize(ctx, &joined, SummaryTemplate::Single)
            .await?;
        registry.record_intermediate(id, "summary", json!(artifact), None, None, None);
        registry.set_progress(id, PROGRESS_SINGLE_EXIT);

        // One score: how faithfully the summary reflects the joined input.
        let score = cosine_similarity(&artifact.content_markdown, &joined);
        registry.record_intermediate(id, "confidence_scores", json!([score]), None, None, None);

        Ok(SummaryResult {
            title: artifact.title,
            topic: artifact.topic,
            content_markdown: artifact.content_markdown,
            confidence_scores: vec![score],
            processing_method: ProcessingMethod::Single,
        })
    }

    /// Full workflow: fan-out, comprehensive summary, scoring, decision.
    async fn run_workflow(
        &self,
        registry: &TaskRegistry,
        id: Uuid,
        notes: Vec<NoteInput>,
        ctx: &CallContext,
    ) -> Result<SummaryResult> {
        check_cancelled(ctx)?;
        registry.set_stage(id, StageLabel::PerNoteSummaries, PROGRESS_FANOUT_ENTRY);
        let per_note = self.fan_out(registry, id, &notes, ctx).await?;

        check_cancelled(ctx)?;
        registry.set_stage(
            id,
            StageLabel::ComprehensiveSummary,
            PROGRESS_FANOUT_ENTRY + PROGRESS_FANOUT_BAND,
        );
        let joined = per_note
            .iter()
            .enumerate()
            .map(|(i, artifact)| format!("## Note {} summary\n{}", i + 1, artifact.content_markdown))
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut comprehensive = self
            .models
            .summarize(ctx, &joined, SummaryTemplate::Comprehensive)
            .await?;
        registry.record_intermediate(
            id,
            "comprehensive_summary",
            json!(comprehensive),
            None,
            None,
            None,
        );
        registry.set_progress(id, PROGRESS_COMPREHENSIVE_EXIT);

        check_cancelled(ctx)?;
        registry.set_stage(id, StageLabel::ConfidenceScoring, PROGRESS_COMPREHENSIVE_EXIT);
        let per_note_contents: Vec<String> = per_note
            .iter()
            .map(|a| a.content_markdown.clone())
            .collect();
        let mut scores = confidence_scores(&comprehensive.content_markdown, &per_note_contents);
        registry.record_intermediate(id, "confidence_scores", json!(scores), None, None, None);
        registry.set_progress(id, PROGRESS_SCORING_EXIT);

        let mean = mean(&scores);
        debug!(mean, threshold = self.config.confidence_threshold, "confidence decision");

        // Equal-to-threshold accepts; at most one correction pass.
        let processing_method = if mean >= self.config.confidence_threshold {
            ProcessingMethod::MultiWorkflow
        } else {
            check_cancelled(ctx)?;
            registry.set_stage(id, StageLabel::SummaryCorrection, PROGRESS_SCORING_EXIT);
            let corrected = self
                .models
                .correct(ctx, &comprehensive.content_markdown)
                .await?;
            comprehensive.content_markdown = corrected;
            scores = confidence_scores(&comprehensive.content_markdown, &per_note_contents);
            registry.record_intermediate(id, "confidence_scores", json!(scores), None, None, None);
            registry.set_progress(id, PROGRESS_CORRECTION_EXIT);
            ProcessingMethod::MultiWorkflowCorrected
        };

        Ok(SummaryResult {
            title: comprehensive.title,
            topic: comprehensive.topic,
            content_markdown: comprehensive.content_markdown,
            confidence_scores: scores,
            processing_method,
        })
    }

    /// Summarize every note in parallel, bounded by the fan-out limit.
    ///
    /// Per-note intermediates are emitted as they arrive, tagged with
    /// `(index, total)`; the returned vector preserves input order.
    async fn fan_out(
        &self,
        registry: &TaskRegistry,
        id: Uuid,
        notes: &[NoteInput],
        ctx: &CallContext,
    ) -> Result<Vec<SummaryArtifact>> {
        let total = notes.len();
        let limiter = Arc::new(Semaphore::new(self.config.fanout_limit));
        let mut tasks = JoinSet::new();

        for (index, note) in notes.iter().enumerate() {
            let models = self.models.clone();
            let ctx = ctx.clone();
            let limiter = limiter.clone();
            let text = truncate_content(&note.content, self.config.max_content_length);
            tasks.spawn(async move {
                let _permit = limiter
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::Internal("fan-out limiter closed".to_string()))?;
                let artifact = models
                    .summarize(&ctx, &text, SummaryTemplate::PerNote)
                    .await?;
                Ok::<_, Error>((index, artifact))
            });
        }

        let mut slots: Vec<Option<SummaryArtifact>> = vec![None; total];
        let mut completed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (index, artifact) = joined
                .map_err(|e| Error::Internal(format!("fan-out task panicked: {}", e)))??;
            registry.record_intermediate(
                id,
                "per_note_summary",
                json!(artifact),
                Some(index),
                Some(total),
                None,
            );
            slots[index] = Some(artifact);
            completed += 1;
            let progress = PROGRESS_FANOUT_ENTRY
                + (completed * PROGRESS_FANOUT_BAND as usize / total) as u8;
            registry.set_progress(id, progress);

            if ctx.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.expect("every fan-out index resolves exactly once"))
            .collect())
    }
}

fn mean(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f32>() / scores.len() as f32
}

/// Truncate to the configured character budget, appending an ellipsis.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let mut truncated: String = content.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }
}

fn check_cancelled(ctx: &CallContext) -> Result<()> {
    if ctx.cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
