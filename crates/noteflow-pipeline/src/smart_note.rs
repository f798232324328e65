//! The four-stage smart-note pipeline.
//!
//! `ocr_recognition → error_correction → note_summary → save_to_database`,
//! with an `intermediate` event after every stage and a `status` event on
//! each stage entry. Text input skips OCR and enters at correction. The
//! cancellation signal is polled between stages; model calls additionally
//! observe it during retry waits.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use noteflow_core::{
    ContentStore, Error, PipelineConfig, Result, SmartNoteResult, StageLabel, SummaryArtifact,
    TaskInput,
};
use noteflow_inference::{CallContext, ModelClient, SummaryTemplate};

use crate::registry::TaskRegistry;
use crate::tagging::TagGenerator;

// Stage entry and exit progress percentages.
const PROGRESS_OCR_ENTRY: u8 = 5;
const PROGRESS_OCR_EXIT: u8 = 30;
const PROGRESS_CORRECTION_EXIT: u8 = 55;
const PROGRESS_SUMMARY_EXIT: u8 = 80;

/// Linear four-stage smart-note pipeline.
pub struct SmartNotePipeline {
    models: Arc<dyn ModelClient>,
    store: Arc<dyn ContentStore>,
    tags: TagGenerator,
}

impl SmartNotePipeline {
    pub fn new(
        models: Arc<dyn ModelClient>,
        store: Arc<dyn ContentStore>,
        config: &PipelineConfig,
    ) -> Self {
        let tags = TagGenerator::new(models.clone(), store.clone(), config);
        Self {
            models,
            store,
            tags,
        }
    }

    /// Drive one smart-note task to its result.
    ///
    /// The caller owns the terminal transition; this method only produces
    /// stage events and the final [`SmartNoteResult`].
    #[instrument(skip_all, fields(task_id = %id))]
    pub async fn run(
        &self,
        registry: &TaskRegistry,
        id: Uuid,
        owner: Uuid,
        input: TaskInput,
        ctx: &CallContext,
    ) -> Result<SmartNoteResult> {
        let (ocr_text, title) = self.ocr_stage(registry, id, input, ctx).await?;

        check_cancelled(ctx)?;
        registry.set_stage(id, StageLabel::ErrorCorrection, PROGRESS_OCR_EXIT);
        let corrected = self.models.correct(ctx, &ocr_text).await?;
        registry.record_intermediate(id, "corrected_text", json!(corrected), None, None, None);
        registry.set_progress(id, PROGRESS_CORRECTION_EXIT);

        check_cancelled(ctx)?;
        registry.set_stage(id, StageLabel::NoteSummary, PROGRESS_CORRECTION_EXIT);
        let mut summary = self
            .models
            .summarize(ctx, &corrected, SummaryTemplate::Note)
            .await?;
        // A caller-provided title wins over the generated one.
        if let Some(title) = title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            summary.title = title.to_string();
        }
        registry.record_intermediate(id, "summary", json!(summary), None, None, None);
        registry.set_progress(id, PROGRESS_SUMMARY_EXIT);

        check_cancelled(ctx)?;
        registry.set_stage(id, StageLabel::SaveToDatabase, PROGRESS_SUMMARY_EXIT);
        let knowledge_text = build_knowledge_text(&summary);
        let content_id = self
            .store
            .store_content(owner, &corrected, &summary, &knowledge_text)
            .await?;
        registry.record_intermediate(id, "content_id", json!(content_id), None, None, None);
        debug!(content_id, "content stored");

        let tags = self.tags.run(ctx, content_id, &summary, &knowledge_text).await;
        registry.record_intermediate(id, "tags", json!(tags), None, None, None);

        Ok(SmartNoteResult {
            ocr_result: ocr_text,
            corrected_result: corrected,
            summary,
            content_id,
            tags,
        })
    }

    /// Entry stage: run OCR for image input, or skip it for text input.
    async fn ocr_stage(
        &self,
        registry: &TaskRegistry,
        id: Uuid,
        input: TaskInput,
        ctx: &CallContext,
    ) -> Result<(String, Option<String>)> {
        check_cancelled(ctx)?;
        match input {
            TaskInput::ImageNote { image, title } => {
                registry.set_stage(id, StageLabel::OcrRecognition, PROGRESS_OCR_ENTRY);
                let text = self.models.ocr(ctx, &image, None).await?;
                registry.record_intermediate(id, "ocr_text", json!(text), None, None, None);
                Ok((text, title))
            }
            TaskInput::TextNote { text, title } => {
                registry.record_intermediate(
                    id,
                    "ocr_text",
                    json!(text),
                    None,
                    None,
                    Some(true),
                );
                Ok((text, title))
            }
            TaskInput::MultiNote { .. } => Err(Error::Internal(
                "multi-note input routed to the smart-note pipeline".to_string(),
            )),
        }
    }
}

/// Knowledge record derived from the summary artifact.
///
/// Stored alongside the corrected text and later offered to the tag model.
pub fn build_knowledge_text(summary: &SummaryArtifact) -> String {
    let mut text = format!("# {}\n\n", summary.title);
    if !summary.keywords.is_empty() {
        text.push_str(&format!("Keywords: {}\n\n", summary.keywords.join(", ")));
    }
    text.push_str(&summary.content_markdown);
    text
}

fn check_cancelled(ctx: &CallContext) -> Result<()> {
    if ctx.cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
