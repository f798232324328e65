//! Post-summary tag generation.
//!
//! Runs as the tail of the smart-note pipeline: matches the stored content
//! against existing tag names, mints new tags when nothing fits, and
//! persists the associations. Tag generation is best-effort: any failure
//! is downgraded to a warning and the parent task completes with empty tags.

use std::sync::Arc;

use tracing::{debug, warn};

use noteflow_core::{
    defaults, ContentStore, PipelineConfig, Result, SummaryArtifact, TagAssignment,
};
use noteflow_inference::{CallContext, ModelClient, TagProposal};

/// Tag generator attached to the end of the smart-note pipeline.
pub struct TagGenerator {
    models: Arc<dyn ModelClient>,
    store: Arc<dyn ContentStore>,
    max_existing: usize,
    max_tags: usize,
}

impl TagGenerator {
    pub fn new(
        models: Arc<dyn ModelClient>,
        store: Arc<dyn ContentStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            models,
            store,
            max_existing: config.max_existing_tags,
            max_tags: config.max_tags_per_content,
        }
    }

    /// Generate and persist tags for a stored content item.
    ///
    /// Never fails the caller: errors are logged and an empty list returned.
    pub async fn run(
        &self,
        ctx: &CallContext,
        content_id: i64,
        summary: &SummaryArtifact,
        knowledge_text: &str,
    ) -> Vec<TagAssignment> {
        match self.generate(ctx, content_id, summary, knowledge_text).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(content_id, error = %e, "tag generation failed, completing with empty tags");
                Vec::new()
            }
        }
    }

    async fn generate(
        &self,
        ctx: &CallContext,
        content_id: i64,
        summary: &SummaryArtifact,
        knowledge_text: &str,
    ) -> Result<Vec<TagAssignment>> {
        let existing = self.store.list_existing_tags(self.max_existing).await?;
        let proposal = self
            .models
            .generate_tags(ctx, &summary.content_markdown, knowledge_text, &existing)
            .await?;

        let tags = normalize_proposal(proposal, self.max_tags);
        debug!(content_id, count = tags.len(), "normalized tag proposal");

        for tag in &tags {
            let tag_id = self.store.upsert_tag(&tag.name).await?;
            self.store
                .associate(content_id, tag_id, tag.confidence)
                .await?;
        }

        Ok(tags)
    }
}

/// Normalize a raw model proposal into the final tag set.
///
/// Names are trimmed, empties rejected, and duplicates collapsed
/// case-insensitively with `existing` winning over `new`. The result is
/// capped at `max_tags`.
pub fn normalize_proposal(proposal: TagProposal, max_tags: usize) -> Vec<TagAssignment> {
    let mut seen: Vec<String> = Vec::new();
    let mut tags = Vec::new();

    for name in proposal.existing {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let key = name.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        tags.push(TagAssignment {
            name: name.to_string(),
            confidence: defaults::EXISTING_TAG_CONFIDENCE,
            is_new: false,
        });
    }

    for tag in proposal.new {
        let name = tag.name.trim();
        if name.is_empty() {
            continue;
        }
        let key = name.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        tags.push(TagAssignment {
            name: name.to_string(),
            confidence: tag.confidence.clamp(0.0, 1.0),
            is_new: true,
        });
    }

    tags.truncate(max_tags);
    tags
}
