//! Core traits for noteflow abstractions.
//!
//! These traits define the seams toward external collaborators, enabling
//! pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::SummaryArtifact;

/// Persistence collaborator for enriched content and tags.
///
/// The real implementation lives in a separate service; the pipeline treats
/// it as opaque. All write operations are idempotent on their natural keys
/// (`upsert_tag` on name, `associate` on `(content_id, tag_id)`).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store corrected text, the summary artifact, and the knowledge record.
    /// Returns the new content's identifier (positive).
    async fn store_content(
        &self,
        owner: Uuid,
        corrected_text: &str,
        summary: &SummaryArtifact,
        knowledge_text: &str,
    ) -> Result<i64>;

    /// Names of existing tags, most used first, capped at `limit`.
    async fn list_existing_tags(&self, limit: usize) -> Result<Vec<String>>;

    /// Create the tag if missing and return its id. Idempotent on name.
    async fn upsert_tag(&self, name: &str) -> Result<i64>;

    /// Associate a tag with a content item. Idempotent on the pair.
    async fn associate(&self, content_id: i64, tag_id: i64, confidence: f32) -> Result<()>;

    /// Mark a content item as publicly visible in the community layer.
    async fn set_content_public(
        &self,
        content_id: i64,
        public_title: &str,
        public_description: &str,
        published_at: DateTime<Utc>,
    ) -> Result<()>;
}
