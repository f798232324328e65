//! In-memory persistence collaborator.
//!
//! Stands in for the external persistence service in tests and local runs.
//! Behaves per the collaborator contract: `upsert_tag` is idempotent on
//! name, `associate` on the `(content_id, tag_id)` pair.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use noteflow_core::{ContentStore, Error, Result, SummaryArtifact};

/// A stored content record.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub id: i64,
    pub owner: Uuid,
    pub corrected_text: String,
    pub summary: SummaryArtifact,
    pub knowledge_text: String,
    pub public: Option<PublicInfo>,
}

/// Community visibility metadata.
#[derive(Debug, Clone)]
pub struct PublicInfo {
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreInner {
    contents: Vec<StoredContent>,
    /// name → id, insertion-ordered ids starting at 1.
    tags: Vec<(String, i64)>,
    associations: HashMap<(i64, i64), f32>,
    next_content_id: i64,
    next_tag_id: i64,
}

/// Thread-safe in-memory [`ContentStore`] implementation.
#[derive(Default)]
pub struct MemoryContentStore {
    inner: Mutex<StoreInner>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tag table, for tests exercising existing-tag matching.
    pub fn with_existing_tags(self, names: &[&str]) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            for name in names {
                inner.next_tag_id += 1;
                let id = inner.next_tag_id;
                inner.tags.push((name.to_string(), id));
            }
        }
        self
    }

    /// Snapshot of stored contents.
    pub fn contents(&self) -> Vec<StoredContent> {
        self.inner.lock().unwrap().contents.clone()
    }

    /// All tag names, in creation order.
    pub fn tag_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .tags
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// `(tag_name, confidence)` associations for one content item.
    pub fn associations_for(&self, content_id: i64) -> Vec<(String, f32)> {
        let inner = self.inner.lock().unwrap();
        inner
            .associations
            .iter()
            .filter(|((cid, _), _)| *cid == content_id)
            .map(|((_, tag_id), confidence)| {
                let name = inner
                    .tags
                    .iter()
                    .find(|(_, id)| id == tag_id)
                    .map(|(name, _)| name.clone())
                    .unwrap_or_default();
                (name, *confidence)
            })
            .collect()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn store_content(
        &self,
        owner: Uuid,
        corrected_text: &str,
        summary: &SummaryArtifact,
        knowledge_text: &str,
    ) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_content_id += 1;
        let id = inner.next_content_id;
        inner.contents.push(StoredContent {
            id,
            owner,
            corrected_text: corrected_text.to_string(),
            summary: summary.clone(),
            knowledge_text: knowledge_text.to_string(),
            public: None,
        });
        Ok(id)
    }

    async fn list_existing_tags(&self, limit: usize) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tags
            .iter()
            .take(limit)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn upsert_tag(&self, name: &str) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if let Some((_, id)) = inner.tags.iter().find(|(n, _)| n == name) {
            return Ok(*id);
        }
        inner.next_tag_id += 1;
        let id = inner.next_tag_id;
        inner.tags.push((name.to_string(), id));
        Ok(id)
    }

    async fn associate(&self, content_id: i64, tag_id: i64, confidence: f32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.associations.insert((content_id, tag_id), confidence);
        Ok(())
    }

    async fn set_content_public(
        &self,
        content_id: i64,
        public_title: &str,
        public_description: &str,
        published_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let content = inner
            .contents
            .iter_mut()
            .find(|c| c.id == content_id)
            .ok_or_else(|| {
                Error::PersistenceFailed(format!("unknown content id {}", content_id))
            })?;
        content.public = Some(PublicInfo {
            title: public_title.to_string(),
            description: public_description.to_string(),
            published_at,
        });
        Ok(())
    }
}
