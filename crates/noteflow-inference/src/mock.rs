//! Mock model client for deterministic testing.
//!
//! Provides scripted responses for all four operations plus call logging,
//! so pipeline tests can assert which models were invoked and how often.
//!
//! ## Usage
//!
//! ```rust
//! use noteflow_inference::{CallContext, MockModelClient, ModelClient};
//!
//! # #[tokio::main] async fn main() {
//! let client = MockModelClient::new().with_ocr_text("HELLO");
//! let ctx = CallContext::unbounded();
//! let text = client.ocr(&ctx, b"fake image bytes", None).await.unwrap();
//! assert_eq!(text, "HELLO");
//! assert_eq!(client.ocr_call_count(), 1);
//! # }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use noteflow_core::{Error, Result, SummaryArtifact};

use crate::client::{CallContext, ModelClient, NewTag, SummaryTemplate, TagProposal};

type SummarizeFn = dyn Fn(&str, SummaryTemplate) -> SummaryArtifact + Send + Sync;

/// One logged model call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

struct MockBehavior {
    ocr_text: String,
    /// `None` echoes the input unchanged.
    correct_response: Option<String>,
    summarize_fn: Option<Box<SummarizeFn>>,
    tags: TagProposal,
    latency: Duration,
    /// Operation name that fails with `ModelUnavailable`.
    failing_op: Option<String>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            ocr_text: "mock recognized text".to_string(),
            correct_response: None,
            summarize_fn: None,
            tags: TagProposal {
                existing: vec![],
                new: vec![NewTag {
                    name: "notes".to_string(),
                    confidence: 0.9,
                }],
            },
            latency: Duration::ZERO,
            failing_op: None,
        }
    }
}

/// Scripted [`ModelClient`] implementation.
#[derive(Clone)]
pub struct MockModelClient {
    behavior: Arc<MockBehavior>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockModelClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModelClient {
    /// Create a mock with default behavior.
    pub fn new() -> Self {
        Self {
            behavior: Arc::new(MockBehavior::default()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn behavior_mut(&mut self) -> &mut MockBehavior {
        Arc::get_mut(&mut self.behavior).expect("configure the mock before cloning it")
    }

    /// Set the text the OCR operation returns.
    pub fn with_ocr_text(mut self, text: impl Into<String>) -> Self {
        self.behavior_mut().ocr_text = text.into();
        self
    }

    /// Set a fixed correction response (default echoes the input).
    pub fn with_correct_response(mut self, response: impl Into<String>) -> Self {
        self.behavior_mut().correct_response = Some(response.into());
        self
    }

    /// Replace the summarization behavior.
    pub fn with_summarize_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, SummaryTemplate) -> SummaryArtifact + Send + Sync + 'static,
    {
        self.behavior_mut().summarize_fn = Some(Box::new(f));
        self
    }

    /// Set the tag proposal returned by `generate_tags`.
    pub fn with_tags(mut self, tags: TagProposal) -> Self {
        self.behavior_mut().tags = tags;
        self
    }

    /// Simulate per-call latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior_mut().latency = latency;
        self
    }

    /// Make one operation ("ocr", "correct", "summarize", "generate_tags")
    /// fail with `ModelUnavailable`.
    pub fn with_failing_op(mut self, op: impl Into<String>) -> Self {
        self.behavior_mut().failing_op = Some(op.into());
        self
    }

    /// All logged calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == op)
            .count()
    }

    pub fn ocr_call_count(&self) -> usize {
        self.count("ocr")
    }

    pub fn correct_call_count(&self) -> usize {
        self.count("correct")
    }

    pub fn summarize_call_count(&self) -> usize {
        self.count("summarize")
    }

    pub fn tag_call_count(&self) -> usize {
        self.count("generate_tags")
    }

    async fn enter(&self, op: &str, input: &str) -> Result<()> {
        self.calls.lock().unwrap().push(MockCall {
            operation: op.to_string(),
            input: input.chars().take(200).collect(),
        });
        if self.behavior.latency > Duration::ZERO {
            tokio::time::sleep(self.behavior.latency).await;
        }
        if self.behavior.failing_op.as_deref() == Some(op) {
            return Err(Error::ModelUnavailable(format!(
                "mock failure for {}",
                op
            )));
        }
        Ok(())
    }

    /// Default summary derived from the input so similarity-based tests
    /// behave like a faithful summarizer: shared input tokens produce
    /// similar summaries.
    fn default_summary(text: &str) -> SummaryArtifact {
        let title: String = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("Note summary")
            .chars()
            .take(50)
            .collect();

        let mut keywords = Vec::new();
        for token in noteflow_core::tokenize(text) {
            if token.chars().count() > 2 && !keywords.contains(&token) {
                keywords.push(token);
            }
            if keywords.len() == 5 {
                break;
            }
        }

        let body: String = text.chars().take(400).collect();
        SummaryArtifact {
            title,
            topic: "general".to_string(),
            content_markdown: format!("- {}", body),
            keywords,
        }
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn ocr(&self, _ctx: &CallContext, image: &[u8], _prompt: Option<&str>) -> Result<String> {
        self.enter("ocr", &format!("{} bytes", image.len())).await?;
        Ok(self.behavior.ocr_text.clone())
    }

    async fn correct(&self, _ctx: &CallContext, text: &str) -> Result<String> {
        self.enter("correct", text).await?;
        Ok(self
            .behavior
            .correct_response
            .clone()
            .unwrap_or_else(|| text.to_string()))
    }

    async fn summarize(
        &self,
        _ctx: &CallContext,
        text: &str,
        template: SummaryTemplate,
    ) -> Result<SummaryArtifact> {
        self.enter("summarize", text).await?;
        Ok(match &self.behavior.summarize_fn {
            Some(f) => f(text, template),
            None => Self::default_summary(text),
        })
    }

    async fn generate_tags(
        &self,
        _ctx: &CallContext,
        summary: &str,
        _knowledge_text: &str,
        _existing: &[String],
    ) -> Result<TagProposal> {
        self.enter("generate_tags", summary).await?;
        Ok(self.behavior.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_defaults() {
        let client = MockModelClient::new();
        let ctx = CallContext::unbounded();

        let ocr = client.ocr(&ctx, b"img", None).await.unwrap();
        assert_eq!(ocr, "mock recognized text");

        let corrected = client.correct(&ctx, "same text").await.unwrap();
        assert_eq!(corrected, "same text", "default correction echoes input");

        let summary = client
            .summarize(&ctx, "Gradient descent notes", SummaryTemplate::Note)
            .await
            .unwrap();
        assert!(summary.content_markdown.contains("Gradient descent"));
    }

    #[tokio::test]
    async fn test_mock_call_logging() {
        let client = MockModelClient::new();
        let ctx = CallContext::unbounded();

        client.ocr(&ctx, b"img", None).await.unwrap();
        client.correct(&ctx, "a").await.unwrap();
        client.correct(&ctx, "b").await.unwrap();

        assert_eq!(client.ocr_call_count(), 1);
        assert_eq!(client.correct_call_count(), 2);
        assert_eq!(client.summarize_call_count(), 0);
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_clone_shares_call_log() {
        let client = MockModelClient::new();
        let clone = client.clone();
        let ctx = CallContext::unbounded();

        clone.correct(&ctx, "x").await.unwrap();
        assert_eq!(client.correct_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failing_op() {
        let client = MockModelClient::new().with_failing_op("generate_tags");
        let ctx = CallContext::unbounded();

        let result = client.generate_tags(&ctx, "s", "k", &[]).await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));

        // Other operations are unaffected.
        assert!(client.correct(&ctx, "fine").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_custom_summarize_fn() {
        let client = MockModelClient::new().with_summarize_fn(|_, template| SummaryArtifact {
            title: format!("{:?}", template),
            topic: "t".into(),
            content_markdown: "fixed".into(),
            keywords: vec![],
        });
        let ctx = CallContext::unbounded();

        let artifact = client
            .summarize(&ctx, "x", SummaryTemplate::Comprehensive)
            .await
            .unwrap();
        assert_eq!(artifact.title, "Comprehensive");
        assert_eq!(artifact.content_markdown, "fixed");
    }

    #[test]
    fn test_default_summary_shares_tokens_with_input() {
        let summary = MockModelClient::default_summary("梯度下降 gradient descent");
        let score =
            noteflow_core::cosine_similarity(&summary.content_markdown, "梯度下降 gradient descent");
        assert!(score > 0.8, "summary should echo input tokens, got {}", score);
    }
}
