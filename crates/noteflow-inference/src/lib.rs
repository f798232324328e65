//! # noteflow-inference
//!
//! Model client abstraction for the noteflow enrichment service.
//!
//! This crate provides:
//! - The [`ModelClient`] trait covering the four semantic operations
//!   (OCR, correction, summarization, tag generation)
//! - An OpenAI-compatible HTTP backend with per-operation model selection
//! - Retry with exponential backoff, jitter, and deadline awareness
//! - A prompt template registry with literal placeholder substitution
//! - A deterministic mock client for testing
//!
//! # Example
//!
//! ```rust,no_run
//! use noteflow_inference::{CallContext, ModelClient, OpenAiModelClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = OpenAiModelClient::from_env().unwrap();
//!     let ctx = CallContext::unbounded();
//!     let corrected = client.correct(&ctx, "teh speed of lihgt").await.unwrap();
//!     println!("{}", corrected);
//! }
//! ```

pub mod client;
pub mod mock;
pub mod openai;
pub mod prompts;
pub mod retry;

// Re-export core types
pub use noteflow_core::{Error, Result};

pub use client::{CallContext, ModelClient, NewTag, SummaryTemplate, TagProposal};
pub use mock::MockModelClient;
pub use openai::{ModelConfig, OpenAiModelClient};
pub use prompts::PromptRegistry;
pub use retry::{retry_call, CallError, RetryPolicy};
