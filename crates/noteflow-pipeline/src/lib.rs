//! # noteflow-pipeline
//!
//! Task orchestration and AI processing pipelines for the noteflow service.
//!
//! This crate provides:
//! - An in-memory task registry with TTL cleanup and cooperative cancellation
//! - A counting-semaphore concurrency gate with queue-wait timeout
//! - A content-hash result cache with LRU eviction
//! - The four-stage smart-note pipeline with live progress events
//! - The fan-out/fan-in multi-note summary workflow with confidence scoring
//! - The post-summary tag generator
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use noteflow_core::PipelineConfig;
//! use noteflow_inference::OpenAiModelClient;
//! use noteflow_pipeline::{MemoryContentStore, Orchestrator};
//!
//! let models = Arc::new(OpenAiModelClient::from_env()?);
//! let store = Arc::new(MemoryContentStore::new());
//! let orchestrator = Orchestrator::new(models, store, PipelineConfig::from_env());
//!
//! let task_id = orchestrator.submit_smart_note_text(owner, "光速约为3×10^8 m/s", Some("Physics"))?;
//! let (burst, live) = orchestrator.registry().bus(task_id).unwrap().subscribe();
//! ```

pub mod cache;
pub mod gate;
pub mod multi_note;
pub mod orchestrator;
pub mod registry;
pub mod smart_note;
pub mod store;
pub mod tagging;

// Re-export core types
pub use noteflow_core::*;

pub use cache::ResultCache;
pub use gate::ConcurrencyGate;
pub use multi_note::MultiNoteWorkflow;
pub use orchestrator::Orchestrator;
pub use registry::TaskRegistry;
pub use smart_note::SmartNotePipeline;
pub use store::MemoryContentStore;
pub use tagging::TagGenerator;
