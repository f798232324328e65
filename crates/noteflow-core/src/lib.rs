//! # noteflow-core
//!
//! Core types, traits, and abstractions for the noteflow enrichment service.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other noteflow crates depend on:
//! - Task model and lifecycle types
//! - Error taxonomy with wire-level error codes
//! - Per-task progress event bus with replay for late subscribers
//! - Content hashing for de-duplication
//! - Term-frequency similarity scoring for confidence checks
//! - The persistence collaborator contract

pub mod cancel;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod hash;
pub mod image;
pub mod logging;
pub mod models;
pub mod similarity;
pub mod traits;

// Re-export commonly used types at crate root
pub use cancel::{CancelHandle, CancelToken};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use events::{TaskEvent, TaskEventBus};
pub use hash::{content_hash, multi_note_hash, normalize_text, normalize_title, ContentHash};
pub use image::{detect_image_type, ImageType};
pub use models::*;
pub use similarity::{confidence_scores, cosine_similarity, tokenize};
pub use traits::ContentStore;
