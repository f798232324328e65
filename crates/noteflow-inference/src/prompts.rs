//! Prompt template registry.
//!
//! A single registry of prompt strings keyed by template name. Substitution
//! is literal `{placeholder}` replacement with no escaping; callers are
//! responsible for sanitizing interpolated values.

use std::collections::HashMap;

use noteflow_core::{Error, Result};

/// Template name for the OCR extraction prompt.
pub const OCR: &str = "ocr";
/// Template name for the error correction prompt.
pub const CORRECTION: &str = "correction";
/// Template name for the smart-note study summary.
pub const NOTE_SUMMARY: &str = "note_summary";
/// Template name for the below-threshold single-pass summary.
pub const SUMMARY_SINGLE: &str = "summary_single";
/// Template name for one note inside a fan-out.
pub const SUMMARY_PER_NOTE: &str = "summary_per_note";
/// Template name for the comprehensive synthesis.
pub const SUMMARY_COMPREHENSIVE: &str = "summary_comprehensive";
/// Template name for the low-confidence correction pass.
pub const SUMMARY_CORRECTION: &str = "summary_correction";
/// Template name for tag generation.
pub const TAG_GENERATION: &str = "tag_generation";

const JSON_SUMMARY_SCHEMA: &str = r#"Return strictly this JSON object and nothing else:
{"title": "short title", "topic": "subject area", "content_markdown": "the summary in Markdown", "keywords": ["up to 10 keywords"]}"#;

/// Registry of prompt templates, keyed by name.
pub struct PromptRegistry {
    templates: HashMap<String, String>,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        let mut templates = HashMap::new();

        templates.insert(
            OCR.to_string(),
            "Recognize all text in the image, including mathematical formulas and tables. \
             Preserve the original structure and formatting; express formulas in LaTeX."
                .to_string(),
        );

        templates.insert(
            CORRECTION.to_string(),
            "Correct recognition errors in the following text while preserving its \
             structure and formatting. Fix obvious OCR mistakes, keep paragraph layout, \
             ensure LaTeX syntax is valid, and do not add any new content.\n\n\
             Original text:\n{text}\n\nReturn only the corrected text."
                .to_string(),
        );

        templates.insert(
            NOTE_SUMMARY.to_string(),
            format!(
                "Summarize the following note into a structured study summary. Extract the \
                 main topics and key concepts, organize the knowledge points, produce Markdown \
                 suitable for review, and keep LaTeX formulas intact.\n\n\
                 Note content:\n{{content}}\n\n{}",
                JSON_SUMMARY_SCHEMA
            ),
        );

        templates.insert(
            SUMMARY_SINGLE.to_string(),
            format!(
                "Summarize the key knowledge points of the following notes.\n\n\
                 Notes:\n{{content}}\n\n{}",
                JSON_SUMMARY_SCHEMA
            ),
        );

        templates.insert(
            SUMMARY_PER_NOTE.to_string(),
            format!(
                "Summarize the key knowledge points of this single note concisely.\n\n\
                 Note:\n{{content}}\n\n{}",
                JSON_SUMMARY_SCHEMA
            ),
        );

        templates.insert(
            SUMMARY_COMPREHENSIVE.to_string(),
            format!(
                "Synthesize the following per-note summaries into one comprehensive summary. \
                 Merge overlapping points, keep every distinct knowledge point, and organize \
                 the result by topic.\n\n\
                 Per-note summaries:\n{{summaries}}\n\n{}",
                JSON_SUMMARY_SCHEMA
            ),
        );

        templates.insert(
            SUMMARY_CORRECTION.to_string(),
            "The following comprehensive summary diverged from the per-note summaries it \
             was derived from. Revise it so it faithfully covers their content without \
             inventing new material.\n\nComprehensive summary:\n{text}\n\n\
             Return only the revised summary."
                .to_string(),
        );

        templates.insert(
            TAG_GENERATION.to_string(),
            r#"Generate the most relevant tags for the content below.

Content summary:
{summary}

Knowledge record:
{knowledge}

Existing tag names:
{existing_tags}

Rules:
1. Prefer reusing names from the existing tag list when they fit.
2. Mint a new tag only when no existing name is accurate.
3. Tags must be short, specific, and representative; avoid overly broad ones.

Return strictly this JSON object and nothing else:
{"existing": ["matched existing tag"], "new": [{"name": "new tag", "confidence": 0.8}]}"#
                .to_string(),
        );

        Self { templates }
    }
}

impl PromptRegistry {
    /// Registry populated with the built-in templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a raw template.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(|s| s.as_str())
    }

    /// Install or replace a template.
    pub fn set(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Render a template with literal `{placeholder}` substitution.
    ///
    /// Placeholders with no matching variable are left untouched (the JSON
    /// schema braces in the built-in templates rely on this).
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown prompt template: {}", name)))?;

        let mut rendered = template.clone();
        for (key, value) in vars {
            rendered = rendered.replace(&format!("{{{}}}", key), value);
        }
        Ok(rendered)
    }
}
