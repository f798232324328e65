//! Term-frequency cosine similarity for confidence scoring.
//!
//! Confidence between a comprehensive summary and each per-note summary is
//! cosine similarity over term-frequency vectors. Tokenization must handle
//! mixed Chinese and English content: CJK codepoints become single-character
//! tokens (Chinese has no word boundaries to split on), while runs of
//! alphanumeric characters become lowercased word tokens.

use std::collections::HashMap;

use unicode_script::{Script, UnicodeScript};

/// True for codepoints tokenized character-by-character.
fn is_cjk(ch: char) -> bool {
    matches!(
        ch.script(),
        Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul
    )
}

/// Tokenize mixed CJK and alphabetic text. All tokens are lowercased.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for ch in text.chars() {
        if is_cjk(ch) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(ch.to_string());
        } else if ch.is_alphanumeric() {
            word.extend(ch.to_lowercase());
        } else if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// Term-frequency vector over a token stream.
fn term_frequencies(tokens: &[String]) -> HashMap<&str, f64> {
    let mut tf: HashMap<&str, f64> = HashMap::new();
    for token in tokens {
        *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine similarity between two texts in `[0, 1]`.
///
/// Empty or token-free inputs score 0.0.
pub fn cosine_similarity(a: &str, b: &str) -> f32 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let tf_a = term_frequencies(&tokens_a);
    let tf_b = term_frequencies(&tokens_b);

    let mut dot = 0.0f64;
    for (token, count_a) in &tf_a {
        if let Some(count_b) = tf_b.get(token) {
            dot += count_a * count_b;
        }
    }

    let norm_a: f64 = tf_a.values().map(|c| c * c).sum::<f64>().sqrt();
    let norm_b: f64 = tf_b.values().map(|c| c * c).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    ((dot / (norm_a * norm_b)) as f32).clamp(0.0, 1.0)
}

/// Score a comprehensive summary against each per-note summary.
///
/// `scores[i]` is the similarity against note `i`; input order is preserved.
pub fn confidence_scores(comprehensive: &str, summaries: &[String]) -> Vec<f32> {
    summaries
        .iter()
        .map(|summary| cosine_similarity(comprehensive, summary))
        .collect()
}
