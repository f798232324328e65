//! Content hashing for deterministic task de-duplication.
//!
//! Hashes are computed over *normalized* input: UTF-8 NFC, leading and
//! trailing whitespace stripped, and titles lowercased. Two submissions that
//! differ only in those respects share a hash and therefore a cached result.
//! Image inputs are deliberately not hashed: byte-identical images are rare
//! in practice and perceptual hashing is out of scope.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::models::{NoteInput, TaskKind};

/// 32-byte SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Field separator inside the hash preimage.
const FIELD_SEP: u8 = 0x1f;
/// Record separator between notes of a multi-note input.
const RECORD_SEP: u8 = 0x1e;

/// Normalize free text: NFC, trimmed.
pub fn normalize_text(text: &str) -> String {
    text.trim().nfc().collect()
}

/// Normalize a title: NFC, trimmed, lowercased.
pub fn normalize_title(title: &str) -> String {
    title.trim().nfc().collect::<String>().to_lowercase()
}

/// Hash a single-note text input.
pub fn content_hash(kind: TaskKind, text: &str, title: Option<&str>) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(kind.to_string().as_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(normalize_title(title.unwrap_or_default()).as_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(normalize_text(text).as_bytes());
    hasher.finalize().into()
}

/// Hash an ordered multi-note input.
pub fn multi_note_hash(notes: &[NoteInput]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(TaskKind::MultiSummary.to_string().as_bytes());
    for note in notes {
        hasher.update([RECORD_SEP]);
        hasher.update(normalize_title(&note.title).as_bytes());
        hasher.update([FIELD_SEP]);
        hasher.update(normalize_text(&note.content).as_bytes());
    }
    hasher.finalize().into()
}
