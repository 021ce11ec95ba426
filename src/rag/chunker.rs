use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::rag::types::{ChunkCandidate, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;

/// Split documents into chunks of at most `chunk_size` characters with the
/// given overlap.
/// Pure and deterministic: the same documents and parameters always yield
/// the same chunk boundaries. Non-scalar metadata values are dropped since
/// the store cannot hold them.
pub fn split_documents(
    docs: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<ChunkCandidate>> {
    if chunk_size == 0 {
        return Err(Error::validation("chunk_size must be positive"));
    }
    if chunk_overlap >= chunk_size {
        return Err(Error::validation(format!(
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    let mut candidates = Vec::new();
    for doc in docs {
        let metadata = filter_scalar_metadata(&doc.metadata);
        let mut chunk_index = 0;
        for piece in split_text(&doc.text, chunk_size, chunk_overlap) {
            candidates.push(ChunkCandidate {
                text: piece,
                source_url: doc.source_url.clone(),
                chunk_index,
                metadata: metadata.clone(),
            });
            chunk_index += 1;
        }
    }
    Ok(candidates)
}

/// Fixed windows of `chunk_size` characters; the last `chunk_overlap`
/// characters of each chunk are repeated at the head of the next. Windows
/// are indexed by codepoint, so a chunk can never split one.
fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let char_starts: Vec<usize> = trimmed.char_indices().map(|(i, _)| i).collect();
    let total = char_starts.len();
    let byte_offset = |char_idx: usize| {
        if char_idx >= total {
            trimmed.len()
        } else {
            char_starts[char_idx]
        }
    };

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(total);
        chunks.push(trimmed[byte_offset(start)..byte_offset(end)].to_string());
        if end == total {
            break;
        }
        // overlap < chunk_size is validated, so this always advances
        start = (end - chunk_overlap).max(start + 1);
    }
    chunks
}

/// Keep only metadata values the vector store backend can hold.
fn filter_scalar_metadata(
    metadata: &HashMap<String, serde_json::Value>,
) -> HashMap<String, serde_json::Value> {
    metadata
        .iter()
        .filter(|(_, v)| v.is_string() || v.is_number() || v.is_boolean())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document {
            source_url: "https://example.com".to_string(),
            text: text.to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let docs = vec![doc(&"lorem ipsum dolor sit amet ".repeat(40))];
        let first = split_documents(&docs, 120, 20).unwrap();
        let second = split_documents(&docs, 120, 20).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn twelve_hundred_chars_at_500_no_overlap_gives_three_chunks() {
        let docs = vec![doc(&"a".repeat(1200))];
        let chunks = split_documents(&docs, 500, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 500);
        assert_eq!(chunks[1].text.len(), 500);
        assert_eq!(chunks[2].text.len(), 200);
        assert_eq!(chunks[2].chunk_index, 2);
    }

    #[test]
    fn overlap_repeats_chunk_tail() {
        let chunks = split_text(&"ab".repeat(125), 100, 20);
        assert!(chunks.len() > 1);
        let tail = &chunks[0][chunks[0].len() - 20..];
        assert!(chunks[1].starts_with(tail));
    }

    #[test]
    fn empty_or_whitespace_document_yields_nothing() {
        let chunks = split_documents(&[doc("   \n  ")], 500, 0).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let docs = vec![doc(&"ä".repeat(600))];
        let chunks = split_documents(&docs, 500, 0).unwrap();
        for chunk in &chunks {
            // Slicing inside a code point would have panicked already; make
            // sure nothing was lost either.
            assert!(chunk.text.chars().all(|c| c == 'ä'));
        }
        let total: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert_eq!(total, 600);
    }

    #[test]
    fn chunk_size_counts_characters_not_bytes() {
        // 600 two-byte chars at size 500 must fill the first window
        let docs = vec![doc(&"ä".repeat(600))];
        let chunks = split_documents(&docs, 500, 0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 500);
        assert_eq!(chunks[1].text.chars().count(), 100);
    }

    #[test]
    fn near_size_overlap_on_multibyte_text_does_not_panic() {
        // Overlap one below the window size forces single-char advances
        let docs = vec![doc(&"ä".repeat(16))];
        let chunks = split_documents(&docs, 4, 3).unwrap();
        assert_eq!(chunks.len(), 13);
        for window in chunks.windows(2) {
            assert_eq!(window[0].text.chars().count(), 4);
            let tail: String = window[0].text.chars().skip(1).collect();
            assert!(window[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn non_scalar_metadata_is_dropped() {
        let mut metadata = HashMap::new();
        metadata.insert("title".to_string(), serde_json::json!("Page"));
        metadata.insert("depth".to_string(), serde_json::json!(1));
        metadata.insert("tags".to_string(), serde_json::json!(["a", "b"]));
        metadata.insert("nested".to_string(), serde_json::json!({"k": "v"}));
        let docs = vec![Document {
            source_url: "https://example.com".to_string(),
            text: "enough text to make one chunk".to_string(),
            metadata,
        }];
        let chunks = split_documents(&docs, 500, 0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.contains_key("title"));
        assert!(chunks[0].metadata.contains_key("depth"));
        assert!(!chunks[0].metadata.contains_key("tags"));
        assert!(!chunks[0].metadata.contains_key("nested"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(split_documents(&[doc("text")], 100, 100).is_err());
        assert!(split_documents(&[doc("text")], 0, 0).is_err());
    }
}
