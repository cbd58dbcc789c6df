//! Sliding-window text chunker.
//!
//! Splits a document's normalized text into fixed-size, overlapping
//! [`Chunk`]s. Window positions are measured in characters so multi-byte
//! text never splits inside a code point.
//!
//! Each chunk receives a deterministic index, provenance metadata, and a
//! SHA-256 hash of its content for staleness detection.
//!
//! # Algorithm
//!
//! Each chunk spans `[start, start + chunk_size)`; the next window starts
//! at `end - overlap`. Iteration stops when a window reaches the end of the
//! text, so a document no longer than `chunk_size` produces exactly one
//! chunk. For longer text the chunk count is
//! `ceil((len - overlap) / (chunk_size - overlap))`.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::SieveError;
use crate::models::{Chunk, ChunkMetadata, Document};

/// Split a document's normalized text into overlapping chunks.
///
/// Returns chunks with contiguous indices starting at 0. Rejects
/// configurations that cannot advance: `chunk_size == 0`, or
/// `overlap >= chunk_size`.
pub fn chunk_document(
    document: &Document,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, SieveError> {
    if chunk_size == 0 {
        return Err(SieveError::Configuration(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(SieveError::Configuration(format!(
            "overlap ({}) must be < chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let text: Vec<char> = document.normalized_text.chars().collect();
    let len = text.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(len);
        let content: String = text[start..end].iter().collect();
        chunks.push(make_chunk(document, index, content, chunk_size, overlap));
        index += 1;

        if end >= len {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

fn make_chunk(
    document: &Document,
    index: i64,
    content: String,
    chunk_size: usize,
    overlap: usize,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document.id.clone(),
        chunk_index: index,
        content,
        hash,
        metadata: ChunkMetadata {
            subject: Some(document.subject_type.as_str().to_string()),
            title: document.title.clone(),
            chunk_size,
            chunk_overlap: overlap,
            source: document.source.clone(),
            merged_from: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectType;
    use std::collections::BTreeMap;

    fn doc(text: &str) -> Document {
        Document {
            id: "doc1".to_string(),
            subject_type: SubjectType::Resume,
            title: Some("Jordan Doe".to_string()),
            source: Some("upload".to_string()),
            raw_text: text.to_string(),
            normalized_text: text.to_string(),
            fields: BTreeMap::new(),
            created_at: 0,
        }
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_document(&doc("Hello, world!"), 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "Hello, world!");
    }

    #[test]
    fn empty_text_single_empty_chunk() {
        let chunks = chunk_document(&doc(""), 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "");
    }

    #[test]
    fn nine_hundred_chars_at_500_50_yields_two_chunks() {
        let text: String = (0..900).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_document(&doc(&text), 500, 50).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, text[0..500]);
        assert_eq!(chunks[1].content, text[450..900]);
    }

    #[test]
    fn chunk_count_matches_formula() {
        for (len, size, overlap) in [(2000, 500, 50), (1234, 400, 50), (801, 800, 80)] {
            let text: String = "x".repeat(len);
            let chunks = chunk_document(&doc(&text), size, overlap).unwrap();
            let expected = (len - overlap).div_ceil(size - overlap);
            assert_eq!(chunks.len(), expected, "len={} size={}", len, size);
        }
    }

    #[test]
    fn overlap_regions_reconstruct_original() {
        let text: String = (0..1337).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let overlap = 50;
        let chunks = chunk_document(&doc(&text), 300, overlap).unwrap();

        let mut rebuilt = chunks[0].content.clone();
        for chunk in &chunks[1..] {
            let tail: String = chunk.content.chars().skip(overlap).collect();
            rebuilt.push_str(&tail);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn zero_overlap_windows_are_disjoint() {
        let text = "abcdefghij";
        let chunks = chunk_document(&doc(text), 4, 0).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn multibyte_text_chunks_on_char_boundaries() {
        let text = "日本語のテキスト".repeat(20);
        let chunks = chunk_document(&doc(&text), 30, 5).unwrap();
        let total: usize = chunks[0].content.chars().count();
        assert_eq!(total, 30);
        for c in &chunks {
            assert!(c.content.chars().count() <= 30);
        }
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = chunk_document(&doc("text"), 0, 0).unwrap_err();
        assert!(matches!(err, SieveError::Configuration(_)));
    }

    #[test]
    fn rejects_overlap_not_less_than_chunk_size() {
        let err = chunk_document(&doc("text"), 100, 100).unwrap_err();
        assert!(matches!(err, SieveError::Configuration(_)));
        let err = chunk_document(&doc("text"), 100, 150).unwrap_err();
        assert!(matches!(err, SieveError::Configuration(_)));
    }

    #[test]
    fn indices_contiguous_and_metadata_carried() {
        let text = "z".repeat(2500);
        let chunks = chunk_document(&doc(&text), 500, 50).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.metadata.chunk_size, 500);
            assert_eq!(c.metadata.chunk_overlap, 50);
            assert_eq!(c.metadata.subject.as_deref(), Some("resume"));
            assert_eq!(c.metadata.title.as_deref(), Some("Jordan Doe"));
        }
    }

    #[test]
    fn chunk_hash_is_content_hash() {
        let c1 = chunk_document(&doc("same text"), 500, 50).unwrap();
        let c2 = chunk_document(&doc("same text"), 500, 50).unwrap();
        assert_eq!(c1[0].hash, c2[0].hash);
        assert_ne!(c1[0].id, c2[0].id);
    }
}
