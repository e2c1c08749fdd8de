use std::collections::HashSet;

use tracing::{info, warn};

use crate::client::VectorService;
use crate::embed::{check_dimensions, check_embedder, Embedder};
use crate::errors::RagError;
use crate::metadata::{MetadataMap, MetadataStore};
use crate::vector_entry::{MetadataRecord, VectorRecord};

pub const SAMPLE_SENTENCES: [&str; 3] = [
    "A subnet divides a network into smaller, more manageable pieces.",
    "TCP provides reliable, ordered, and error-checked delivery of a stream of bytes.",
    "DNS translates human-friendly domain names to IP addresses for routing.",
];

/// `vec_001`, `vec_002`, ... for zero-based positions.
pub fn vector_id(position: usize) -> String {
    format!("vec_{:03}", position + 1)
}

/// Embeds `texts`, inserts them into `index` and rewrites the metadata file.
///
/// Duplicate texts are skipped; ids are assigned in order of first appearance.
/// Every vector must be `dimensions` wide, the width `index` was created with.
pub fn store_texts(
    embedder: &dyn Embedder,
    service: &dyn VectorService,
    metadata: &MetadataStore,
    index: &str,
    dimensions: usize,
    texts: &[String],
) -> Result<MetadataMap, RagError> {
    check_embedder(embedder, dimensions)?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(texts.len());
    let mut map = MetadataMap::new();

    for text in texts {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !seen.insert(text.to_string()) {
            warn!(text, "Duplicate text found. Skipping.");
            continue;
        }

        let position = records.len();
        let id = vector_id(position);
        let vector = embedder.embed(text)?;
        check_dimensions(dimensions, &vector)?;
        info!(%id, "Embedded: {}", truncate(text, 60));

        records.push(VectorRecord {
            id: id.clone(),
            vector,
        });
        map.insert(
            id,
            MetadataRecord {
                text: text.to_string(),
                index: position,
            },
        );
    }

    if records.is_empty() {
        warn!("Nothing to store");
        return Ok(map);
    }

    service.insert(index, &records)?;
    metadata.save(&map)?;
    info!(
        count = records.len(),
        path = %metadata.path().display(),
        "Stored vectors and metadata"
    );
    Ok(map)
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ByteEmbedder, FakeService};
    use tempfile::tempdir;

    const DIM: usize = ByteEmbedder::DIMENSIONS;

    fn samples() -> Vec<String> {
        SAMPLE_SENTENCES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ids_are_zero_padded() {
        assert_eq!(vector_id(0), "vec_001");
        assert_eq!(vector_id(41), "vec_042");
    }

    #[test]
    fn stores_samples_with_matching_ids() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("vector_metadata.json"));
        let service = FakeService::default();

        let map = store_texts(
            &ByteEmbedder,
            &service,
            &metadata,
            "notes_index",
            DIM,
            &samples(),
        )
        .unwrap();

        let inserted = service.inserted.borrow();
        assert_eq!(inserted.len(), 1);
        let (index, records) = &inserted[0];
        assert_eq!(index, "notes_index");
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["vec_001", "vec_002", "vec_003"]);
        assert!(records.iter().all(|r| r.vector.len() == 8));

        let loaded = metadata.load().unwrap();
        assert_eq!(loaded, map);
        assert!(loaded["vec_003"].text.starts_with("DNS"));
        assert_eq!(loaded["vec_003"].index, 2);
    }

    #[test]
    fn duplicates_and_blanks_are_skipped() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("m.json"));
        let service = FakeService::default();
        let texts: Vec<String> = ["alpha", " ", "alpha", "beta"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let map = store_texts(&ByteEmbedder, &service, &metadata, "idx", DIM, &texts).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["vec_002"].text, "beta");
    }

    #[test]
    fn nothing_to_store_makes_no_request() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("m.json"));
        let service = FakeService::default();

        let map = store_texts(&ByteEmbedder, &service, &metadata, "idx", DIM, &[]).unwrap();
        assert!(map.is_empty());
        assert!(service.inserted.borrow().is_empty());
        assert!(!metadata.exists());
    }

    #[test]
    fn index_width_mismatch_stores_nothing() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("m.json"));
        let service = FakeService::default();

        let result = store_texts(&ByteEmbedder, &service, &metadata, "idx", 384, &samples());
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch {
                expected: 384,
                actual: 8
            })
        ));
        assert!(service.inserted.borrow().is_empty());
        assert!(!metadata.exists());
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
