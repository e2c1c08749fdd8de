use crate::client::VectorService;
use crate::embed::{check_dimensions, check_embedder, Embedder};
use crate::errors::RagError;
use crate::metadata::{MetadataMap, MetadataStore};
use crate::vector_entry::{SearchMatch, SearchResult, MISSING_TEXT};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct SearchTimings {
    pub embed_duration: Duration,
    pub service_duration: Duration,
    pub join_duration: Duration,
    pub total_duration: Duration,
}

/// Query embedding, remote search and the local text join.
pub struct SearchEngine<'a> {
    embedder: &'a dyn Embedder,
    service: &'a dyn VectorService,
    metadata: &'a MetadataStore,
    index_name: String,
    dimensions: usize,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        service: &'a dyn VectorService,
        metadata: &'a MetadataStore,
        index_name: &str,
        dimensions: usize,
    ) -> Self {
        Self {
            embedder,
            service,
            metadata,
            index_name: index_name.to_string(),
            dimensions,
        }
    }

    /// Results keep the service's ranking; `top_k` is passed through as is.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, RagError> {
        self.search_timed(query, top_k).map(|(results, _)| results)
    }

    pub fn search_timed(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<(Vec<SearchResult>, SearchTimings), RagError> {
        check_embedder(self.embedder, self.dimensions)?;
        let start = Instant::now();

        let query_vector = self.embedder.embed(query)?;
        check_dimensions(self.dimensions, &query_vector)?;
        let embed_duration = start.elapsed();

        let service_start = Instant::now();
        let matches = self.service.search(&self.index_name, &query_vector, top_k)?;
        let service_duration = service_start.elapsed();
        debug!(count = matches.len(), "Service returned matches");

        let join_start = Instant::now();
        let metadata = self.metadata.load()?;
        let results = join_matches(matches, &metadata);
        let join_duration = join_start.elapsed();

        let timings = SearchTimings {
            embed_duration,
            service_duration,
            join_duration,
            total_duration: start.elapsed(),
        };
        debug!(?timings, "Search completed. Found {} results", results.len());

        Ok((results, timings))
    }
}

/// Local text first, then text the service sent inline, else the placeholder.
pub fn join_matches(matches: Vec<SearchMatch>, metadata: &MetadataMap) -> Vec<SearchResult> {
    matches
        .into_iter()
        .map(|m| {
            let text = match metadata.get(&m.id) {
                Some(record) => record.text.clone(),
                None => match m.inline_text() {
                    Some(text) => text.to_string(),
                    None => {
                        warn!(id = %m.id, "No metadata for returned id");
                        MISSING_TEXT.to_string()
                    }
                },
            };
            SearchResult {
                id: m.id,
                score: m.score,
                text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ByteEmbedder, FakeService};
    use crate::vector_entry::MetadataRecord;
    use serde_json::json;
    use tempfile::tempdir;

    const DIM: usize = ByteEmbedder::DIMENSIONS;

    fn hit(id: &str, score: f32) -> SearchMatch {
        SearchMatch {
            id: id.into(),
            score: Some(score),
            metadata: None,
        }
    }

    #[test]
    fn missing_metadata_falls_back_to_placeholder() {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "x".into(),
            MetadataRecord {
                text: "stored x".into(),
                index: 0,
            },
        );

        let results = join_matches(vec![hit("x", 0.9), hit("y", 0.4)], &metadata);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "stored x");
        assert_eq!(results[1].id, "y");
        assert_eq!(results[1].text, MISSING_TEXT);
    }

    #[test]
    fn inline_text_used_when_not_stored_locally() {
        let m = SearchMatch {
            id: "z".into(),
            score: None,
            metadata: Some(json!({"original_text": "inline"})),
        };
        let results = join_matches(vec![m], &MetadataMap::new());
        assert_eq!(results[0].text, "inline");
    }

    #[test]
    fn search_keeps_service_order_and_passes_top_k() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("vector_metadata.json"));
        let mut map = MetadataMap::new();
        map.insert(
            "vec_001".into(),
            MetadataRecord {
                text: "subnet".into(),
                index: 0,
            },
        );
        map.insert(
            "vec_003".into(),
            MetadataRecord {
                text: "DNS".into(),
                index: 2,
            },
        );
        metadata.save(&map).unwrap();

        // Lower score first on purpose: the engine must not re-sort.
        let service = FakeService {
            matches: vec![hit("vec_001", 0.2), hit("vec_003", 0.8)],
            ..Default::default()
        };
        let engine = SearchEngine::new(&ByteEmbedder, &service, &metadata, "notes_index", DIM);

        let (results, timings) = engine.search_timed("What does DNS do?", 500).unwrap();
        assert_eq!(results[0].text, "subnet");
        assert_eq!(results[1].text, "DNS");
        assert!(timings.total_duration >= timings.service_duration);
        assert_eq!(
            service.searches.borrow().as_slice(),
            &[("notes_index".to_string(), 500)]
        );
    }

    #[test]
    fn search_without_metadata_file_still_succeeds() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("absent.json"));
        let service = FakeService {
            matches: vec![hit("vec_001", 0.5)],
            ..Default::default()
        };
        let engine = SearchEngine::new(&ByteEmbedder, &service, &metadata, "notes_index", DIM);

        let results = engine.search("anything", 1).unwrap();
        assert_eq!(results[0].text, MISSING_TEXT);
    }

    #[test]
    fn service_failure_is_returned() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("m.json"));
        let service = FakeService {
            fail_search: true,
            ..Default::default()
        };
        let engine = SearchEngine::new(&ByteEmbedder, &service, &metadata, "notes_index", DIM);
        assert!(matches!(engine.search("q", 2), Err(RagError::Transport(_))));
    }

    #[test]
    fn empty_query_fails_before_remote_call() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("m.json"));
        let service = FakeService::default();
        let engine = SearchEngine::new(&ByteEmbedder, &service, &metadata, "notes_index", DIM);

        assert!(matches!(engine.search("  ", 2), Err(RagError::EmptyInput)));
        assert!(service.searches.borrow().is_empty());
    }

    #[test]
    fn index_width_mismatch_fails_before_remote_call() {
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("m.json"));
        let service = FakeService::default();
        let engine = SearchEngine::new(&ByteEmbedder, &service, &metadata, "notes_index", 384);

        assert!(matches!(
            engine.search("What does DNS do?", 2),
            Err(RagError::DimensionMismatch {
                expected: 384,
                actual: 8
            })
        ));
        assert!(service.searches.borrow().is_empty());
    }

    // Needs a local Endee server on :8080 and downloads the embedding model.
    #[test]
    #[ignore]
    fn test_live_end_to_end_dns_query() {
        use crate::client::{EndeeClient, VectorService};
        use crate::config::{SpaceType, State};
        use crate::embed::SentenceEmbedder;
        use crate::store::{store_texts, SAMPLE_SENTENCES};

        let state = State::new().unwrap();
        let dir = tempdir().unwrap();
        let metadata = MetadataStore::new(dir.path().join("vector_metadata.json"));
        let client = EndeeClient::from_state(&state).unwrap();
        let embedder = SentenceEmbedder::load().unwrap();

        let index = "e2e_notes_index";
        if let Err(e) = client.create_index(index, 384, SpaceType::Cosine) {
            println!("create_index: {}", e);
        }
        let texts: Vec<String> = SAMPLE_SENTENCES.iter().map(|s| s.to_string()).collect();
        store_texts(&embedder, &client, &metadata, index, 384, &texts).unwrap();

        let engine = SearchEngine::new(&embedder, &client, &metadata, index, 384);
        let results = engine.search("What does DNS do?", 2).unwrap();
        assert!(results.len() <= 2);
        assert!(results[0].text.contains("DNS"));
    }
}
