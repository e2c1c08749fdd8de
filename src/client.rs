use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{Number, SpaceType, State};
use crate::decode::decode_search_response;
use crate::errors::RagError;
use crate::vector_entry::{SearchMatch, VectorRecord};

const BODY_PREVIEW_CHARS: usize = 500;

/// The remote vector index operations this tool relies on.
pub trait VectorService {
    fn create_index(&self, name: &str, dim: usize, space_type: SpaceType) -> Result<(), RagError>;

    fn insert(&self, index: &str, records: &[VectorRecord]) -> Result<(), RagError>;

    /// Matches in the order the service ranked them.
    fn search(&self, index: &str, vector: &[Number], k: usize)
        -> Result<Vec<SearchMatch>, RagError>;
}

/// Blocking client for an Endee server. No retries.
pub struct EndeeClient {
    base_url: String,
    client: Client,
}

impl EndeeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RagError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_state(state: &State) -> Result<Self, RagError> {
        Self::new(&state.base_url, state.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Any HTTP answer from the base URL counts as reachable.
    pub fn ping(&self) -> Result<u16, RagError> {
        let resp = self.client.get(&self.base_url).send()?;
        Ok(resp.status().as_u16())
    }

    fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, RagError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        let resp = self.client.post(&url).json(body).send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(RagError::Status {
                status: status.as_u16(),
                body: preview(&text),
            });
        }
        Ok(resp)
    }
}

impl VectorService for EndeeClient {
    #[tracing::instrument(name = "Creating index", skip(self))]
    fn create_index(&self, name: &str, dim: usize, space_type: SpaceType) -> Result<(), RagError> {
        let payload = json!({
            "index_name": name,
            "dim": dim,
            "space_type": space_type.as_str(),
        });
        let resp = self.post_json("/api/v1/index/create", &payload)?;
        let status = resp.status().as_u16();
        let text = resp.text().unwrap_or_default();
        info!(status, response = %preview(&text), "Index created");
        Ok(())
    }

    #[tracing::instrument(
        name = "Inserting vectors",
        skip(self, records),
        fields(count = records.len())
    )]
    fn insert(&self, index: &str, records: &[VectorRecord]) -> Result<(), RagError> {
        let path = format!("/api/v1/index/{}/vector/insert", index);
        let resp = self.post_json(&path, records)?;
        let status = resp.status().as_u16();
        let text = resp.text().unwrap_or_default();
        info!(status, response = %preview(&text), "Vectors inserted");
        Ok(())
    }

    #[tracing::instrument(name = "Searching index", skip(self, vector))]
    fn search(
        &self,
        index: &str,
        vector: &[Number],
        k: usize,
    ) -> Result<Vec<SearchMatch>, RagError> {
        let path = format!("/api/v1/index/{}/search", index);
        let payload = json!({
            "vector": vector,
            "k": k,
            "include_vectors": false,
        });
        let resp = self.post_json(&path, &payload)?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes()?;
        debug!(bytes = body.len(), content_type = ?content_type, "Search response received");

        Ok(decode_search_response(content_type.as_deref(), &body))
    }
}

pub fn preview(text: &str) -> String {
    text.chars().take(BODY_PREVIEW_CHARS).collect()
}
