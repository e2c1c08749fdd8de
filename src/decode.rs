//! Search response decoding.
//!
//! Endee answers index searches with MessagePack `[score, id, ...]` tuples,
//! while JSON-speaking deployments wrap match objects under `matches`,
//! `results` or `data`. Every shape we accept is a variant of
//! [`SearchResponse`]; anything else is reported as a decode error.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Number;
use crate::errors::RagError;
use crate::vector_entry::SearchMatch;

const MSGPACK_CONTENT_TYPES: [&str; 3] = [
    "application/msgpack",
    "application/x-msgpack",
    "application/octet-stream",
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Matches { matches: Vec<JsonMatch> },
    Results { results: Vec<JsonMatch> },
    Data { data: Vec<JsonMatch> },
    Packed(Vec<PackedMatch>),
    Listed(Vec<JsonMatch>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonMatch {
    id: Option<RawId>,
    score: Option<Number>,
    distance: Option<Number>,
    similarity: Option<Number>,
    metadata: Option<serde_json::Value>,
    payload: Option<serde_json::Value>,
}

impl JsonMatch {
    fn into_match(self) -> Option<SearchMatch> {
        let id = self.id?.into_string();
        Some(SearchMatch {
            id,
            score: self.score.or(self.distance).or(self.similarity),
            metadata: self.metadata.or(self.payload),
        })
    }
}

/// `[score, id, ...]`; elements after the id are skipped.
#[derive(Debug)]
pub struct PackedMatch {
    score: Number,
    id: RawId,
}

impl<'de> Deserialize<'de> for PackedMatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PackedVisitor;

        impl<'de> Visitor<'de> for PackedVisitor {
            type Value = PackedMatch;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a [score, id, ...] tuple")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<PackedMatch, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let score = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let id = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(PackedMatch { score, id })
            }
        }

        deserializer.deserialize_seq(PackedVisitor)
    }
}

impl SearchResponse {
    pub fn into_matches(self) -> Vec<SearchMatch> {
        match self {
            SearchResponse::Matches { matches: list }
            | SearchResponse::Results { results: list }
            | SearchResponse::Data { data: list }
            | SearchResponse::Listed(list) => {
                let total = list.len();
                let matches: Vec<SearchMatch> =
                    list.into_iter().filter_map(JsonMatch::into_match).collect();
                if matches.len() < total {
                    warn!(skipped = total - matches.len(), "Dropped matches without an id");
                }
                matches
            }
            SearchResponse::Packed(list) => list
                .into_iter()
                .map(|p| SearchMatch {
                    id: p.id.into_string(),
                    score: Some(p.score),
                    metadata: None,
                })
                .collect(),
        }
    }
}

pub fn is_msgpack(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    MSGPACK_CONTENT_TYPES.contains(&mime.as_str())
}

type Decoder = fn(&[u8]) -> Result<SearchResponse, String>;

fn from_msgpack(body: &[u8]) -> Result<SearchResponse, String> {
    rmp_serde::from_slice(body).map_err(|e| format!("msgpack: {}", e))
}

fn from_json(body: &[u8]) -> Result<SearchResponse, String> {
    serde_json::from_slice(body).map_err(|e| format!("json: {}", e))
}

/// Decodes using the declared content type first, then the other format.
pub fn parse_search_response(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<SearchResponse, RagError> {
    if body.is_empty() {
        return Ok(SearchResponse::Packed(Vec::new()));
    }

    let msgpack_first = content_type.map(is_msgpack).unwrap_or(false);
    let (first, second): (Decoder, Decoder) = if msgpack_first {
        (from_msgpack, from_json)
    } else {
        (from_json, from_msgpack)
    };

    first(body).or_else(|first_err| {
        debug!(error = %first_err, "Declared format failed, probing the other one");
        second(body).map_err(|second_err| {
            RagError::Decode(format!("{}; {}", first_err, second_err))
        })
    })
}

/// An unrecognised body is logged and treated as no matches.
pub fn decode_search_response(content_type: Option<&str>, body: &[u8]) -> Vec<SearchMatch> {
    match parse_search_response(content_type, body) {
        Ok(response) => response.into_matches(),
        Err(e) => {
            warn!(error = %e, "Unrecognised search response; treating as empty");
            Vec::new()
        }
    }
}
