//! Test doubles: a one-shot HTTP responder plus in-memory embedder and
//! vector service fakes.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use crate::client::VectorService;
use crate::config::{Number, SpaceType};
use crate::embed::Embedder;
use crate::errors::RagError;
use crate::vector_entry::{SearchMatch, VectorRecord};

pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.headers
            .iter()
            .find(|h| h.to_ascii_lowercase().starts_with(&prefix))
            .map(|h| h[prefix.len()..].trim().to_string())
    }
}

/// Serves exactly one response on a random local port.
/// Returns the base URL and a handle yielding the request that was received.
pub fn serve_once(
    status: u16,
    content_type: &str,
    body: Vec<u8>,
) -> (String, JoinHandle<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let content_type = content_type.to_string();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept test connection");
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut headers = Vec::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
            headers.push(line);
        }

        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let mut stream = stream;
        let head = format!(
            "HTTP/1.1 {} Test\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(&body).unwrap();
        stream.flush().unwrap();

        RecordedRequest {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: request_body,
        }
    });

    (base_url, handle)
}

/// A base URL nothing is listening on.
pub fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Deterministic bag-of-bytes embedding.
pub struct ByteEmbedder;

impl ByteEmbedder {
    pub const DIMENSIONS: usize = 8;
}

impl Embedder for ByteEmbedder {
    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }
        let mut v = vec![0.0; Self::DIMENSIONS];
        for (i, b) in text.bytes().enumerate() {
            v[i % Self::DIMENSIONS] += b as Number / 255.0;
        }
        Ok(v)
    }
}

/// Records inserts and answers searches with canned matches.
#[derive(Default)]
pub struct FakeService {
    pub inserted: RefCell<Vec<(String, Vec<VectorRecord>)>>,
    pub searches: RefCell<Vec<(String, usize)>>,
    pub matches: Vec<SearchMatch>,
    pub fail_search: bool,
}

impl VectorService for FakeService {
    fn create_index(&self, _: &str, _: usize, _: SpaceType) -> Result<(), RagError> {
        Ok(())
    }

    fn insert(&self, index: &str, records: &[VectorRecord]) -> Result<(), RagError> {
        self.inserted
            .borrow_mut()
            .push((index.to_string(), records.to_vec()));
        Ok(())
    }

    fn search(
        &self,
        index: &str,
        _vector: &[Number],
        k: usize,
    ) -> Result<Vec<SearchMatch>, RagError> {
        self.searches.borrow_mut().push((index.to_string(), k));
        if self.fail_search {
            return Err(RagError::Transport("connection refused".into()));
        }
        Ok(self.matches.clone())
    }
}
