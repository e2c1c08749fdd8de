use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0} not set. Please set: export {0}=sk-...")]
    MissingCredential(&'static str),
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("embedding model error: {0}")]
    Embedding(String),
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("metadata store error: {0}")]
    Metadata(String),
}

impl RagError {
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        RagError::Transport(err.to_string())
    }

    pub fn metadata<E: std::fmt::Display>(err: E) -> Self {
        RagError::Metadata(err.to_string())
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::transport(err)
    }
}
