use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::RagError;

pub type Number = f32;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
pub const MAX_INDEX_NAME_LEN: usize = 48;

/// Distance metric of a remote index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    Cosine,
    L2,
    Ip,
}

impl SpaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceType::Cosine => "cosine",
            SpaceType::L2 => "l2",
            SpaceType::Ip => "ip",
        }
    }
}

impl FromStr for SpaceType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(SpaceType::Cosine),
            "l2" => Ok(SpaceType::L2),
            "ip" | "inner_product" => Ok(SpaceType::Ip),
            other => Err(RagError::Config(format!(
                "unknown space_type '{}' (expected cosine, l2 or ip)",
                other
            ))),
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Default)]
pub struct RagConfig {
    pub base_url: Option<String>,
    pub index_name: Option<String>,
    pub dimensions: Option<usize>,
    pub space_type: Option<String>,
    pub top_k: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub metadata_path: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_max_tokens: Option<u32>,
    pub llm_timeout_secs: Option<u64>,
    pub verbose: Option<bool>,
}

impl RagConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(RagConfig {
            base_url: optional(config, "base_url")?,
            index_name: optional(config, "index_name")?,
            dimensions: optional(config, "dimensions")?,
            space_type: optional(config, "space_type")?,
            top_k: optional(config, "top_k")?,
            timeout_secs: optional(config, "timeout_secs")?,
            metadata_path: optional(config, "metadata_path")?,
            llm_base_url: optional(config, "llm_base_url")?,
            llm_model: optional(config, "llm_model")?,
            llm_max_tokens: optional(config, "llm_max_tokens")?,
            llm_timeout_secs: optional(config, "llm_timeout_secs")?,
            verbose: optional(config, "verbose")?,
        })
    }
}

/// An absent key is `None`; a present key of the wrong type is an error.
fn optional<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ConfigError> {
    match config.get(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolved settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct State {
    pub base_url: String,
    pub index_name: String,
    pub dimensions: usize,
    pub space_type: SpaceType,
    pub top_k: usize,
    pub timeout: Duration,
    pub metadata_path: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout: Duration,
    pub verbose: bool,
}

impl State {
    /// Reads `endee_rag_config.*` (optional) then `ENDEE_RAG_*` variables.
    pub fn new() -> Result<Self, RagError> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name("endee_rag_config").required(false))
            .add_source(Environment::with_prefix("ENDEE_RAG"))
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let rag_config = RagConfig::try_from(&config).map_err(|e| RagError::Config(e.to_string()))?;
        Self::resolve(rag_config)
    }

    pub fn resolve(rag_config: RagConfig) -> Result<Self, RagError> {
        let base_url = rag_config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let index_name = rag_config
            .index_name
            .unwrap_or_else(|| "notes_index".to_string());
        validate_index_name(&index_name)?;

        let dimensions = rag_config.dimensions.unwrap_or(384);
        if dimensions == 0 {
            return Err(RagError::Config("dimensions must be greater than zero".into()));
        }

        let space_type = match rag_config.space_type {
            Some(s) => s.parse()?,
            None => SpaceType::Cosine,
        };

        let llm_base_url = rag_config
            .llm_base_url
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            index_name,
            dimensions,
            space_type,
            top_k: rag_config.top_k.unwrap_or(2),
            timeout: Duration::from_secs(rag_config.timeout_secs.unwrap_or(10)),
            metadata_path: rag_config
                .metadata_path
                .unwrap_or_else(|| "vector_metadata.json".to_string()),
            llm_base_url,
            llm_model: rag_config
                .llm_model
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            llm_max_tokens: rag_config.llm_max_tokens.unwrap_or(300),
            llm_timeout: Duration::from_secs(rag_config.llm_timeout_secs.unwrap_or(60)),
            verbose: rag_config.verbose.unwrap_or(false),
        })
    }

    pub fn print_config(&self) {
        println!("base_url={}", self.base_url);
        println!("index_name={}", self.index_name);
        println!("dimensions={}", self.dimensions);
        println!("space_type={}", self.space_type);
        println!("top_k={}", self.top_k);
        println!("timeout_secs={}", self.timeout.as_secs());
        println!("metadata_path={}", self.metadata_path);
        println!("llm_base_url={}", self.llm_base_url);
        println!("llm_model={}", self.llm_model);
        println!("llm_max_tokens={}", self.llm_max_tokens);
        println!("llm_timeout_secs={}", self.llm_timeout.as_secs());
        println!("verbose={}", self.verbose);
    }
}

/// Index names are alphanumeric plus underscores, at most 48 characters.
pub fn validate_index_name(name: &str) -> Result<(), RagError> {
    if name.is_empty() || name.len() > MAX_INDEX_NAME_LEN {
        return Err(RagError::Config(format!(
            "index_name must be 1..={} characters, got {}",
            MAX_INDEX_NAME_LEN,
            name.len()
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RagError::Config(format!(
            "index_name '{}' may only contain alphanumerics and underscores",
            name
        )));
    }
    Ok(())
}
