use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::State;
use crate::errors::RagError;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A chat-completion backend.
pub trait ChatCompletion {
    fn chat(&self, request: &ChatRequest) -> Result<String, RagError>;
}

/// Reads the credential; a blank value counts as missing.
pub fn api_key_from_env() -> Result<SecretString, RagError> {
    api_key_from(std::env::var(API_KEY_VAR).ok())
}

pub fn api_key_from(value: Option<String>) -> Result<SecretString, RagError> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(SecretString::new(key)),
        _ => Err(RagError::MissingCredential(API_KEY_VAR)),
    }
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: SecretString,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
        })
    }

    /// Fails with `MissingCredential` when the key is absent; no request is made.
    pub fn from_env(state: &State) -> Result<Self, RagError> {
        let api_key = api_key_from_env()?;
        Self::new(&state.llm_base_url, &state.llm_model, api_key, state.llm_timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatCompletion for OpenAiClient {
    fn chat(&self, request: &ChatRequest) -> Result<String, RagError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }

        debug!(%url, model = %self.model, "Requesting chat completion");
        let res = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().unwrap_or_default();
            return Err(RagError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = res.json().map_err(|e| RagError::Decode(e.to_string()))?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| RagError::Decode("completion has no message content".into()))
    }
}
