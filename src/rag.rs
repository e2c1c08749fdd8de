//! Retrieval-augmented answering.
//!
//! Retrieves a couple of snippets, pins the model to them and asks one
//! deterministic completion. Failures past construction never escape as
//! errors: they are logged and the answer is `None`.

use tracing::{error, info};

use crate::llm::{ChatCompletion, ChatMessage, ChatRequest};
use crate::search::SearchEngine;
use crate::store::truncate;
use crate::vector_entry::SearchResult;

pub const CONTEXT_TOP_K: usize = 2;
pub const NO_CONTEXT: &str = "(no context found)";
pub const REFUSAL: &str = "I don't have that information in the provided context.";

pub fn system_prompt() -> String {
    format!(
        "You are a helpful assistant. Answer the user's question using ONLY \
         the provided context. If the answer is not in the context, say: '{}'",
        REFUSAL
    )
}

/// Non-empty snippets joined by a blank line, or the no-context marker.
pub fn build_context(results: &[SearchResult]) -> String {
    let pieces: Vec<&str> = results
        .iter()
        .filter(|r| r.has_text())
        .map(|r| r.text.as_str())
        .collect();

    if pieces.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        pieces.join("\n\n")
    }
}

pub fn user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information:\n---\n{}\n---\n\nQuestion: {}\n\nAnswer based ONLY on the context above:",
        context, question
    )
}

pub fn build_request(context: &str, question: &str, max_tokens: u32) -> ChatRequest {
    ChatRequest {
        temperature: Some(0.0),
        max_tokens: Some(max_tokens),
        ..ChatRequest::new(vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(user_prompt(context, question)),
        ])
    }
}

pub struct AnswerGenerator<'a> {
    engine: &'a SearchEngine<'a>,
    llm: &'a dyn ChatCompletion,
    max_tokens: u32,
}

impl<'a> AnswerGenerator<'a> {
    /// `llm` already carries a credential, so construction is the fail-fast point.
    pub fn new(engine: &'a SearchEngine<'a>, llm: &'a dyn ChatCompletion, max_tokens: u32) -> Self {
        Self {
            engine,
            llm,
            max_tokens,
        }
    }

    pub fn answer(&self, question: &str) -> Option<String> {
        info!("Searching for relevant context");
        let results = match self.engine.search(question, CONTEXT_TOP_K) {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "Search failed");
                return None;
            }
        };

        info!("Found {} matching vectors", results.len());
        for (i, r) in results.iter().enumerate().filter(|(_, r)| r.has_text()) {
            info!("  [{}] {}", i + 1, truncate(&r.text, 60));
        }

        let context = build_context(&results);
        let request = build_request(&context, question, self.max_tokens);

        match self.llm.chat(&request) {
            Ok(answer) => Some(answer.trim().to_string()),
            Err(e) => {
                error!(error = %e, "Completion request failed");
                None
            }
        }
    }
}
