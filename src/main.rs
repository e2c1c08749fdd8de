mod client;
mod config;
mod decode;
mod embed;
mod errors;
mod llm;
mod metadata;
mod rag;
mod search;
mod store;
mod telemetry;
mod vector_entry;
mod verify;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::process::ExitCode;

use crate::client::{EndeeClient, VectorService};
use crate::config::State;
use crate::embed::SentenceEmbedder;
use crate::llm::OpenAiClient;
use crate::metadata::MetadataStore;
use crate::rag::AnswerGenerator;
use crate::search::SearchEngine;
use crate::store::{store_texts, SAMPLE_SENTENCES};

#[derive(Parser)]
#[command(name = "endee-rag")]
#[command(version = "0.1")]
#[command(about = "Embed, store and search notes in Endee, then answer questions from them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configured index
    CreateIndex,
    /// Embed and insert the sample sentences
    Store {
        /// Also read one sentence per line from stdin
        #[arg(long)]
        stdin: bool,
    },
    /// Semantic search over stored sentences
    Search { query: Option<String> },
    /// Answer a question from retrieved context
    Chat { question: Option<String> },
    /// Check that everything is in place
    Verify,
    /// Print the resolved configuration
    Config,
}

fn create_index_command(state: &State) -> Result<bool> {
    let client = EndeeClient::from_state(state)?;
    println!(
        "Creating index '{}' at {} (dim={}, space_type={})",
        state.index_name,
        client.base_url(),
        state.dimensions,
        state.space_type
    );

    match client.create_index(&state.index_name, state.dimensions, state.space_type) {
        Ok(()) => {
            println!("✓ Index '{}' created successfully!", state.index_name);
            Ok(true)
        }
        Err(e) => {
            println!("✗ Failed to create index: {}", e);
            Ok(false)
        }
    }
}

fn store_command(state: &State, read_stdin: bool) -> Result<bool> {
    let mut texts: Vec<String> = SAMPLE_SENTENCES.iter().map(|s| s.to_string()).collect();
    if read_stdin {
        for line in io::stdin().lock().lines() {
            texts.push(line.context("Failed to read stdin")?);
        }
    }

    let client = EndeeClient::from_state(state)?;
    let embedder = SentenceEmbedder::load().context("Failed to load embedding model")?;
    let metadata = MetadataStore::new(&state.metadata_path);

    match store_texts(
        &embedder,
        &client,
        &metadata,
        &state.index_name,
        state.dimensions,
        &texts,
    ) {
        Ok(map) => {
            for (id, record) in &map {
                println!("Stored {}: {}", id, store::truncate(&record.text, 60));
            }
            Ok(true)
        }
        Err(e) => {
            println!("✗ Error storing vectors: {}", e);
            Ok(false)
        }
    }
}

fn search_command(state: &State, query: &str) -> Result<bool> {
    let client = EndeeClient::from_state(state)?;
    let embedder = SentenceEmbedder::load().context("Failed to load embedding model")?;
    let metadata = MetadataStore::new(&state.metadata_path);
    let engine = SearchEngine::new(
        &embedder,
        &client,
        &metadata,
        &state.index_name,
        state.dimensions,
    );

    let output = match engine.search(query, state.top_k) {
        Ok(results) => serde_json::json!({
            "success": true,
            "query": query,
            "results": results,
            "actual_results_count": results.len(),
            "requested_results_count": state.top_k,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "query": query,
            "error": e.to_string(),
        }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(output["success"] == true)
}

fn chat_command(state: &State, question: &str) -> Result<bool> {
    // Credential first: nothing is loaded or sent without it.
    let llm = OpenAiClient::from_env(state)?;
    let client = EndeeClient::from_state(state)?;
    let embedder = SentenceEmbedder::load().context("Failed to load embedding model")?;
    let metadata = MetadataStore::new(&state.metadata_path);
    let engine = SearchEngine::new(
        &embedder,
        &client,
        &metadata,
        &state.index_name,
        state.dimensions,
    );
    let generator = AnswerGenerator::new(&engine, &llm, state.llm_max_tokens);

    println!("Question: {}\n", question);
    match generator.answer(question) {
        Some(answer) => {
            println!("[Answer]\n{}", answer);
            Ok(true)
        }
        None => {
            println!("\nWarning: RAG chat failed. Make sure:");
            println!("  1. Index '{}' exists (run `endee-rag create-index`)", state.index_name);
            println!("  2. Vectors are stored (run `endee-rag store`)");
            println!("  3. {} is set and valid (model {})", crate::llm::API_KEY_VAR, llm.model());
            Ok(false)
        }
    }
}

fn verify_command(state: &State) -> Result<bool> {
    let client = EndeeClient::from_state(state)?;
    let metadata = MetadataStore::new(&state.metadata_path);
    Ok(verify::run(&metadata, &client))
}

fn config_command(state: &State) -> Result<bool> {
    state.print_config();
    Ok(true)
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    let state = State::new()?;
    telemetry::init(state.verbose);

    let ok = match args.command {
        Commands::CreateIndex => create_index_command(&state)?,
        Commands::Store { stdin } => store_command(&state, stdin)?,
        Commands::Search { query } => {
            search_command(&state, query.as_deref().unwrap_or("What is DNS used for?"))?
        }
        Commands::Chat { question } => {
            chat_command(&state, question.as_deref().unwrap_or("What is the purpose of DNS?"))?
        }
        Commands::Verify => verify_command(&state)?,
        Commands::Config => config_command(&state)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
