use crate::client::EndeeClient;
use crate::errors::RagError;
use crate::llm::API_KEY_VAR;
use crate::metadata::MetadataStore;
use crate::store::{truncate, vector_id, SAMPLE_SENTENCES};

/// Outcome of one readiness check plus the lines to show for it.
#[derive(Debug)]
pub struct Check {
    pub title: &'static str,
    pub passed: bool,
    pub lines: Vec<String>,
}

impl Check {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            passed: true,
            lines: Vec::new(),
        }
    }

    fn ok(&mut self, line: impl Into<String>) {
        self.lines.push(format!("  ✓ {}", line.into()));
    }

    fn fail(&mut self, line: impl Into<String>) {
        self.passed = false;
        self.lines.push(format!("  ✗ {}", line.into()));
    }

    fn note(&mut self, line: impl Into<String>) {
        self.lines.push(format!("  {}", line.into()));
    }
}

pub fn check_files(metadata: &MetadataStore) -> Check {
    let mut check = Check::new("Checking files");
    let path = metadata.path().display().to_string();
    if metadata.exists() {
        check.ok(path);
    } else {
        check.fail(path);
        check.note("Missing files! Run `endee-rag store` first.");
    }
    check
}

pub fn check_metadata(metadata: &MetadataStore) -> Check {
    let mut check = Check::new("Checking vector metadata");
    if !metadata.exists() {
        check.fail(format!("{} not found!", metadata.path().display()));
        check.note("Run: endee-rag store");
        return check;
    }

    let map = match metadata.load() {
        Ok(map) => map,
        Err(e) => {
            check.fail(e.to_string());
            return check;
        }
    };

    check.note(format!("Found {} vectors:", map.len()));
    for (id, record) in &map {
        check.note(format!("  - {}: {}", id, truncate(&record.text, 50)));
    }

    let missing: Vec<String> = (0..SAMPLE_SENTENCES.len())
        .map(vector_id)
        .filter(|id| !map.contains_key(id))
        .collect();
    if missing.is_empty() {
        check.ok(format!("All {} sample vectors found!", SAMPLE_SENTENCES.len()));
    } else {
        check.fail(format!("Missing expected vectors: {}", missing.join(", ")));
    }
    check
}

/// The compiled binary has no imports to check, so the remote service stands in.
pub fn check_services<F>(base_url: &str, ping: F) -> Check
where
    F: FnOnce() -> Result<u16, RagError>,
{
    let mut check = Check::new("Checking vector service");
    match ping() {
        Ok(status) => check.ok(format!("{} reachable (status {})", base_url, status)),
        Err(e) => {
            check.fail(format!("{} unreachable: {}", base_url, e));
            check.note("Start the Endee server or set ENDEE_RAG_BASE_URL");
        }
    }
    check
}

/// Informational only; never fails.
pub fn check_env(api_key: Option<&str>) -> Check {
    let mut check = Check::new("Checking environment");
    match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => check.ok(format!("{} is set ({})", API_KEY_VAR, mask_key(key))),
        None => {
            check.note(format!("Note: {} not set", API_KEY_VAR));
            check.note("     RAG chat features will not work");
            check.note(format!("     Set with: export {}=sk-...", API_KEY_VAR));
        }
    }
    check
}

pub fn mask_key(key: &str) -> String {
    if key.chars().count() > 10 {
        let head: String = key.chars().take(10).collect();
        format!("{}...", head)
    } else {
        "...".to_string()
    }
}

/// Runs every check, prints the report and returns whether all passed.
pub fn run(metadata: &MetadataStore, client: &EndeeClient) -> bool {
    let api_key = std::env::var(API_KEY_VAR).ok();
    let checks = vec![
        check_files(metadata),
        check_metadata(metadata),
        check_services(client.base_url(), || client.ping()),
        check_env(api_key.as_deref()),
    ];
    print_report(&checks)
}

pub fn print_report(checks: &[Check]) -> bool {
    let rule = "=".repeat(60);
    println!("{}", rule);
    println!("VERIFYING RAG SYSTEM");
    println!("{}", rule);
    println!();

    for (i, check) in checks.iter().enumerate() {
        println!("[{}] {}...", i + 1, check.title);
        for line in &check.lines {
            println!("{}", line);
        }
        println!();
    }

    let all_passed = checks.iter().all(|c| c.passed);
    println!("{}", rule);
    if all_passed {
        println!("SUCCESS: RAG system is ready!");
        println!();
        println!("Next steps:");
        println!("  1. Test search:    endee-rag search");
        println!("  2. Test RAG chat:  endee-rag chat  (needs OpenAI key)");
    } else {
        println!("ISSUES DETECTED: Please fix errors above");
        println!();
        println!("Common solutions:");
        println!("  - Run: endee-rag create-index");
        println!("  - Run: endee-rag store");
        println!("  - Set: export {}=sk-...", API_KEY_VAR);
    }
    println!("{}", rule);
    all_passed
}
