//! Connectivity diagnostics for `kb check`.
//!
//! Runs three independent probes — credential presence, embedding-provider
//! auth validity, and store reachability — and reports pass/fail per probe
//! plus a summary count. Every probe runs even when an earlier one fails.

use anyhow::Result;

use crate::embedding::Embedder;
use crate::store::VectorStore;

/// Outcome of a single probe.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub passed: bool,
    pub message: String,
}

impl ProbeResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Run all three probes and return their outcomes in order:
/// key presence, key validity, store reachability.
pub async fn run_probes(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    api_key_set: bool,
) -> Vec<ProbeResult> {
    let mut results = Vec::with_capacity(3);

    results.push(if api_key_set {
        ProbeResult::pass("OPENAI_API_KEY is set")
    } else {
        ProbeResult::fail("OPENAI_API_KEY is not set")
    });

    results.push(match embedder.verify().await {
        Ok(()) => ProbeResult::pass("OpenAI API key is valid"),
        Err(e) => ProbeResult::fail(format!("OpenAI API key is invalid: {:#}", e)),
    });

    results.push(match store.list_collections().await {
        Ok(_) => ProbeResult::pass("Qdrant is reachable"),
        Err(e) => ProbeResult::fail(format!("Qdrant is not reachable: {:#}", e)),
    });

    results
}

/// CLI entry point — runs the probes, prints one line per probe and a
/// summary, and exits non-zero when anything failed.
pub async fn run_check(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    api_key_set: bool,
) -> Result<()> {
    let probes = run_probes(embedder, store, api_key_set).await;

    for probe in &probes {
        let status = if probe.passed { "OK" } else { "FAIL" };
        println!("{}  {}", status, probe.message);
    }

    let failures = probes.iter().filter(|p| !p.passed).count();

    println!();
    if failures == 0 {
        println!("All checks passed.");
    } else {
        println!("{} check(s) failed.", failures);
        std::process::exit(1);
    }

    Ok(())
}
