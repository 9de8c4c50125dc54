//! Evaluation runs: load data, answer every query, persist the records.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use ragbench_core::config::ExperimentConfig;
use ragbench_core::error::{Error, Result};
use ragbench_core::types::{ContextRecord, Document, Query, QueryRecord};

use crate::builder::RagPipeline;
use crate::graph::Pipeline;

pub const OUTPUT_FILE: &str = "output.json";
pub const CONFIG_FILE: &str = "config.json";
pub const PIPELINE_FILE: &str = "pipeline.json";

/// A JSON array, or one object per line for `.jsonl` files.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(Error::NotFound(format!("data file {}", path.display())));
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "jsonl") {
        let mut records = Vec::new();
        for (i, line) in raw.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line).with_context(|| format!("{}:{}", path.display(), i + 1))?);
        }
        return Ok(records);
    }
    Ok(serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?)
}

pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let docs: Vec<Document> = load_records(path)?;
    info!(path = %path.display(), count = docs.len(), "documents loaded");
    Ok(docs)
}

/// Queries without ground-truth sources are dropped when
/// `skip_without_sources` is set.
pub fn load_queries(path: &Path, skip_without_sources: bool) -> Result<Vec<Query>> {
    let mut queries: Vec<Query> = load_records(path)?;
    let total = queries.len();
    if skip_without_sources {
        queries.retain(|q| !q.sources.is_empty());
    }
    info!(path = %path.display(), count = queries.len(), skipped = total - queries.len(), "queries loaded");
    Ok(queries)
}

/// Answer every query in order, after one untimed warm-up query.
pub fn run_experiment(pipeline: &RagPipeline, queries: &[Query], show_progress: bool) -> Vec<QueryRecord> {
    let Some(first) = queries.first() else {
        warn!("no queries to run");
        return Vec::new();
    };
    pipeline.run_query(first);

    let pb = if show_progress { ProgressBar::new(queries.len() as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} queries ({eta})") {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut records = Vec::with_capacity(queries.len());
    for query in queries {
        let start = Instant::now();
        let outcome = pipeline.run_query(query);
        let duration_seconds = start.elapsed().as_secs_f64();
        records.push(QueryRecord {
            id: query.id.clone(),
            question: query.question.clone(),
            ground_truth_sources: query.sources.clone(),
            generated_answer: outcome.generated_answer,
            contexts: outcome.documents.iter().map(ContextRecord::from).collect(),
            duration_seconds,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(queries = records.len(), "experiment finished");
    records
}

pub fn output_path(run_dir: &Path) -> PathBuf { run_dir.join(OUTPUT_FILE) }

/// Whether `run_dir` already holds finished results.
pub fn is_complete(run_dir: &Path) -> bool { output_path(run_dir).exists() }

/// Write `output.json`, `config.json` and `pipeline.json` into `run_dir`,
/// creating it.
pub fn write_run(run_dir: &Path, records: &[QueryRecord], config: &ExperimentConfig, pipeline: &Pipeline) -> Result<()> {
    fs::create_dir_all(run_dir).with_context(|| format!("creating {}", run_dir.display()))?;
    write_json(&output_path(run_dir), records, false)?;
    write_json(&run_dir.join(CONFIG_FILE), config, true)?;
    write_json(&run_dir.join(PIPELINE_FILE), &pipeline.describe(), true)?;
    info!(dir = %run_dir.display(), records = records.len(), "run written");
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let body = (if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) })
        .with_context(|| format!("serializing {}", path.display()))?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
