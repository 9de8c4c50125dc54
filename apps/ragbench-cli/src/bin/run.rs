use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragbench_core::config::{resolve_with_base, Config, ExperimentConfig};
use ragbench_core::traits::Generator;
use ragbench_embed::get_default_embedder;
use ragbench_pipeline::experiment::{is_complete, load_documents, load_queries, output_path, run_experiment, write_run};
use ragbench_pipeline::{Backends, OpenAiChatGenerator, RagPipeline};
use ragbench_vector::cache::EmbeddingCache;
use ragbench_vector::DocumentEmbedder;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut config_path = None; let mut force = false;
    for arg in &args { match arg.as_str() {
        "--force" | "-f" => force = true,
        _ if !arg.starts_with('-') => config_path = Some(PathBuf::from(arg)),
        other => { eprintln!("Unknown flag: {}", other); eprintln!("Usage: ragbench-run [config.toml] [--force]"); std::process::exit(1); }
    } }

    let config = match &config_path { Some(p) => Config::from_file(p)?, None => Config::load()? };
    let cfg = config.experiment()?;
    let base = config_path.as_deref().and_then(Path::parent).map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let run_dir = resolve_with_base(&base, &cfg.output_dir);

    if is_complete(&run_dir) && !force {
        println!("{} exists. SKIP.", output_path(&run_dir).display());
        return Ok(());
    }
    println!("============================== Run: {} ==============================", run_dir.display());

    let corpus = load_documents(&resolve_with_base(&base, &cfg.corpus_path))?;
    let queries = load_queries(&resolve_with_base(&base, &cfg.queries_path), cfg.skip_without_sources)?;
    let faqs = match (&cfg.faq_path, cfg.uses("faq")) {
        (Some(path), true) => load_documents(&resolve_with_base(&base, path))?,
        _ => Vec::new(),
    };
    println!("documents = {}\nqueries = {}\nfaqs = {}", corpus.len(), queries.len(), faqs.len());

    let cache_path: Option<String> = config.get("embedding_cache").ok();
    let backends = backends(&cfg, cache_path.map(|p| resolve_with_base(&base, p)))?;
    let pipeline = RagPipeline::from_config(&cfg, corpus, faqs, &backends)?;

    let records = run_experiment(&pipeline, &queries, true);
    if let Some(embedder) = &backends.embedder { embedder.flush()?; }
    write_run(&run_dir, &records, &cfg, pipeline.graph())?;
    info!(records = records.len(), dir = %run_dir.display(), "run complete");
    println!("✅ Wrote {} records to {}", records.len(), output_path(&run_dir).display());
    Ok(())
}

/// Load only the models this configuration calls.
fn backends(cfg: &ExperimentConfig, cache_path: Option<PathBuf>) -> anyhow::Result<Backends> {
    let needs_embedder = ["dense", "hyde", "faq"].iter().any(|r| cfg.uses(r)) || (cfg.use_reranker && cfg.reranker == "similarity");
    let embedder = if needs_embedder {
        let cache = match cache_path { Some(path) => EmbeddingCache::open(path)?, None => EmbeddingCache::in_memory() };
        Some(Arc::new(DocumentEmbedder::new(Arc::from(get_default_embedder()?)).with_cache(cache).with_progress(true)))
    } else { None };

    let generator: Option<Arc<dyn Generator>> = if cfg.use_generator { Some(Arc::new(OpenAiChatGenerator::from_config(cfg)?)) } else { None };
    let hyde_generator: Option<Arc<dyn Generator>> = if cfg.uses("hyde") { Some(Arc::new(OpenAiChatGenerator::hyde_from_config(cfg)?)) } else { None };
    Ok(Backends { embedder, generator, hyde_generator })
}
