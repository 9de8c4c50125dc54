use std::env;
use std::path::PathBuf;

use ragbench_core::config::{expand_path, Config};
use ragbench_hybrid::DocumentStore;
use ragbench_pipeline::experiment::load_documents;
use ragbench_vector::Similarity;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [corpus.json] [top_k]", args[0]);
        eprintln!("Example: {} 'opening hours library' data/corpus.json 5", args[0]);
        std::process::exit(1);
    }
    let query_text = &args[1];
    let corpus_path = match args.get(2) {
        Some(p) => expand_path(p),
        None => Config::load()?.experiment().map(|cfg| expand_path(cfg.corpus_path)).unwrap_or_else(|_| PathBuf::from("data/corpus.json")),
    };
    let top_k = args.get(3).and_then(|k| k.parse::<usize>().ok()).unwrap_or(10);

    println!("🔍 ragbench-search\n==================");
    println!("Query: {}", query_text); println!("Corpus: {}", corpus_path.display());
    let mut store = DocumentStore::new(Similarity::Cosine)?;
    store.write(load_documents(&corpus_path)?)?;
    let results = store.lexical_search(query_text, top_k, None, true)?;
    println!("\n🔍 Found {} results for: \"{}\"", results.len(), query_text);
    for (i, doc) in results.iter().enumerate() {
        let snippet: String = doc.content.chars().take(160).collect();
        println!("\n  {}. score={:.4}  id={}  url={}", i + 1, doc.score.unwrap_or_default(), doc.id, doc.url().unwrap_or("-"));
        println!("     📝 {}", snippet.replace('\n', " "));
    }
    Ok(())
}
