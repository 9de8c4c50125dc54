//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `ragbench.toml` + `ragbench.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const KNOWN_RETRIEVERS: &[&str] = &["bm25", "oracle", "dense", "hyde", "faq"];

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about the \
documents you are given. Answer only from the documents and cite them with their reference numbers.";

pub const DEFAULT_USER_TEMPLATE: &str = "Documents:\n\
{% for doc in documents %}\
{{ loop.index }}. {{ doc.meta['og:title'] }}\n{{ doc.content | replace('\\n', '\\\\n') }}\n\n\
{% endfor %}\
Question: {{ query }}\nAnswer:";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("ragbench.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("ragbench.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("ragbench.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("ragbench.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_"));

        Ok(Self { figment })
    }

    /// Load one explicit TOML file, still overridable through `APP_*`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!("config file {}", path.display())));
        }
        let figment = Figment::new().merge(Toml::file(path)).merge(Env::prefixed("APP_"));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{}': {}", key, e)))
    }

    /// Typed experiment settings; absent keys take their defaults.
    pub fn experiment(&self) -> Result<ExperimentConfig> {
        let cfg: ExperimentConfig = self
            .figment
            .extract()
            .map_err(|e| Error::config(format!("Failed to read experiment config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub corpus_path: String,
    pub faq_path: Option<String>,
    pub queries_path: String,
    pub output_dir: String,
    pub skip_without_sources: bool,

    pub top_k: usize,
    pub retrievers: Vec<String>,
    pub join_mode: String,
    pub join_weights: Vec<f64>,
    pub bm25_k: usize,
    pub dense_k: usize,
    pub hyde_k: usize,
    pub faq_k: usize,
    pub oracle_mode: String,
    pub embedding_similarity: String,
    pub faq_similarity: String,

    pub hyde_n: usize,
    pub hyde_temperature: f64,
    pub hyde_max_tokens: usize,

    pub use_reranker: bool,
    pub reranker: String,
    pub use_link_normalizer: bool,

    pub use_generator: bool,
    pub generation_model: String,
    pub generation_temperature: f64,
    pub generation_n: usize,
    pub generation_max_tokens: usize,
    pub llm_base_url: Option<String>,
    pub llm_timeout_secs: Option<u64>,

    pub seed: Option<u64>,
    pub system_prompt: String,
    pub user_template: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            corpus_path: "data/corpus.json".into(),
            faq_path: None,
            queries_path: "data/queries.json".into(),
            output_dir: "runs/default".into(),
            skip_without_sources: true,
            top_k: 50,
            retrievers: vec!["bm25".into()],
            join_mode: "reciprocal_rank_fusion".into(),
            join_weights: Vec::new(),
            bm25_k: 50,
            dense_k: 50,
            hyde_k: 50,
            faq_k: 1,
            oracle_mode: "oracle".into(),
            embedding_similarity: "cosine".into(),
            faq_similarity: "cosine".into(),
            hyde_n: 3,
            hyde_temperature: 0.75,
            hyde_max_tokens: 512,
            use_reranker: false,
            reranker: "similarity".into(),
            use_link_normalizer: true,
            use_generator: false,
            generation_model: "gpt-4o-mini".into(),
            generation_temperature: 0.7,
            generation_n: 3,
            generation_max_tokens: 512,
            llm_base_url: None,
            llm_timeout_secs: None,
            seed: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            user_template: DEFAULT_USER_TEMPLATE.into(),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retrievers.is_empty() {
            return Err(Error::config("at least one retriever is required"));
        }
        if let Some(unknown) = self.retrievers.iter().find(|r| !KNOWN_RETRIEVERS.contains(&r.as_str())) {
            return Err(Error::config(format!(
                "unknown retriever '{unknown}', expected one of {}",
                KNOWN_RETRIEVERS.join(", ")
            )));
        }
        if !self.join_weights.is_empty() && self.join_weights.len() != self.retrievers.len() {
            return Err(Error::config(format!(
                "{} join weights given for {} retrievers",
                self.join_weights.len(),
                self.retrievers.len()
            )));
        }
        if self.retrievers.iter().any(|r| r == "faq") && self.faq_path.is_none() {
            return Err(Error::config("the faq retriever needs faq_path"));
        }
        if self.generation_n == 0 || self.hyde_n == 0 {
            return Err(Error::config("sample counts must be at least 1"));
        }
        Ok(())
    }

    /// Join weights aligned with `retrievers`, uniform when unset.
    pub fn weights(&self) -> Vec<f64> {
        if self.join_weights.is_empty() {
            vec![1.0; self.retrievers.len()]
        } else {
            self.join_weights.clone()
        }
    }

    pub fn uses(&self, retriever: &str) -> bool {
        self.retrievers.iter().any(|r| r == retriever)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
