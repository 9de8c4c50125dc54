use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::filter::Filter;
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{Document, ORACLE_SCORE};

use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Default,
    Oracle,
    OracleRelated,
    OracleRandom,
    Random,
}

impl RetrievalMode {
    pub const ALL: [RetrievalMode; 5] = [Self::Default, Self::Oracle, Self::OracleRelated, Self::OracleRandom, Self::Random];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Oracle => "oracle",
            Self::OracleRelated => "oracle_related",
            Self::OracleRandom => "oracle_random",
            Self::Random => "random",
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::config(format!("unknown retrieval mode '{s}', expected one of default, oracle, oracle_related, oracle_random, random")))
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// BM25 retriever that can also answer from ground truth.
///
/// - `default`: lexical search
/// - `oracle`: the filter's matches, each scored `ORACLE_SCORE`
/// - `oracle_related`: oracle matches, backfilled from lexical search
/// - `oracle_random`: oracle matches, backfilled from a random sample
/// - `random`: a random sample with descending random scores
pub struct LexicalRetriever {
    store: Arc<DocumentStore>,
    mode: RetrievalMode,
    filters: Option<Filter>,
    top_k: usize,
    scale_score: bool,
    rng: Mutex<StdRng>,
}

impl LexicalRetriever {
    pub fn new(store: Arc<DocumentStore>, mode: &str) -> Result<Self> {
        let mode = mode.parse()?;
        Ok(Self { store, mode, filters: None, top_k: 10, scale_score: false, rng: Mutex::new(StdRng::from_entropy()) })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = top_k; self }
    pub fn with_filters(mut self, filters: Filter) -> Self { self.filters = Some(filters); self }
    pub fn with_scale_score(mut self, scale_score: bool) -> Self { self.scale_score = scale_score; self }
    pub fn with_seed(mut self, seed: u64) -> Self { self.rng = Mutex::new(StdRng::seed_from_u64(seed)); self }

    pub fn mode(&self) -> RetrievalMode { self.mode }

    /// Per-call arguments fall back to the instance defaults when `None`.
    pub fn retrieve(&self, query: &str, filters: Option<&Filter>, top_k: Option<usize>, scale_score: Option<bool>) -> Result<Vec<Document>> {
        let filters = filters.or(self.filters.as_ref());
        let top_k = top_k.unwrap_or(self.top_k);
        let scale_score = scale_score.unwrap_or(self.scale_score);
        let docs = match self.mode {
            RetrievalMode::Default => self.store.lexical_search(query, top_k, filters, scale_score)?,
            RetrievalMode::Oracle => self.oracle(filters),
            RetrievalMode::OracleRelated => {
                let related = self.store.lexical_search(query, top_k, None, scale_score)?;
                backfill(self.oracle(filters), related, top_k)
            }
            RetrievalMode::OracleRandom => backfill(self.oracle(filters), self.random(top_k)?, top_k),
            RetrievalMode::Random => self.random(top_k)?,
        };
        debug!(mode = %self.mode, count = docs.len(), "retrieved");
        Ok(docs)
    }

    fn oracle(&self, filters: Option<&Filter>) -> Vec<Document> {
        self.store.filter(filters).into_iter().map(|d| d.scored(ORACLE_SCORE)).collect()
    }

    /// `min(top_k, count)` distinct documents with scores in (0, 1], best first.
    fn random(&self, top_k: usize) -> Result<Vec<Document>> {
        let n = top_k.min(self.store.count());
        let mut rng = self.rng.lock().map_err(|_| Error::Operation("retriever rng lock poisoned".into()))?;
        let picks = rand::seq::index::sample(&mut *rng, self.store.count(), n);
        let mut scores: Vec<f64> = (0..n).map(|_| 1.0 - rng.gen::<f64>()).collect();
        scores.sort_by(|a, b| b.total_cmp(a));
        Ok(picks
            .into_iter()
            .zip(scores)
            .filter_map(|(pos, score)| self.store.get_index(pos).map(|d| d.scored(score)))
            .collect())
    }
}

/// Oracle pool first, then pool entries not already present, capped at `top_k`.
fn backfill(oracle: Vec<Document>, pool: Vec<Document>, top_k: usize) -> Vec<Document> {
    let seen: HashSet<String> = oracle.iter().map(|d| d.id.clone()).collect();
    let room = top_k.saturating_sub(oracle.len());
    let mut out = oracle;
    out.extend(pool.into_iter().filter(|d| !seen.contains(&d.id)).take(room));
    out.truncate(top_k);
    out
}

impl Stage for LexicalRetriever {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let query = inputs.take_text("query")?.unwrap_or_default();
        let filters = inputs.take_filter("filters")?;
        let top_k = inputs.take_count("top_k")?;
        let scale_score = inputs.take_flag("scale_score")?;
        let docs = self.retrieve(&query, filters.as_ref(), top_k, scale_score)?;
        Ok(Ports::new().with("documents", docs))
    }
}
