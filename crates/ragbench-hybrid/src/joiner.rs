//! Fusion of several ranked lists into one.
//!
//! Reciprocal rank fusion: `score(d) = Σ_i w_i / (rank_i(d) + K)`, rank
//! 1-based, summed over the lists that contain `d`.

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{Document, DocumentId};

pub const RRF_K: f64 = 61.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    Concatenate,
    #[default]
    ReciprocalRankFusion,
    Merge,
}

impl FromStr for JoinMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "concatenate" => Ok(Self::Concatenate),
            "reciprocal_rank_fusion" => Ok(Self::ReciprocalRankFusion),
            "merge" => Ok(Self::Merge),
            other => Err(Error::config(format!("unknown join mode '{other}'"))),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Concatenate => "concatenate",
            Self::ReciprocalRankFusion => "reciprocal_rank_fusion",
            Self::Merge => "merge",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentJoiner {
    mode: JoinMode,
    weights: Option<Vec<f64>>,
    top_k: Option<usize>,
}

impl DocumentJoiner {
    pub fn new(mode: JoinMode) -> Self { Self { mode, weights: None, top_k: None } }

    /// Weights align with the input lists in connection order.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self { self.weights = Some(weights); self }
    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = Some(top_k); self }

    pub fn mode(&self) -> JoinMode { self.mode }

    pub fn join(&self, lists: Vec<Vec<Document>>, top_k: Option<usize>) -> Result<Vec<Document>> {
        let weights = self.weights_for(lists.len())?;
        let mut out = match self.mode {
            JoinMode::Concatenate => lists.into_iter().flatten().collect(),
            JoinMode::ReciprocalRankFusion => fuse(lists, &weights, |rank, _, w| w / (rank as f64 + RRF_K)),
            JoinMode::Merge => fuse(lists, &weights, |_, doc, w| w * doc.score.unwrap_or(0.0)),
        };
        if let Some(k) = top_k.or(self.top_k) { out.truncate(k); }
        debug!(mode = %self.mode, count = out.len(), "joined");
        Ok(out)
    }

    fn weights_for(&self, n: usize) -> Result<Vec<f64>> {
        match &self.weights {
            Some(w) if w.len() != n => Err(Error::config(format!("{} join weights for {} document lists", w.len(), n))),
            Some(w) => Ok(w.clone()),
            None if self.mode == JoinMode::Merge => Ok(vec![1.0 / n.max(1) as f64; n]),
            None => Ok(vec![1.0; n]),
        }
    }
}

/// Accumulate `contribution(rank, doc, weight)` per id, counting each id once
/// per list at its first rank. Fields come from the first occurrence overall;
/// ties keep first-appearance order.
fn fuse(lists: Vec<Vec<Document>>, weights: &[f64], contribution: impl Fn(usize, &Document, f64) -> f64) -> Vec<Document> {
    let mut fused: IndexMap<DocumentId, (Document, f64)> = IndexMap::new();
    for (list, weight) in lists.into_iter().zip(weights) {
        let mut seen = std::collections::HashSet::new();
        for (i, doc) in list.into_iter().enumerate() {
            if !seen.insert(doc.id.clone()) { continue; }
            let add = contribution(i + 1, &doc, *weight);
            fused.entry(doc.id.clone()).or_insert_with(|| (doc, 0.0)).1 += add;
        }
    }
    let mut ranked: Vec<(Document, f64)> = fused.into_values().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().map(|(mut doc, score)| { doc.score = Some(score); doc }).collect()
}

impl Stage for DocumentJoiner {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let lists = inputs.take_document_lists("documents")?;
        let top_k = inputs.take_count("top_k")?;
        Ok(Ports::new().with("documents", self.join(lists, top_k)?))
    }
}
