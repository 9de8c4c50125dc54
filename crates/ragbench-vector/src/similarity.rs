use std::fmt;
use std::str::FromStr;

use ragbench_core::error::Error;

/// Vector similarity function used by dense retrieval and reranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Similarity {
    #[default]
    Cosine,
    DotProduct,
}

impl Similarity {
    /// Raw similarity; higher is more similar. Zero-norm vectors have cosine 0.
    pub fn score(self, a: &[f32], b: &[f32]) -> f64 {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
        match self {
            Self::DotProduct => dot,
            Self::Cosine => {
                let na = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
                let nb = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
                if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
            }
        }
    }

    /// Map a raw score into [0, 1], preserving order.
    pub fn scale(self, score: f64) -> f64 {
        match self {
            Self::Cosine => (score + 1.0) / 2.0,
            Self::DotProduct => 1.0 / (1.0 + (-score / 100.0).exp()),
        }
    }
}

impl FromStr for Similarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "dot_product" => Ok(Self::DotProduct),
            other => Err(Error::config(format!("unknown similarity '{other}', expected cosine or dot_product"))),
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Cosine => "cosine", Self::DotProduct => "dot_product" })
    }
}
