//! Embedding backends: a candle XLM-RoBERTa sentence encoder and a
//! deterministic hashing embedder for tests and offline runs.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use ragbench_core::traits::Embedder;

pub use pool::masked_mean_l2;

const MAX_LEN: usize = 256;

/// Sentence embeddings from an XLM-RoBERTa checkpoint (BGE-M3 layout):
/// mean pooling over unmasked tokens, then L2 normalisation.
pub struct SentenceEmbedder {
    id: String,
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

impl SentenceEmbedder {
    pub fn new() -> Result<Self> { Self::from_dir(&resolve_model_dir()?) }

    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "loading sentence embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = config.hidden_size;
        let weights_map = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let id = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "xlm-roberta".into());
        info!(model = %id, dim, "sentence embedding model loaded");
        Ok(Self { id, model, tokenizer, device, dim })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, MAX_LEN, &self.device)?;
        let (batch, width) = input_ids.dims2()?;
        let token_type_ids = Tensor::zeros((batch, width), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?)
    }
}

impl Embedder for SentenceEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { MAX_LEN }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let out = self.embed_chunk(texts)?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 * texts.len() as u128 { warn!(?elapsed, batch = texts.len(), "slow embedding"); }
        debug!(?elapsed, batch = texts.len(), "embedded batch");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let weights = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?;
    Ok(weights.into_iter().collect())
}

/// Bag-of-words vectors from xxhash buckets. Same text, same vector; texts
/// sharing words point in similar directions. No model files needed.
pub struct HashingEmbedder { id: String, dim: usize }

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { id: format!("hashing-{dim}"), dim } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// The model embedder, or the hashing embedder when `APP_USE_FAKE_EMBEDDINGS`
/// is `1`/`true`.
pub fn get_default_embedder() -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake { info!("using hashing embedder"); return Ok(Box::new(HashingEmbedder::new(1024))); }
    Ok(Box::new(SentenceEmbedder::new()?))
}

fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { let p = PathBuf::from(&dir); if p.exists() { debug!(var, dir = %p.display(), "model dir from env"); return Ok(p); } }
    }
    for candidate in ["models/bge-m3", "../models/bge-m3"] {
        let p = Path::new(candidate); if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate model directory; set APP_MODEL_DIR"))
}
