//! Hypothetical document embeddings: embed what an answer page might look
//! like instead of the bare question.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::ChatMessage;
use ragbench_vector::DocumentEmbedder;

use crate::generation::MultiSampleGenerator;
use crate::prompt::render;

pub const HYDE_SYSTEM_PROMPT: &str = "You write short informational web pages. Given a question, write the page \
that would answer it, in Markdown, with a title and at most 300 words. Write only the page.";

pub const HYDE_USER_TEMPLATE: &str = "Question: {{ question }}\n\nPage:";

pub struct Hyde {
    sampler: MultiSampleGenerator,
    embedder: Arc<DocumentEmbedder>,
    system_prompt: String,
    user_template: String,
}

impl Hyde {
    pub fn new(sampler: MultiSampleGenerator, embedder: Arc<DocumentEmbedder>) -> Self {
        Self { sampler, embedder, system_prompt: HYDE_SYSTEM_PROMPT.into(), user_template: HYDE_USER_TEMPLATE.into() }
    }

    pub fn with_prompts(mut self, system_prompt: impl Into<String>, user_template: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self.user_template = user_template.into();
        self
    }

    pub fn messages(&self, question: &str) -> Result<Vec<ChatMessage>> {
        let context = BTreeMap::from([("question".to_string(), Value::String(question.to_string()))]);
        Ok(vec![ChatMessage::system(&self.system_prompt), ChatMessage::user(render(&self.user_template, &context)?)])
    }

    /// The element-wise mean of the page embeddings, and the pages.
    pub fn embed(&self, question: &str) -> Result<(Vec<f32>, Vec<String>)> {
        let pages = self.sampler.sample_blocking(&self.messages(question)?)?;
        if pages.is_empty() {
            return Err(Error::Generation("no hypothetical pages were generated".into()));
        }
        let vectors = self.embedder.embed_texts(&pages)?;
        debug!(pages = pages.len(), "hypothetical pages embedded");
        Ok((mean(&vectors)?, pages))
    }
}

fn mean(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    let mut sum = vec![0f32; dim];
    for v in vectors {
        if v.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
        }
        for (acc, x) in sum.iter_mut().zip(v) { *acc += x; }
    }
    let n = vectors.len().max(1) as f32;
    Ok(sum.into_iter().map(|x| x / n).collect())
}

impl Stage for Hyde {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let question = inputs.require_text("text")?;
        let (embedding, pages) = self.embed(&question)?;
        Ok(Ports::new().with("embedding", embedding).with("hypothetical_documents", pages))
    }
}
