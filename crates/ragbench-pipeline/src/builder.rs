//! Config-driven assembly of the retrieval and generation graph.
//!
//! ```text
//! bm25_retriever ─────────────────────┐
//! oracle_retriever ───────────────────┤
//! dense_embedder -> dense_retriever ──┼─> document_joiner -> [reranker] -> [link_normalizer -> prompt_builder -> llm]
//! hyde_embedder  -> hyde_retriever ───┤
//! faq_retriever ──────────────────────┘
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use ragbench_core::config::ExperimentConfig;
use ragbench_core::error::{Error, Result};
use ragbench_core::filter::Filter;
use ragbench_core::ports::{PortValue, Ports};
use ragbench_core::traits::{Generator, Stage};
use ragbench_core::types::{ChatMessage, Document, GeneratedAnswer, Query};
use ragbench_hybrid::{DocumentJoiner, DocumentStore, EmbeddingRetriever, FaqRetriever, LexicalRetriever, TextEmbedderStage};
use ragbench_vector::{DocumentEmbedder, Similarity};

use crate::generation::MultiSampleGenerator;
use crate::graph::Pipeline;
use crate::hyde::Hyde;
use crate::links::ContentLinkNormalizer;
use crate::prompt::PromptBuilder;
use crate::rerank::{RandomReranker, RerankerKind, ScoreOrderReranker, SimilarityReranker};

pub const JOINER: &str = "document_joiner";
pub const RERANKER: &str = "reranker";
pub const LINK_NORMALIZER: &str = "link_normalizer";
pub const PROMPT_BUILDER: &str = "prompt_builder";
pub const LLM: &str = "llm";

/// Models the pipeline calls out to. Which ones are needed depends on the
/// configured retrievers, reranker and generator.
#[derive(Clone, Default)]
pub struct Backends {
    pub embedder: Option<Arc<DocumentEmbedder>>,
    pub generator: Option<Arc<dyn Generator>>,
    pub hyde_generator: Option<Arc<dyn Generator>>,
}

impl Backends {
    fn embedder(&self, purpose: &str) -> Result<Arc<DocumentEmbedder>> {
        self.embedder.clone().ok_or_else(|| Error::config(format!("{purpose} needs an embedder")))
    }

    fn generator(&self, purpose: &str) -> Result<Arc<dyn Generator>> {
        self.generator.clone().ok_or_else(|| Error::config(format!("{purpose} needs a generator")))
    }
}

/// What one query produced: the generated replies (or an empty string when
/// no generator is configured) and the final evidence list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub generated_answer: GeneratedAnswer,
    pub documents: Vec<Document>,
}

pub struct RagPipeline {
    graph: Pipeline,
    retrievers: Vec<String>,
    evidence_stage: &'static str,
    generates: bool,
    template: Vec<ChatMessage>,
}

impl RagPipeline {
    pub fn from_config(cfg: &ExperimentConfig, corpus: Vec<Document>, faqs: Vec<Document>, backends: &Backends) -> Result<Self> {
        cfg.validate()?;
        let mut graph = Pipeline::new();

        let mut corpus = corpus;
        if cfg.uses("dense") || cfg.uses("hyde") {
            backends.embedder("dense retrieval")?.embed_documents(&mut corpus)?;
        }
        let mut store = DocumentStore::new(cfg.embedding_similarity.parse()?)?;
        let written = store.write(corpus)?;
        info!(documents = written, "document store ready");
        let store = Arc::new(store);

        let joiner = DocumentJoiner::new(cfg.join_mode.parse()?).with_weights(cfg.weights()).with_top_k(cfg.top_k);
        graph.add_stage(JOINER, joiner)?;

        // Connection order follows `retrievers` so join weights line up.
        for retriever in &cfg.retrievers {
            match retriever.as_str() {
                "bm25" => {
                    let stage = seeded(LexicalRetriever::new(Arc::clone(&store), "default")?, cfg.seed).with_top_k(cfg.bm25_k).with_scale_score(true);
                    graph.add_stage("bm25_retriever", stage)?;
                    graph.connect("bm25_retriever.documents", JOINER)?;
                }
                "oracle" => {
                    let stage = seeded(LexicalRetriever::new(Arc::clone(&store), &cfg.oracle_mode)?, cfg.seed).with_top_k(cfg.bm25_k).with_scale_score(true);
                    graph.add_stage("oracle_retriever", stage)?;
                    graph.connect("oracle_retriever.documents", JOINER)?;
                }
                "dense" => {
                    graph.add_stage("dense_embedder", TextEmbedderStage::new(backends.embedder("dense retrieval")?))?;
                    graph.add_stage("dense_retriever", EmbeddingRetriever::new(Arc::clone(&store)).with_top_k(cfg.dense_k).with_scale_score(true))?;
                    graph.connect("dense_embedder.embedding", "dense_retriever.query_embedding")?;
                    graph.connect("dense_retriever.documents", JOINER)?;
                }
                "hyde" => {
                    let generator = backends.hyde_generator.clone().map_or_else(|| backends.generator("hyde"), Ok)?;
                    let hyde = Hyde::new(MultiSampleGenerator::new(generator, cfg.hyde_n), backends.embedder("hyde")?);
                    graph.add_stage("hyde_embedder", hyde)?;
                    graph.add_stage("hyde_retriever", EmbeddingRetriever::new(Arc::clone(&store)).with_top_k(cfg.hyde_k).with_scale_score(true))?;
                    graph.connect("hyde_embedder.embedding", "hyde_retriever.query_embedding")?;
                    graph.connect("hyde_retriever.documents", JOINER)?;
                }
                "faq" => {
                    let faq = FaqRetriever::build(Arc::clone(&store), faqs.clone(), backends.embedder("faq retrieval")?, cfg.faq_similarity.parse::<Similarity>()?)?
                        .with_top_k(cfg.faq_k);
                    graph.add_stage("faq_retriever", faq)?;
                    graph.connect("faq_retriever.documents", JOINER)?;
                }
                other => return Err(Error::config(format!("unknown retriever '{other}'"))),
            }
        }

        let mut evidence_stage = JOINER;
        if cfg.use_reranker {
            graph.add_stage(RERANKER, reranker(cfg, backends)?)?;
            graph.connect(JOINER, RERANKER)?;
            evidence_stage = RERANKER;
        }

        if cfg.use_generator {
            let mut upstream = evidence_stage;
            if cfg.use_link_normalizer {
                graph.add_stage(LINK_NORMALIZER, ContentLinkNormalizer::new()?)?;
                graph.connect(upstream, LINK_NORMALIZER)?;
                upstream = LINK_NORMALIZER;
            }
            graph.add_stage(PROMPT_BUILDER, PromptBuilder::chat(&cfg.system_prompt, &cfg.user_template))?;
            graph.add_stage(LLM, MultiSampleGenerator::new(backends.generator("answer generation")?, cfg.generation_n))?;
            graph.connect(upstream, &format!("{PROMPT_BUILDER}.documents"))?;
            graph.connect(&format!("{PROMPT_BUILDER}.prompt"), &format!("{LLM}.messages"))?;
        }

        info!(retrievers = ?cfg.retrievers, reranker = cfg.use_reranker, generator = cfg.use_generator, "pipeline assembled");
        Ok(Self {
            graph,
            retrievers: cfg.retrievers.clone(),
            evidence_stage,
            generates: cfg.use_generator,
            template: vec![ChatMessage::system(&cfg.system_prompt), ChatMessage::user(&cfg.user_template)],
        })
    }

    pub fn graph(&self) -> &Pipeline { &self.graph }

    /// Run one query. Any failure is logged with the query id and yields an
    /// empty answer with no evidence.
    pub fn run_query(&self, query: &Query) -> QueryOutcome {
        match self.try_run_query(query) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(query_id = %query.id, error = %e, "query failed");
                QueryOutcome::default()
            }
        }
    }

    pub fn try_run_query(&self, query: &Query) -> Result<QueryOutcome> {
        let mut include = vec![self.evidence_stage];
        if self.generates { include.push(LLM); }
        let mut outputs = self.graph.run(self.inputs(query), &include)?;

        let documents = outputs
            .get_mut(self.evidence_stage)
            .map(|ports| ports.take_documents("documents"))
            .transpose()?
            .flatten()
            .unwrap_or_default();
        let generated_answer = match outputs.get_mut(LLM) {
            Some(ports) if self.generates => GeneratedAnswer::Samples(ports.take_replies("replies")?.unwrap_or_default()),
            _ => GeneratedAnswer::default(),
        };
        Ok(QueryOutcome { generated_answer, documents })
    }

    fn inputs(&self, query: &Query) -> BTreeMap<String, Ports> {
        let question = query.question.as_str();
        let mut inputs = BTreeMap::new();
        for retriever in &self.retrievers {
            let (stage, ports) = match retriever.as_str() {
                "bm25" => ("bm25_retriever", Ports::new().with("query", question)),
                "oracle" => ("oracle_retriever", Ports::new().with("query", question).with("filters", Filter::for_sources(&query.sources))),
                "dense" => ("dense_embedder", Ports::new().with("text", question)),
                "hyde" => ("hyde_embedder", Ports::new().with("text", question)),
                "faq" => ("faq_retriever", Ports::new().with("text", question)),
                _ => continue,
            };
            inputs.insert(stage.to_string(), ports);
        }
        if self.graph.has_stage(RERANKER) {
            inputs.insert(RERANKER.to_string(), Ports::new().with("query", question));
        }
        if self.generates {
            let variables = BTreeMap::from([("query".to_string(), Value::String(query.question.clone()))]);
            inputs.insert(
                PROMPT_BUILDER.to_string(),
                Ports::new().with("template", self.template.clone()).with("template_variables", PortValue::Variables(variables)),
            );
        }
        inputs
    }
}

fn seeded(retriever: LexicalRetriever, seed: Option<u64>) -> LexicalRetriever {
    match seed {
        Some(seed) => retriever.with_seed(seed),
        None => retriever,
    }
}

fn reranker(cfg: &ExperimentConfig, backends: &Backends) -> Result<Box<dyn Stage>> {
    Ok(match cfg.reranker.parse::<RerankerKind>()? {
        RerankerKind::Similarity => Box::new(SimilarityReranker::new(backends.embedder("the similarity reranker")?).with_top_k(cfg.top_k)),
        RerankerKind::MostRelevantFirst => Box::new(ScoreOrderReranker::most_relevant_first().with_top_k(cfg.top_k)),
        RerankerKind::MostRelevantLast => Box::new(ScoreOrderReranker::most_relevant_last().with_top_k(cfg.top_k)),
        RerankerKind::Random => {
            let random = RandomReranker::new().with_top_k(cfg.top_k);
            Box::new(match cfg.seed { Some(seed) => random.with_seed(seed), None => random })
        }
    })
}
