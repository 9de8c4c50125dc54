//! Domain types shared by the document store, the retrieval strategies and
//! the pipeline stages.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type DocumentId = String;

/// Reference number -> target URL, kept in first-seen order.
pub type LinkMap = IndexMap<u32, String>;

/// Score assigned by ground-truth retrieval; far above any lexical or
/// similarity score.
pub const ORACLE_SCORE: f64 = 999_999.0;

/// Parent reference carried by child units such as FAQ entries.
///
/// On the wire this is either a single id or a list of ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentRef {
    One(DocumentId),
    Many(Vec<DocumentId>),
}

impl ParentRef {
    pub fn ids(&self) -> &[DocumentId] {
        match self {
            Self::One(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids,
        }
    }
}

impl From<Vec<DocumentId>> for ParentRef {
    fn from(ids: Vec<DocumentId>) -> Self {
        Self::Many(ids)
    }
}

/// Structured document metadata.
///
/// The recognized keys are explicit fields; anything else (OpenGraph tags,
/// crawl provenance) lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        deserialize_with = "deserialize_links"
    )]
    pub links: LinkMap,
    #[serde(default, rename = "parent_id", skip_serializing_if = "Option::is_none")]
    pub parent_ids: Option<ParentRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DocumentMeta {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        self.links = links.into_iter().map(|(n, url)| (n, url.into())).collect();
        self
    }

    pub fn with_parents(mut self, parents: ParentRef) -> Self {
        self.parent_ids = Some(parents);
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// JSON object keys are strings; flattened structs buffer them as such, so
// numeric keys are parsed by hand.
fn deserialize_links<'de, D>(deserializer: D) -> Result<LinkMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, String>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(number, url)| {
            number
                .trim()
                .parse::<u32>()
                .map(|n| (n, url))
                .map_err(|e| serde::de::Error::custom(format!("invalid link number '{number}': {e}")))
        })
        .collect()
}

/// A unit of retrievable content.
///
/// - `id`: stable identity; equal ids mean the same entity for deduplication
/// - `embedding`: optional dense vector used by vector search
/// - `score`: strategy-specific relevance, higher is better
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentRecord")]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub meta: DocumentMeta,
}

#[derive(Deserialize)]
struct DocumentRecord {
    #[serde(default)]
    id: Option<DocumentId>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    meta: DocumentMeta,
}

impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        let id = match record.id {
            Some(id) if !id.is_empty() => id,
            _ => content_id(&record.content, &record.meta),
        };
        Self { id, content: record.content, embedding: record.embedding, score: record.score, meta: record.meta }
    }
}

impl Document {
    /// Build a document whose id is derived from its content.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_meta(content, DocumentMeta::default())
    }

    /// Build a document whose id is derived from its content and metadata.
    pub fn with_meta(content: impl Into<String>, meta: DocumentMeta) -> Self {
        let content = content.into();
        let id = content_id(&content, &meta);
        Self { id, content, embedding: None, score: None, meta }
    }

    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// A copy carrying `score`; the receiver is left untouched.
    pub fn scored(&self, score: f64) -> Self {
        let mut copy = self.clone();
        copy.score = Some(score);
        copy
    }

    pub fn url(&self) -> Option<&str> {
        self.meta.url.as_deref()
    }

    /// Resolve a filter field path (`id`, `content`, `score`, `meta.<key>`).
    pub fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::String(self.id.clone())),
            "content" => Some(Value::String(self.content.clone())),
            "score" => self.score.map(Value::from),
            _ => {
                let key = field.strip_prefix("meta.")?;
                match key {
                    "url" => self.meta.url.clone().map(Value::String),
                    "parent_id" => self.meta.parent_ids.as_ref().map(|parents| match parents {
                        ParentRef::One(id) => Value::String(id.clone()),
                        ParentRef::Many(ids) => Value::from(ids.clone()),
                    }),
                    "sources" if !self.meta.sources.is_empty() => Some(Value::from(self.meta.sources.clone())),
                    "sources" => None,
                    other => self.meta.extra.get(other).cloned(),
                }
            }
        }
    }
}

/// Content-derived identity: hex blake3 over content and serialized meta.
pub fn content_id(content: &str, meta: &DocumentMeta) -> DocumentId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content.as_bytes());
    if let Ok(meta_json) = serde_json::to_vec(meta) {
        hasher.update(&meta_json);
    }
    hasher.finalize().to_hex().to_string()
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by the index engines.
///
/// `id` matches `Document::id`. `score` is engine-specific but higher is
/// always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub score: f64,
    pub source: SourceKind,
}

/// An evaluation question with its ground-truth sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Either no generation (empty string) or the collected samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedAnswer {
    Text(String),
    Samples(Vec<String>),
}

impl Default for GeneratedAnswer {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub content: String,
    pub url: String,
    pub score: f64,
}

impl From<&Document> for ContextRecord {
    fn from(doc: &Document) -> Self {
        Self {
            content: doc.content.clone(),
            url: doc.url().unwrap_or_default().to_string(),
            score: doc.score.unwrap_or_default(),
        }
    }
}

/// Per-query result consumed by the evaluation harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub question: String,
    pub ground_truth_sources: Vec<String>,
    pub generated_answer: GeneratedAnswer,
    pub contexts: Vec<ContextRecord>,
    pub duration_seconds: f64,
}
