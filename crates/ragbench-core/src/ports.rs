//! Named values flowing between pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::types::{ChatMessage, Document};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortValue {
    Text(String),
    Documents(Vec<Document>),
    Embedding(Vec<f32>),
    Filter(Filter),
    Count(usize),
    Flag(bool),
    Messages(Vec<ChatMessage>),
    Replies(Vec<String>),
    Variables(BTreeMap<String, Value>),
    /// Values from several upstream edges into one port, in connection order.
    Many(Vec<PortValue>),
}

impl PortValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Documents(_) => "documents",
            Self::Embedding(_) => "embedding",
            Self::Filter(_) => "filter",
            Self::Count(_) => "count",
            Self::Flag(_) => "flag",
            Self::Messages(_) => "messages",
            Self::Replies(_) => "replies",
            Self::Variables(_) => "variables",
            Self::Many(_) => "many",
        }
    }
}

impl From<String> for PortValue {
    fn from(v: String) -> Self { Self::Text(v) }
}
impl From<&str> for PortValue {
    fn from(v: &str) -> Self { Self::Text(v.to_string()) }
}
impl From<Vec<Document>> for PortValue {
    fn from(v: Vec<Document>) -> Self { Self::Documents(v) }
}
impl From<Vec<f32>> for PortValue {
    fn from(v: Vec<f32>) -> Self { Self::Embedding(v) }
}
impl From<Filter> for PortValue {
    fn from(v: Filter) -> Self { Self::Filter(v) }
}
impl From<usize> for PortValue {
    fn from(v: usize) -> Self { Self::Count(v) }
}
impl From<bool> for PortValue {
    fn from(v: bool) -> Self { Self::Flag(v) }
}
impl From<Vec<ChatMessage>> for PortValue {
    fn from(v: Vec<ChatMessage>) -> Self { Self::Messages(v) }
}
impl From<Vec<String>> for PortValue {
    fn from(v: Vec<String>) -> Self { Self::Replies(v) }
}
impl From<BTreeMap<String, Value>> for PortValue {
    fn from(v: BTreeMap<String, Value>) -> Self { Self::Variables(v) }
}

/// Port name -> value, consumed by a stage's `run`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ports {
    values: BTreeMap<String, PortValue>,
}

fn mismatch(port: &str, expected: &str, got: &PortValue) -> Error {
    Error::config(format!("port '{port}' expects {expected}, got {}", got.kind()))
}

impl Ports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, port: impl Into<String>, value: impl Into<PortValue>) -> Self {
        self.insert(port, value);
        self
    }

    pub fn insert(&mut self, port: impl Into<String>, value: impl Into<PortValue>) {
        self.values.insert(port.into(), value.into());
    }

    pub fn get(&self, port: &str) -> Option<&PortValue> {
        self.values.get(port)
    }

    pub fn take(&mut self, port: &str) -> Option<PortValue> {
        self.values.remove(port)
    }

    pub fn contains(&self, port: &str) -> bool {
        self.values.contains_key(port)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, PortValue> {
        self.values
    }

    pub fn take_text(&mut self, port: &str) -> Result<Option<String>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Text(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "text", &other)),
        }
    }

    pub fn require_text(&mut self, port: &str) -> Result<String> {
        self.take_text(port)?.ok_or_else(|| Error::config(format!("missing required input '{port}'")))
    }

    pub fn take_documents(&mut self, port: &str) -> Result<Option<Vec<Document>>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Documents(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "documents", &other)),
        }
    }

    /// Every document list delivered to `port`; a single list becomes one entry.
    pub fn take_document_lists(&mut self, port: &str) -> Result<Vec<Vec<Document>>> {
        match self.take(port) {
            None => Ok(Vec::new()),
            Some(PortValue::Documents(v)) => Ok(vec![v]),
            Some(PortValue::Many(values)) => values
                .into_iter()
                .map(|value| match value {
                    PortValue::Documents(v) => Ok(v),
                    other => Err(mismatch(port, "documents", &other)),
                })
                .collect(),
            Some(other) => Err(mismatch(port, "documents", &other)),
        }
    }

    pub fn take_filter(&mut self, port: &str) -> Result<Option<Filter>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Filter(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "filter", &other)),
        }
    }

    pub fn take_count(&mut self, port: &str) -> Result<Option<usize>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Count(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "count", &other)),
        }
    }

    pub fn take_flag(&mut self, port: &str) -> Result<Option<bool>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Flag(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "flag", &other)),
        }
    }

    pub fn require_embedding(&mut self, port: &str) -> Result<Vec<f32>> {
        match self.take(port) {
            None => Err(Error::config(format!("missing required input '{port}'"))),
            Some(PortValue::Embedding(v)) => Ok(v),
            Some(other) => Err(mismatch(port, "embedding", &other)),
        }
    }

    pub fn require_messages(&mut self, port: &str) -> Result<Vec<ChatMessage>> {
        match self.take(port) {
            None => Err(Error::config(format!("missing required input '{port}'"))),
            Some(PortValue::Messages(v)) => Ok(v),
            Some(other) => Err(mismatch(port, "messages", &other)),
        }
    }

    pub fn take_messages(&mut self, port: &str) -> Result<Option<Vec<ChatMessage>>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Messages(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "messages", &other)),
        }
    }

    pub fn take_replies(&mut self, port: &str) -> Result<Option<Vec<String>>> {
        match self.take(port) {
            None => Ok(None),
            Some(PortValue::Replies(v)) => Ok(Some(v)),
            Some(other) => Err(mismatch(port, "replies", &other)),
        }
    }

    pub fn take_variables(&mut self, port: &str) -> Result<BTreeMap<String, Value>> {
        match self.take(port) {
            None => Ok(BTreeMap::new()),
            Some(PortValue::Variables(v)) => Ok(v),
            Some(other) => Err(mismatch(port, "variables", &other)),
        }
    }
}

impl FromIterator<(String, PortValue)> for Ports {
    fn from_iter<I: IntoIterator<Item = (String, PortValue)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

impl IntoIterator for Ports {
    type Item = (String, PortValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, PortValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
