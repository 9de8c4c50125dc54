//! Boolean filter expressions over document fields.
//!
//! Wire format mirrors the retrieval API:
//! `{"field": "meta.url", "operator": "==", "value": "a.de"}` for leaves and
//! `{"operator": "OR", "conditions": [..]}` for combinators. The empty object
//! `{}` is accepted and treated as "no filter".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    Comparison(Comparison),
    Logic(Logic),
    Empty(EmptyFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub operator: ComparisonOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logic {
    pub operator: LogicOp,
    pub conditions: Vec<Filter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyFilter {}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Comparison(Comparison { field: field.into(), operator: ComparisonOp::Eq, value: value.into() })
    }

    pub fn any_of(conditions: Vec<Filter>) -> Self {
        Self::Logic(Logic { operator: LogicOp::Or, conditions })
    }

    pub fn all_of(conditions: Vec<Filter>) -> Self {
        Self::Logic(Logic { operator: LogicOp::And, conditions })
    }

    pub fn empty() -> Self {
        Self::Empty(EmptyFilter {})
    }

    /// OR over `meta.url == source` for every ground-truth source.
    pub fn for_sources<S: AsRef<str>>(sources: &[S]) -> Self {
        Self::any_of(sources.iter().map(|s| Self::eq("meta.url", s.as_ref())).collect())
    }

    /// `{}` and combinators without conditions select nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty(_) => true,
            Self::Logic(logic) => logic.conditions.is_empty(),
            Self::Comparison(_) => false,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Comparison(cmp) => cmp.matches(doc),
            Self::Logic(logic) => match logic.operator {
                LogicOp::And => logic.conditions.iter().all(|c| c.matches(doc)),
                LogicOp::Or => logic.conditions.iter().any(|c| c.matches(doc)),
                LogicOp::Not => !logic.conditions.iter().all(|c| c.matches(doc)),
            },
            Self::Empty(_) => false,
        }
    }
}

impl Comparison {
    pub fn matches(&self, doc: &Document) -> bool {
        // A field the document does not carry matches under no operator.
        let Some(actual) = doc.field_value(&self.field) else { return false };
        match self.operator {
            ComparisonOp::Eq => values_equal(&actual, &self.value),
            ComparisonOp::Ne => !values_equal(&actual, &self.value),
            ComparisonOp::In => contained_in(&actual, &self.value),
            ComparisonOp::NotIn => !contained_in(&actual, &self.value),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn contained_in(actual: &Value, candidates: &Value) -> bool {
    match candidates {
        Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
        _ => false,
    }
}
