//! Predicate sequence wire format
//!
//! The query builder hands over an ordered list of tagged records:
//!
//! ```json
//! [{"type": "filter", "filter": {"email": "a@x.com"}},
//!  {"type": "ne", "key": "status", "val": "banned"},
//!  {"type": "sort", "sortKey": "created", "desc": true},
//!  {"type": "limit", "limitAmount": 20}]
//! ```
//!
//! The sequence is accepted either as a bare array or wrapped as
//! `{"pts": [...]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pattern::Pattern;
use crate::errors::{StoreError, StoreResult};
use crate::storage::Document;

/// One unit of query intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Predicate {
    /// Equality per field; regex markers become pattern constraints
    #[serde(rename = "filter")]
    Filter { filter: Document },

    /// Array field contains a matching element
    #[serde(rename = "elem")]
    Elem {
        #[serde(rename = "arrKey")]
        arr_key: String,
        filter: Value,
    },

    /// Not equal. Adjacent `ne` on the same key coalesce.
    #[serde(rename = "ne")]
    Ne { key: String, val: Value },

    /// Value not in the list
    #[serde(rename = "nin")]
    Nin { key: String, vals: Vec<Value> },

    /// Value in the list
    #[serde(rename = "in")]
    In { key: String, vals: Vec<Value> },

    /// At least one sub-match holds
    #[serde(rename = "whereOr")]
    WhereOr { matches: Vec<Document> },

    /// Every sub-match holds
    #[serde(rename = "whereAnd")]
    WhereAnd { matches: Vec<Document> },

    #[serde(rename = "limit")]
    Limit {
        #[serde(rename = "limitAmount")]
        amount: u64,
    },

    #[serde(rename = "skip")]
    Skip {
        #[serde(rename = "skipAmount")]
        amount: u64,
    },

    #[serde(rename = "sort")]
    Sort {
        #[serde(rename = "sortKey")]
        key: String,
        #[serde(default)]
        desc: bool,
    },

    #[serde(rename = "gt")]
    Gt { key: String, min: Value },

    #[serde(rename = "gte")]
    Gte { key: String, min: Value },

    #[serde(rename = "lt")]
    Lt { key: String, max: Value },

    #[serde(rename = "lte")]
    Lte { key: String, max: Value },
}

impl Predicate {
    pub fn filter(fields: Document) -> Self {
        Predicate::Filter { filter: fields }
    }

    pub fn elem(arr_key: impl Into<String>, filter: Value) -> Self {
        Predicate::Elem {
            arr_key: arr_key.into(),
            filter,
        }
    }

    pub fn ne(key: impl Into<String>, val: Value) -> Self {
        Predicate::Ne {
            key: key.into(),
            val,
        }
    }

    pub fn nin(key: impl Into<String>, vals: Vec<Value>) -> Self {
        Predicate::Nin {
            key: key.into(),
            vals,
        }
    }

    pub fn in_list(key: impl Into<String>, vals: Vec<Value>) -> Self {
        Predicate::In {
            key: key.into(),
            vals,
        }
    }

    pub fn where_or(matches: Vec<Document>) -> Self {
        Predicate::WhereOr { matches }
    }

    pub fn where_and(matches: Vec<Document>) -> Self {
        Predicate::WhereAnd { matches }
    }

    pub fn limit(amount: u64) -> Self {
        Predicate::Limit { amount }
    }

    pub fn skip(amount: u64) -> Self {
        Predicate::Skip { amount }
    }

    pub fn sort(key: impl Into<String>, desc: bool) -> Self {
        Predicate::Sort {
            key: key.into(),
            desc,
        }
    }

    pub fn gt(key: impl Into<String>, min: Value) -> Self {
        Predicate::Gt {
            key: key.into(),
            min,
        }
    }

    pub fn gte(key: impl Into<String>, min: Value) -> Self {
        Predicate::Gte {
            key: key.into(),
            min,
        }
    }

    pub fn lt(key: impl Into<String>, max: Value) -> Self {
        Predicate::Lt {
            key: key.into(),
            max,
        }
    }

    pub fn lte(key: impl Into<String>, max: Value) -> Self {
        Predicate::Lte {
            key: key.into(),
            max,
        }
    }

    /// Wire name of the predicate kind
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Filter { .. } => "filter",
            Predicate::Elem { .. } => "elem",
            Predicate::Ne { .. } => "ne",
            Predicate::Nin { .. } => "nin",
            Predicate::In { .. } => "in",
            Predicate::WhereOr { .. } => "whereOr",
            Predicate::WhereAnd { .. } => "whereAnd",
            Predicate::Limit { .. } => "limit",
            Predicate::Skip { .. } => "skip",
            Predicate::Sort { .. } => "sort",
            Predicate::Gt { .. } => "gt",
            Predicate::Gte { .. } => "gte",
            Predicate::Lt { .. } => "lt",
            Predicate::Lte { .. } => "lte",
        }
    }

    /// Field key of the predicate, for kinds that target one field
    pub fn field_key(&self) -> Option<&str> {
        match self {
            Predicate::Elem { arr_key, .. } => Some(arr_key),
            Predicate::Ne { key, .. }
            | Predicate::Nin { key, .. }
            | Predicate::In { key, .. }
            | Predicate::Sort { key, .. }
            | Predicate::Gt { key, .. }
            | Predicate::Gte { key, .. }
            | Predicate::Lt { key, .. }
            | Predicate::Lte { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Structural checks serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(key) = self.field_key() {
            if key.is_empty() {
                return Err(format!("{} requires a non-empty key", self.kind()));
            }
        }

        match self {
            Predicate::Filter { filter } => {
                for (field, value) in filter {
                    if field.is_empty() {
                        return Err("filter contains an empty field name".into());
                    }
                    if let Some(pattern) = Pattern::from_marker(value) {
                        pattern.map_err(|e| format!("filter field '{}': {}", field, e))?;
                    }
                }
                Ok(())
            }
            Predicate::WhereOr { matches } | Predicate::WhereAnd { matches }
                if matches.is_empty() =>
            {
                Err(format!("{} requires at least one match", self.kind()))
            }
            _ => Ok(()),
        }
    }

    /// Parse one predicate; `index` is its position in the sequence
    pub fn from_json(index: usize, value: &Value) -> StoreResult<Self> {
        let predicate: Predicate = serde_json::from_value(value.clone())
            .map_err(|e| StoreError::malformed_predicate(index, e.to_string()))?;
        predicate
            .validate()
            .map_err(|reason| StoreError::malformed_predicate(index, reason))?;
        Ok(predicate)
    }

    /// Parse a predicate sequence: a bare array or `{"pts": [...]}`
    pub fn parse_sequence(value: &Value) -> StoreResult<Vec<Self>> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(obj) => match obj.get("pts") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(StoreError::malformed_predicate(
                        0,
                        "expected an array of predicates or {\"pts\": [...]}",
                    ))
                }
            },
            _ => {
                return Err(StoreError::malformed_predicate(
                    0,
                    "expected an array of predicates",
                ))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| Self::from_json(index, item))
            .collect()
    }
}
