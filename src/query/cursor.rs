//! Compiled cursor
//!
//! A lazy, not-yet-executed query: the constraints the compiler emitted, in
//! emission order, plus ordering and pagination. Nothing here touches
//! storage; terminal calls live on `Collection`.

use serde_json::{json, Map, Value};

use super::pattern::Pattern;
use crate::storage::{Document, FindSpec, SortSpec};

/// One-sided range operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    /// Engine operator name
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "$gt",
            RangeOp::Gte => "$gte",
            RangeOp::Lt => "$lt",
            RangeOp::Lte => "$lte",
        }
    }
}

/// A single emitted constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Combined equality over several fields
    Equals(Document),
    /// Pattern match on one field
    Regex { field: String, pattern: Pattern },
    /// Array field has an element matching `filter`
    ElemMatch { field: String, filter: Value },
    NotEqual { field: String, value: Value },
    NotIn { field: String, values: Vec<Value> },
    In { field: String, values: Vec<Value> },
    Or(Vec<Document>),
    And(Vec<Document>),
    Range { field: String, op: RangeOp, bound: Value },
}

impl Constraint {
    /// Engine filter document for this constraint alone
    pub fn to_filter(&self) -> Document {
        let value = match self {
            Constraint::Equals(fields) => return fields.clone(),
            Constraint::Regex { field, pattern } => json!({ field.clone(): pattern.to_value() }),
            Constraint::ElemMatch { field, filter } => {
                json!({ field.clone(): { "$elemMatch": filter } })
            }
            Constraint::NotEqual { field, value } => json!({ field.clone(): { "$ne": value } }),
            Constraint::NotIn { field, values } => json!({ field.clone(): { "$nin": values } }),
            Constraint::In { field, values } => json!({ field.clone(): { "$in": values } }),
            Constraint::Or(matches) => json!({ "$or": matches }),
            Constraint::And(matches) => json!({ "$and": matches }),
            Constraint::Range { field, op, bound } => {
                json!({ field.clone(): { op.as_str(): bound } })
            }
        };

        match value {
            Value::Object(filter) => filter,
            _ => Map::new(),
        }
    }
}

/// A compiled query against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    collection: String,
    constraints: Vec<Constraint>,
    sort: Option<SortSpec>,
    skip: Option<u64>,
    limit: Option<u64>,
}

impl Cursor {
    /// An unconstrained cursor over `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            constraints: Vec::new(),
            sort: None,
            skip: None,
            limit: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub(crate) fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    // Later occurrences overwrite earlier ones
    pub(crate) fn set_sort(&mut self, sort: SortSpec) {
        self.sort = Some(sort);
    }

    pub(crate) fn set_skip(&mut self, skip: u64) {
        self.skip = Some(skip);
    }

    pub(crate) fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    /// Engine filter: `{}`, the single constraint, or `$and` of all of them
    pub fn filter_document(&self) -> Document {
        match self.constraints.as_slice() {
            [] => Map::new(),
            [only] => only.to_filter(),
            all => {
                let clauses: Vec<Value> = all
                    .iter()
                    .map(|c| Value::Object(c.to_filter()))
                    .collect();
                let mut filter = Map::new();
                filter.insert("$and".into(), Value::Array(clauses));
                filter
            }
        }
    }

    /// Read parameters handed to the engine
    pub fn find_spec(&self) -> FindSpec {
        FindSpec {
            filter: self.filter_document(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }

    /// The cursor as an aggregation pipeline
    pub fn pipeline(&self) -> Vec<Value> {
        let mut stages = vec![json!({ "$match": self.filter_document() })];
        if let Some(sort) = &self.sort {
            stages.push(json!({ "$sort": sort.to_value() }));
        }
        if let Some(skip) = self.skip {
            stages.push(json!({ "$skip": skip }));
        }
        if let Some(limit) = self.limit {
            stages.push(json!({ "$limit": limit }));
        }
        stages
    }

    /// Inspection form
    pub fn to_value(&self) -> Value {
        json!({
            "collection": self.collection,
            "filter": self.filter_document(),
            "sort": self.sort.as_ref().map(SortSpec::to_value),
            "skip": self.skip,
            "limit": self.limit,
        })
    }
}
