//! Filter document evaluation
//!
//! Evaluates the filter language the compiler emits against stored
//! documents. No type coercion: `"123"` never equals `123`.
//!
//! # Semantics
//!
//! - A plain value is equality; an array field matches when any element
//!   is equal
//! - Missing fields equal `null`, fail range checks, satisfy `$ne`/`$nin`
//! - Range operators only compare values of the same type
//! - Dotted keys descend into nested documents

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};

use super::object_id::OID_KEY;
use crate::errors::{StoreError, StoreResult};

/// Document payload
pub type Document = Map<String, Value>;

const FIELD_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$regex", "$options",
    "$elemMatch", "$exists",
];

/// Evaluates filter documents against documents.
///
/// Compiled `$regex` patterns are cached per matcher, so one matcher should
/// be reused across the documents of a single query.
#[derive(Debug, Default)]
pub struct FilterMatcher {
    patterns: RefCell<HashMap<(String, String), Regex>>,
}

impl FilterMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-off check with a fresh matcher
    pub fn matches(document: &Document, filter: &Document) -> StoreResult<bool> {
        Self::new().is_match(document, filter)
    }

    /// Checks if a document matches every clause of a filter (AND semantics)
    pub fn is_match(&self, document: &Document, filter: &Document) -> StoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for sub in Self::sub_filters(key, condition)? {
                        if !self.is_match(document, sub)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => {
                    let mut any = false;
                    for sub in Self::sub_filters(key, condition)? {
                        if self.is_match(document, sub)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                op if op.starts_with('$') => {
                    return Err(StoreError::storage(format!(
                        "unknown top level operator: {}",
                        op
                    )));
                }
                path => self.matches_field(lookup(document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn sub_filters<'a>(op: &str, condition: &'a Value) -> StoreResult<Vec<&'a Document>> {
        let items = condition
            .as_array()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| StoreError::storage(format!("{} requires a non-empty array", op)))?;

        items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    StoreError::storage(format!("{} entries must be documents", op))
                })
            })
            .collect()
    }

    /// Evaluates one field condition: literal equality or an operator document
    fn matches_field(&self, actual: Option<&Value>, condition: &Value) -> StoreResult<bool> {
        match operator_document(condition)? {
            Some(ops) => self.matches_operators(actual, ops),
            None => Ok(equals(actual, condition)),
        }
    }

    fn matches_operators(&self, actual: Option<&Value>, ops: &Document) -> StoreResult<bool> {
        for (op, operand) in ops {
            let matched = match op.as_str() {
                "$eq" => equals(actual, operand),
                "$ne" => !equals(actual, operand),
                "$gt" => range(actual, operand, |o| o == Ordering::Greater),
                "$gte" => range(actual, operand, |o| o != Ordering::Less),
                "$lt" => range(actual, operand, |o| o == Ordering::Less),
                "$lte" => range(actual, operand, |o| o != Ordering::Greater),
                "$in" => Self::set_operand(op, operand)?
                    .iter()
                    .any(|candidate| equals(actual, candidate)),
                "$nin" => !Self::set_operand(op, operand)?
                    .iter()
                    .any(|candidate| equals(actual, candidate)),
                "$regex" => {
                    let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                    self.matches_pattern(actual, operand, options)?
                }
                // Consumed together with $regex
                "$options" => true,
                "$elemMatch" => self.matches_elem(actual, operand)?,
                "$exists" => actual.is_some() == operand.as_bool().unwrap_or(true),
                other => {
                    return Err(StoreError::storage(format!("unknown operator: {}", other)));
                }
            };

            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_pattern(
        &self,
        actual: Option<&Value>,
        pattern: &Value,
        options: &str,
    ) -> StoreResult<bool> {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| StoreError::storage("$regex needs a string pattern"))?;

        let key = (pattern.to_string(), options.to_string());
        let mut patterns = self.patterns.borrow_mut();
        let regex = match patterns.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(build_regex(pattern, options)?),
        };

        Ok(any_element(actual, |v| v.as_str().is_some_and(|s| regex.is_match(s))))
    }

    fn set_operand<'a>(op: &str, operand: &'a Value) -> StoreResult<&'a Vec<Value>> {
        operand
            .as_array()
            .ok_or_else(|| StoreError::storage(format!("{} needs an array", op)))
    }

    /// `$elemMatch`: some array element satisfies the operand.
    ///
    /// An operator document applies to the element itself, a plain document
    /// is a filter over object elements.
    fn matches_elem(&self, actual: Option<&Value>, operand: &Value) -> StoreResult<bool> {
        let Some(Value::Array(elements)) = actual else {
            return Ok(false);
        };
        let sub = operand
            .as_object()
            .ok_or_else(|| StoreError::storage("$elemMatch needs a document"))?;

        if let Some(ops) = operator_document(operand)? {
            for element in elements {
                if self.matches_operators(Some(element), ops)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        for element in elements {
            if let Value::Object(element) = element {
                if self.is_match(element, sub)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Resolves a possibly dotted path inside a document
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Returns the operator map if `value` is an operator document.
///
/// `{"$oid": ..}` is an identifier literal, not an operator document.
fn operator_document(value: &Value) -> StoreResult<Option<&Document>> {
    let Value::Object(obj) = value else {
        return Ok(None);
    };
    if obj.is_empty() || obj.contains_key(OID_KEY) || !obj.keys().all(|k| k.starts_with('$')) {
        return Ok(None);
    }
    if let Some(unknown) = obj.keys().find(|k| !FIELD_OPERATORS.contains(&k.as_str())) {
        return Err(StoreError::storage(format!("unknown operator: {}", unknown)));
    }
    Ok(Some(obj))
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value) if value == expected => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(_) => false,
    }
}

fn range(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    any_element(actual, |v| compare_values(v, bound).is_some_and(&accept))
}

/// Applies `check` to a scalar field or to each element of an array field
fn any_element(actual: Option<&Value>, check: impl Fn(&Value) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) => items.iter().any(&check),
        Some(value) => check(value),
    }
}

fn build_regex(pattern: &str, options: &str) -> StoreResult<Regex> {
    let source = if options.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", options, pattern)
    };
    Regex::new(&source).map_err(|e| StoreError::storage(format!("invalid $regex: {}", e)))
}

/// Compares two values of the same type. Different types are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Object(a), Value::Object(b)) => match (a.get(OID_KEY), b.get(OID_KEY)) {
            (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
            _ => None,
        },
        _ => None,
    }
}

/// Total order used for sorting.
///
/// - missing/null < bool < number < string < array < object
/// - For same types, natural ordering
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let type_order = |v: Option<&Value>| -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    };

    let (a_type, b_type) = (type_order(a), type_order(b));
    if a_type != b_type {
        return a_type.cmp(&b_type);
    }

    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}
