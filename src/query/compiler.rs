//! Predicate compiler
//!
//! Folds an ordered predicate sequence into one `Cursor`. The only state
//! carried between predicates is the pending-negation buffer; it is
//! threaded through `step` by value, so compilation is a pure function of
//! its input and compiling twice yields equal cursors.
//!
//! # Rules
//!
//! - `filter`: one combined equality over plain fields, one pattern
//!   constraint per regex-valued field
//! - `elem`: document payload is an element filter, anything else is
//!   element equality
//! - `ne`: when the next predicate is `ne` on the same key the value is
//!   buffered; a run of N such predicates emits one `$nin` listing all N
//!   values in encounter order. A lone `ne` emits `$ne`.
//! - `nin`/`in`/`whereOr`/`whereAnd`/ranges: one constraint each
//! - `limit`/`skip`/`sort`: the last occurrence wins
//!
//! Only directly adjacent `ne` predicates coalesce. A run interrupted by
//! any other predicate starts over.

use serde_json::{json, Value};

use super::cursor::{Constraint, Cursor, RangeOp};
use super::pattern::Pattern;
use super::predicate::Predicate;
use crate::errors::{StoreError, StoreResult};
use crate::storage::{Document, SortSpec};

/// Values of a run of same-key `ne` predicates not yet emitted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingNegation {
    key: Option<String>,
    values: Vec<Value>,
}

impl PendingNegation {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// What one predicate does to the cursor
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Constrain(Constraint),
    Sort(SortSpec),
    Skip(u64),
    Limit(u64),
}

/// Compiles predicate sequences into cursors
pub struct Compiler;

impl Compiler {
    /// Compile `predicates` into a cursor over `collection`.
    ///
    /// Malformed predicates fail here, before any storage access.
    pub fn compile(collection: &str, predicates: &[Predicate]) -> StoreResult<Cursor> {
        let mut cursor = Cursor::new(collection);
        let mut pending = PendingNegation::default();

        for (index, predicate) in predicates.iter().enumerate() {
            let (next_pending, effects) = Self::step(pending, predicate, predicates.get(index + 1))
                .map_err(|reason| StoreError::malformed_predicate(index, reason))?;
            pending = next_pending;

            for effect in effects {
                match effect {
                    Effect::Constrain(constraint) => cursor.push(constraint),
                    Effect::Sort(sort) => cursor.set_sort(sort),
                    Effect::Skip(skip) => cursor.set_skip(skip),
                    Effect::Limit(limit) => cursor.set_limit(limit),
                }
            }
        }

        Ok(cursor)
    }

    /// One fold step: `(pending, predicate, lookahead) -> (pending', effects)`
    pub fn step(
        pending: PendingNegation,
        predicate: &Predicate,
        lookahead: Option<&Predicate>,
    ) -> Result<(PendingNegation, Vec<Effect>), String> {
        predicate.validate()?;

        let effects = match predicate {
            Predicate::Filter { filter } => Self::split_filter(filter)?,

            Predicate::Elem { arr_key, filter } => {
                let filter = match filter {
                    Value::Object(_) => filter.clone(),
                    scalar => json!({ "$eq": scalar }),
                };
                vec![Effect::Constrain(Constraint::ElemMatch {
                    field: arr_key.clone(),
                    filter,
                })]
            }

            Predicate::Ne { key, val } => return Ok(Self::negate(pending, key, val, lookahead)),

            Predicate::Nin { key, vals } => vec![Effect::Constrain(Constraint::NotIn {
                field: key.clone(),
                values: vals.clone(),
            })],

            Predicate::In { key, vals } => vec![Effect::Constrain(Constraint::In {
                field: key.clone(),
                values: vals.clone(),
            })],

            Predicate::WhereOr { matches } => {
                vec![Effect::Constrain(Constraint::Or(matches.clone()))]
            }

            Predicate::WhereAnd { matches } => {
                vec![Effect::Constrain(Constraint::And(matches.clone()))]
            }

            Predicate::Limit { amount } => vec![Effect::Limit(*amount)],
            Predicate::Skip { amount } => vec![Effect::Skip(*amount)],

            Predicate::Sort { key, desc } => {
                let sort = if *desc {
                    SortSpec::desc(key.clone())
                } else {
                    SortSpec::asc(key.clone())
                };
                vec![Effect::Sort(sort)]
            }

            Predicate::Gt { key, min } => vec![Self::range(key, RangeOp::Gt, min)],
            Predicate::Gte { key, min } => vec![Self::range(key, RangeOp::Gte, min)],
            Predicate::Lt { key, max } => vec![Self::range(key, RangeOp::Lt, max)],
            Predicate::Lte { key, max } => vec![Self::range(key, RangeOp::Lte, max)],
        };

        Ok((pending, effects))
    }

    fn negate(
        mut pending: PendingNegation,
        key: &str,
        val: &Value,
        lookahead: Option<&Predicate>,
    ) -> (PendingNegation, Vec<Effect>) {
        let continues = matches!(lookahead, Some(Predicate::Ne { key: next, .. }) if next == key);

        if continues {
            pending.key = Some(key.to_string());
            pending.values.push(val.clone());
            return (pending, Vec::new());
        }

        if pending.is_empty() {
            let constraint = Constraint::NotEqual {
                field: key.to_string(),
                value: val.clone(),
            };
            return (pending, vec![Effect::Constrain(constraint)]);
        }

        let mut values = pending.values;
        values.push(val.clone());
        let constraint = Constraint::NotIn {
            field: key.to_string(),
            values,
        };
        (PendingNegation::default(), vec![Effect::Constrain(constraint)])
    }

    /// Plain fields become one equality constraint; regex markers become
    /// one pattern constraint each
    fn split_filter(filter: &Document) -> Result<Vec<Effect>, String> {
        let mut equals = Document::new();
        let mut patterns = Vec::new();

        for (field, value) in filter {
            match Pattern::from_marker(value) {
                Some(pattern) => patterns.push(Constraint::Regex {
                    field: field.clone(),
                    pattern: pattern?,
                }),
                None => {
                    equals.insert(field.clone(), value.clone());
                }
            }
        }

        let mut effects = Vec::with_capacity(patterns.len() + 1);
        if !equals.is_empty() {
            effects.push(Effect::Constrain(Constraint::Equals(equals)));
        }
        effects.extend(patterns.into_iter().map(Effect::Constrain));
        Ok(effects)
    }

    fn range(key: &str, op: RangeOp, bound: &Value) -> Effect {
        Effect::Constrain(Constraint::Range {
            field: key.to_string(),
            op,
            bound: bound.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    fn compile(predicates: &[Predicate]) -> Cursor {
        Compiler::compile("users", predicates).unwrap()
    }

    #[test]
    fn test_filter_splits_regex_fields() {
        let cursor = compile(&[Predicate::filter(doc(json!({
            "email": Pattern::marker("@x\\.com$", "i"),
            "role": "admin",
            "active": true
        })))]);

        assert_eq!(
            cursor.constraints(),
            &[
                Constraint::Equals(doc(json!({"role": "admin", "active": true}))),
                Constraint::Regex {
                    field: "email".into(),
                    pattern: Pattern::new("@x\\.com$", "i").unwrap(),
                },
            ]
        );
    }

    #[test]
    fn test_regex_only_filter_emits_no_equality() {
        let cursor = compile(&[Predicate::filter(doc(json!({
            "name": Pattern::marker("^A", "")
        })))]);

        assert_eq!(cursor.constraints().len(), 1);
        assert!(matches!(cursor.constraints()[0], Constraint::Regex { .. }));
    }

    #[test]
    fn test_elem_scalar_and_document() {
        let cursor = compile(&[
            Predicate::elem("tags", json!("red")),
            Predicate::elem("items", json!({"sku": "a"})),
        ]);

        assert_eq!(
            Value::Object(cursor.constraints()[0].to_filter()),
            json!({"tags": {"$elemMatch": {"$eq": "red"}}})
        );
        assert_eq!(
            Value::Object(cursor.constraints()[1].to_filter()),
            json!({"items": {"$elemMatch": {"sku": "a"}}})
        );
    }

    #[test]
    fn test_elem_array_and_null_payloads_are_equality() {
        let cursor = compile(&[
            Predicate::elem("grid", json!([1, 2])),
            Predicate::elem("slots", Value::Null),
        ]);

        let grid = cursor.constraints()[0].to_filter();
        let slots = cursor.constraints()[1].to_filter();
        assert_eq!(
            Value::Object(grid.clone()),
            json!({"grid": {"$elemMatch": {"$eq": [1, 2]}}})
        );
        assert_eq!(
            Value::Object(slots.clone()),
            json!({"slots": {"$elemMatch": {"$eq": null}}})
        );

        // Only a whole nested array element matches, never its members.
        let nested = doc(json!({"grid": [[1, 2], [3]], "slots": [null, 4]}));
        let flat = doc(json!({"grid": [1, 2], "slots": [4]}));
        assert!(crate::storage::FilterMatcher::matches(&nested, &grid).unwrap());
        assert!(!crate::storage::FilterMatcher::matches(&flat, &grid).unwrap());
        assert!(crate::storage::FilterMatcher::matches(&nested, &slots).unwrap());
        assert!(!crate::storage::FilterMatcher::matches(&flat, &slots).unwrap());
    }

    #[test]
    fn test_single_ne_emits_not_equal() {
        let cursor = compile(&[Predicate::ne("status", json!("banned"))]);

        assert_eq!(
            cursor.constraints(),
            &[Constraint::NotEqual {
                field: "status".into(),
                value: json!("banned"),
            }]
        );
    }

    #[test]
    fn test_adjacent_ne_coalesce_in_order() {
        let cursor = compile(&[
            Predicate::ne("status", json!("c")),
            Predicate::ne("status", json!("a")),
            Predicate::ne("status", json!("b")),
        ]);

        assert_eq!(
            cursor.constraints(),
            &[Constraint::NotIn {
                field: "status".into(),
                values: vec![json!("c"), json!("a"), json!("b")],
            }]
        );
    }

    #[test]
    fn test_ne_on_different_keys_do_not_coalesce() {
        let cursor = compile(&[
            Predicate::ne("a", json!(1)),
            Predicate::ne("b", json!(2)),
            Predicate::ne("b", json!(3)),
        ]);

        assert_eq!(
            cursor.constraints(),
            &[
                Constraint::NotEqual {
                    field: "a".into(),
                    value: json!(1),
                },
                Constraint::NotIn {
                    field: "b".into(),
                    values: vec![json!(2), json!(3)],
                },
            ]
        );
    }

    #[test]
    fn test_interrupted_ne_run_starts_over() {
        let cursor = compile(&[
            Predicate::ne("a", json!(1)),
            Predicate::limit(3),
            Predicate::ne("a", json!(2)),
        ]);

        assert_eq!(cursor.constraints().len(), 2);
        assert!(cursor
            .constraints()
            .iter()
            .all(|c| matches!(c, Constraint::NotEqual { .. })));
    }

    #[test]
    fn test_step_buffers_then_flushes() {
        let first = Predicate::ne("a", json!(1));
        let second = Predicate::ne("a", json!(2));

        let (pending, effects) =
            Compiler::step(PendingNegation::default(), &first, Some(&second)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(pending.key(), Some("a"));
        assert_eq!(pending.values(), &[json!(1)]);

        let (pending, effects) = Compiler::step(pending, &second, None).unwrap();
        assert!(pending.is_empty());
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_pagination_and_sort_overwrite() {
        let cursor = compile(&[
            Predicate::limit(10),
            Predicate::skip(5),
            Predicate::sort("name", false),
            Predicate::limit(2),
            Predicate::skip(1),
            Predicate::sort("age", true),
        ]);

        assert_eq!(cursor.limit(), Some(2));
        assert_eq!(cursor.skip(), Some(1));
        assert_eq!(cursor.sort(), Some(&SortSpec::desc("age")));
        assert!(cursor.constraints().is_empty());
    }

    #[test]
    fn test_ranges_and_sets() {
        let cursor = compile(&[
            Predicate::gte("age", json!(18)),
            Predicate::lt("age", json!(65)),
            Predicate::in_list("role", vec![json!("a"), json!("b")]),
            Predicate::nin("tier", vec![json!(0)]),
        ]);

        assert_eq!(
            Value::Object(cursor.filter_document()),
            json!({"$and": [
                {"age": {"$gte": 18}},
                {"age": {"$lt": 65}},
                {"role": {"$in": ["a", "b"]}},
                {"tier": {"$nin": [0]}}
            ]})
        );
    }

    #[test]
    fn test_boolean_combinators() {
        let cursor = compile(&[
            Predicate::where_or(vec![doc(json!({"a": 1})), doc(json!({"b": 2}))]),
            Predicate::where_and(vec![doc(json!({"c": 3}))]),
        ]);

        assert_eq!(
            cursor.constraints(),
            &[
                Constraint::Or(vec![doc(json!({"a": 1})), doc(json!({"b": 2}))]),
                Constraint::And(vec![doc(json!({"c": 3}))]),
            ]
        );
    }

    #[test]
    fn test_malformed_predicate_reports_position() {
        let err = Compiler::compile(
            "users",
            &[Predicate::limit(1), Predicate::where_or(Vec::new())],
        )
        .unwrap_err();

        assert_eq!(
            err,
            StoreError::malformed_predicate(1, "whereOr requires at least one match")
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let predicates = vec![
            Predicate::filter(doc(json!({"a": 1, "name": Pattern::marker("x", "")}))),
            Predicate::ne("s", json!(1)),
            Predicate::ne("s", json!(2)),
            Predicate::sort("a", false),
        ];

        assert_eq!(compile(&predicates), compile(&predicates));
    }
}
