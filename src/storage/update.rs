//! Partial update instructions
//!
//! Reconciles a full candidate object with the set of keys the caller
//! touched. Touched keys with a non-null value are set, touched keys that
//! are absent or null are unset, everything else is left alone.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

use super::matcher::Document;
use crate::ID_FIELD;

/// Set/unset instructions for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDescriptor {
    /// Top-level keys to overwrite
    pub set: Document,
    /// Top-level keys to remove, in sorted order
    pub unset: Vec<String>,
}

impl UpdateDescriptor {
    /// Build instructions from a candidate object and the touched keys.
    ///
    /// Dotted keys touch their top-level field: `"profile.name"` touches
    /// `profile`. The identifier is never touched.
    pub fn from_touched<I, S>(candidate: &Document, touched: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let top_level: BTreeSet<String> = touched
            .into_iter()
            .filter_map(|key| key.as_ref().split('.').next().map(str::to_string))
            .filter(|key| !key.is_empty() && key != ID_FIELD)
            .collect();

        let mut descriptor = Self::default();
        for key in top_level {
            match candidate.get(&key) {
                Some(value) if !value.is_null() => {
                    descriptor.set.insert(key, value.clone());
                }
                _ => descriptor.unset.push(key),
            }
        }
        descriptor
    }

    /// True when the update would not modify anything
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Apply to a stored document in place
    pub fn apply(&self, document: &mut Document) {
        for (key, value) in &self.set {
            document.insert(key.clone(), value.clone());
        }
        for key in &self.unset {
            document.remove(key);
        }
    }

    /// Engine update document: `{"$set": {..}, "$unset": {..}}`
    pub fn to_value(&self) -> Value {
        let mut update = Map::new();
        if !self.set.is_empty() {
            update.insert("$set".into(), Value::Object(self.set.clone()));
        }
        if !self.unset.is_empty() {
            let unset: Map<String, Value> =
                self.unset.iter().map(|k| (k.clone(), json!(""))).collect();
            update.insert("$unset".into(), Value::Object(unset));
        }
        Value::Object(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_null_and_absent_keys_unset() {
        let candidate = doc(json!({"a": 1, "b": null}));
        let update = UpdateDescriptor::from_touched(&candidate, ["a", "b", "c"]);

        assert_eq!(update.set, doc(json!({"a": 1})));
        assert_eq!(update.unset, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_untouched_keys_ignored() {
        let candidate = doc(json!({"a": 1, "b": 2}));
        let update = UpdateDescriptor::from_touched(&candidate, ["a"]);

        assert_eq!(update.set, doc(json!({"a": 1})));
        assert!(update.unset.is_empty());
    }

    #[test]
    fn test_dotted_keys_touch_top_level() {
        let candidate = doc(json!({"profile": {"name": "Ann", "age": 3}}));
        let update = UpdateDescriptor::from_touched(&candidate, ["profile.name", "profile.age"]);

        assert_eq!(update.set.len(), 1);
        assert_eq!(update.set["profile"], json!({"name": "Ann", "age": 3}));
    }

    #[test]
    fn test_apply() {
        let mut stored = doc(json!({"a": 0, "b": 2, "c": 3}));
        let candidate = doc(json!({"a": 1, "b": null}));

        UpdateDescriptor::from_touched(&candidate, ["a", "b"]).apply(&mut stored);

        assert_eq!(stored, doc(json!({"a": 1, "c": 3})));
    }

    #[test]
    fn test_engine_document() {
        let candidate = doc(json!({"a": 1}));
        let update = UpdateDescriptor::from_touched(&candidate, ["a", "gone"]);

        assert_eq!(
            update.to_value(),
            json!({"$set": {"a": 1}, "$unset": {"gone": ""}})
        );
        assert!(UpdateDescriptor::from_touched(&candidate, Vec::<String>::new()).is_empty());
    }
}
