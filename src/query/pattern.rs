//! Regex markers
//!
//! A filter value of the exact shape `{"$regex": "<pattern>", "$options":
//! "<flags>"}` is a pattern constraint rather than an equality value.

use regex::Regex;
use serde_json::{Map, Value};

const REGEX_KEY: &str = "$regex";
const OPTIONS_KEY: &str = "$options";
const ALLOWED_FLAGS: &str = "imsx";

/// A validated regex marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    options: String,
}

impl Pattern {
    /// Create and validate a pattern
    pub fn new(source: impl Into<String>, options: impl Into<String>) -> Result<Self, String> {
        let pattern = Self {
            source: source.into(),
            options: options.into(),
        };
        pattern.compile()?;
        Ok(pattern)
    }

    /// Build the marker value for use inside a `filter` predicate
    pub fn marker(source: &str, options: &str) -> Value {
        let mut marker = Map::new();
        marker.insert(REGEX_KEY.into(), Value::String(source.into()));
        if !options.is_empty() {
            marker.insert(OPTIONS_KEY.into(), Value::String(options.into()));
        }
        Value::Object(marker)
    }

    /// Recognize a marker value.
    ///
    /// Returns `None` for ordinary values, `Some(Err)` for a marker that is
    /// malformed (non-string pattern, unknown flag, invalid regex).
    pub fn from_marker(value: &Value) -> Option<Result<Self, String>> {
        let obj = value.as_object()?;
        if !obj.contains_key(REGEX_KEY) || !obj.keys().all(|k| k == REGEX_KEY || k == OPTIONS_KEY) {
            return None;
        }

        let source = match obj.get(REGEX_KEY) {
            Some(Value::String(s)) => s.clone(),
            _ => return Some(Err("$regex must be a string".into())),
        };
        let options = match obj.get(OPTIONS_KEY) {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Some(Err("$options must be a string".into())),
        };

        Some(Self::new(source, options))
    }

    /// Pattern source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Flag characters
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Compile with the `regex` crate, flags applied inline
    pub fn compile(&self) -> Result<Regex, String> {
        if let Some(flag) = self.options.chars().find(|c| !ALLOWED_FLAGS.contains(*c)) {
            return Err(format!("unsupported regex flag '{}'", flag));
        }

        let source = if self.options.is_empty() {
            self.source.clone()
        } else {
            format!("(?{}){}", self.options, self.source)
        };
        Regex::new(&source).map_err(|e| format!("invalid regex '{}': {}", self.source, e))
    }

    /// Operator document form
    pub fn to_value(&self) -> Value {
        Self::marker(&self.source, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marker_recognized() {
        let pattern = Pattern::from_marker(&json!({"$regex": "^a", "$options": "i"}))
            .unwrap()
            .unwrap();
        assert_eq!(pattern.source(), "^a");
        assert_eq!(pattern.options(), "i");
        assert!(pattern.compile().unwrap().is_match("Abc"));
    }

    #[test]
    fn test_plain_values_are_not_markers() {
        assert!(Pattern::from_marker(&json!("^a")).is_none());
        assert!(Pattern::from_marker(&json!({"name": "a"})).is_none());
        assert!(Pattern::from_marker(&json!({"$regex": "a", "$gt": 1})).is_none());
    }

    #[test]
    fn test_malformed_markers() {
        assert!(Pattern::from_marker(&json!({"$regex": 5})).unwrap().is_err());
        assert!(Pattern::from_marker(&json!({"$regex": "a", "$options": "g"}))
            .unwrap()
            .is_err());
        assert!(Pattern::from_marker(&json!({"$regex": "(unclosed"})).unwrap().is_err());
    }

    #[test]
    fn test_marker_round_trip() {
        let marker = Pattern::marker("x$", "");
        assert_eq!(marker, json!({"$regex": "x$"}));
        assert_eq!(
            Pattern::from_marker(&marker).unwrap().unwrap().to_value(),
            marker
        );
    }
}
