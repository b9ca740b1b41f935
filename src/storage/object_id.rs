//! Native document identifier
//!
//! Wraps `bson::oid::ObjectId`. Canonical string form is 24 lowercase hex
//! chars; inside documents the id is stored in extended-JSON form
//! `{"$oid": "<hex>"}`.

use std::fmt;
use std::str::FromStr;

use bson::{oid, Bson};
use serde_json::Value;

use crate::errors::{StoreError, StoreResult};

/// Key under which the extended-JSON form carries the hex string
pub const OID_KEY: &str = "$oid";

/// Storage-native identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(oid::ObjectId);

impl ObjectId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(oid::ObjectId::new())
    }

    /// Parse the canonical 24-hex-char string form (either case)
    pub fn parse_str(s: &str) -> StoreResult<Self> {
        oid::ObjectId::parse_str(s)
            .map(Self)
            .map_err(|e| StoreError::InvalidIdentifier(format!("'{}': {}", s, e)))
    }

    /// Parse a stored identifier value: a hex string or `{"$oid": hex}`
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        match value {
            Value::String(s) => Self::parse_str(s),
            Value::Object(obj) if obj.len() == 1 && obj.contains_key(OID_KEY) => {
                match Bson::try_from(value.clone()) {
                    Ok(Bson::ObjectId(oid)) => Ok(Self(oid)),
                    _ => Err(StoreError::InvalidIdentifier(value.to_string())),
                }
            }
            other => Err(StoreError::InvalidIdentifier(other.to_string())),
        }
    }

    /// Extended-JSON form stored under `_id`
    pub fn to_value(&self) -> Value {
        Bson::ObjectId(self.0).into_relaxed_extjson()
    }

    /// Canonical string form
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<oid::ObjectId> for ObjectId {
    fn from(oid: oid::ObjectId) -> Self {
        Self(oid)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hex_is_canonical() {
        let id = ObjectId::new();
        let hex = id.to_hex();

        assert_eq!(hex.len(), 24);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(ObjectId::parse_str(&hex).unwrap(), id);
    }

    #[test]
    fn test_parse_accepts_uppercase() {
        let id = ObjectId::parse_str("5F2B6C1D9E8A7B6C5D4E3F2A").unwrap();
        assert_eq!(id.to_hex(), "5f2b6c1d9e8a7b6c5d4e3f2a");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(ObjectId::new()));
        }
    }

    #[test]
    fn test_invalid_strings_rejected() {
        for bad in [
            "",
            "abc",
            "zzzzzzzzzzzzzzzzzzzzzzzz",
            "5f2b6c1d9e8a7b6c5d4e3f2a00",
            "+f2b6c1d9e8a7b6c5d4e3f2a",
            "-f2b6c1d9e8a7b6c5d4e3f2a",
            "5f2b6c1d9e8a7b6c5d4e3f+a",
            " 5f2b6c1d9e8a7b6c5d4e3f2",
        ] {
            let err = ObjectId::parse_str(bad).unwrap_err();
            assert!(matches!(err, StoreError::InvalidIdentifier(_)), "{}", bad);
        }
    }

    #[test]
    fn test_string_form_is_lossless() {
        let hex = "0f2b6c1d9e8a7b6c5d4e3f2a";
        assert_eq!(ObjectId::parse_str(hex).unwrap().to_hex(), hex);
    }

    #[test]
    fn test_value_forms() {
        let id = ObjectId::new();

        assert_eq!(id.to_value(), json!({"$oid": id.to_hex()}));
        assert_eq!(ObjectId::from_value(&id.to_value()).unwrap(), id);
        assert_eq!(ObjectId::from_value(&json!(id.to_hex())).unwrap(), id);
        assert!(ObjectId::from_value(&json!(42)).is_err());
        assert!(ObjectId::from_value(&json!({"$oid": 42})).is_err());
        assert!(ObjectId::from_value(&json!({"$oid": "+f2b6c1d9e8a7b6c5d4e3f2a"})).is_err());
    }
}
