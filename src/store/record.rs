//! Result normalization
//!
//! Raw stored documents become `{id, object}` records. The identifier is
//! rendered to its canonical string and never left inside `object`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::storage::{Document, ObjectId};
use crate::ID_FIELD;

/// A normalized stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Canonical string form of the storage identifier
    pub id: String,
    /// Payload without the identifier field
    pub object: Document,
}

impl Record {
    /// Normalize a raw document.
    ///
    /// Fails with `MalformedDocument` when the identifier is missing or null.
    pub fn normalize(mut raw: Document) -> StoreResult<Self> {
        let id = match raw.remove(ID_FIELD) {
            None | Some(Value::Null) => {
                return Err(StoreError::MalformedDocument(format!(
                    "document has no {} field",
                    ID_FIELD
                )))
            }
            Some(value) => Self::stringify_id(&value),
        };

        Ok(Self { id, object: raw })
    }

    /// Normalize every document, failing on the first malformed one
    pub fn normalize_all(raw: Vec<Document>) -> StoreResult<Vec<Self>> {
        raw.into_iter().map(Self::normalize).collect()
    }

    fn stringify_id(value: &Value) -> String {
        if let Ok(oid) = ObjectId::from_value(value) {
            return oid.to_hex();
        }
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
