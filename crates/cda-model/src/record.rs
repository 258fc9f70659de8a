//! Flat per-source records as produced by extraction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SourceId;

/// Field name to value mapping for one entity.
pub type Fields = Map<String, Value>;

/// One entity's fields, tagged with the data commons that produced it.
///
/// Extraction creates these once; nothing downstream mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source: SourceId,
    pub fields: Fields,
}

impl SourceRecord {
    pub fn new(source: SourceId, fields: Fields) -> Self {
        Self { source, fields }
    }

    /// The entity's own `id` field, when it is a non-empty string.
    pub fn id(&self) -> Option<&str> {
        entity_id(&self.fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Reads the `id` field of a record as a non-empty string.
pub fn entity_id(fields: &Fields) -> Option<&str> {
    fields
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Returns true when a value carries no data for merge purposes.
///
/// `null`, blank strings, empty arrays and empty objects are all treated as
/// "no contribution".
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn absent_values() {
        assert!(is_absent(&Value::Null));
        assert!(is_absent(&json!("")));
        assert!(is_absent(&json!("   ")));
        assert!(is_absent(&json!([])));
        assert!(is_absent(&json!({})));
        assert!(!is_absent(&json!(0)));
        assert!(!is_absent(&json!(false)));
        assert!(!is_absent(&json!("x")));
    }

    #[test]
    fn entity_id_requires_non_empty_string() {
        let mut fields = Fields::new();
        assert_eq!(entity_id(&fields), None);
        fields.insert("id".to_string(), json!(42));
        assert_eq!(entity_id(&fields), None);
        fields.insert("id".to_string(), json!(" TCGA-01 "));
        assert_eq!(entity_id(&fields), Some("TCGA-01"));
    }
}
