//! Per-field merge policies.
//!
//! A [`MergePolicy`] tells the merge engine, for every output field, which
//! strategy combines the contributing sources' values, what the field holds
//! when nobody contributes, and (optionally) a field-specific source priority.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ModelError;

/// The closed set of field merge strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeType {
    /// First non-absent value in hierarchy order wins.
    Coalesce,
    /// Every contributor's value, flattened into one list in hierarchy order.
    AppendFieldVals,
    /// `text` coalesced, `coding` appended, wrapped as a one-element list.
    MergeCodeableConcept,
}

impl MergeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeType::Coalesce => "coalesce",
            MergeType::AppendFieldVals => "append_field_vals",
            MergeType::MergeCodeableConcept => "merge_codeable_concept",
        }
    }
}

impl fmt::Display for MergeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "coalesce" => Ok(MergeType::Coalesce),
            "append_field_vals" => Ok(MergeType::AppendFieldVals),
            "merge_codeable_concept" => Ok(MergeType::MergeCodeableConcept),
            other => Err(format!("Unknown merge type: {other}")),
        }
    }
}

/// How a single output field is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPolicy {
    pub merge_type: MergeType,
    /// Value the field holds when no contributor supplies one.
    #[serde(default)]
    pub default_value: Value,
    /// Field-specific contributor priority, highest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hierarchy: Option<Vec<String>>,
}

impl FieldPolicy {
    pub fn new(merge_type: MergeType, default_value: Value) -> Self {
        Self {
            merge_type,
            default_value,
            source_hierarchy: None,
        }
    }

    pub fn with_hierarchy<I, S>(mut self, hierarchy: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_hierarchy = Some(hierarchy.into_iter().map(Into::into).collect());
        self
    }

    /// Parses a free-text merge type, naming the field on failure.
    pub fn parse_merge_type(field: &str, raw: &str) -> Result<MergeType, ModelError> {
        raw.parse().map_err(|_| ModelError::UnknownMergeType {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }

    /// The hierarchy this field uses: its own override, else the default.
    pub fn effective_hierarchy<'a>(&'a self, default: &'a [String]) -> &'a [String] {
        self.source_hierarchy.as_deref().unwrap_or(default)
    }
}

/// Merge policy for one entity type (e.g. `Patient_merge`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergePolicy {
    pub entity: String,
    pub fields: BTreeMap<String, FieldPolicy>,
}

impl MergePolicy {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, policy: FieldPolicy) -> Self {
        self.fields.insert(name.into(), policy);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldPolicy> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
