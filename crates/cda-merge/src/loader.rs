//! Merge policy loading from YAML.
//!
//! The document has one top-level section per entity type, each mapping
//! target field names to their policy:
//!
//! ```yaml
//! Patient_merge:
//!   sex:
//!     merge_type: coalesce
//!     default_value: null
//!   identifier:
//!     merge_type: append_field_vals
//!     default_value: []
//!     source_hierarchy: [pdc, gdc]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use cda_model::{FieldPolicy, MergePolicy};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MergeError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldPolicy {
    merge_type: String,
    #[serde(default)]
    default_value: Value,
    #[serde(default)]
    source_hierarchy: Option<Vec<String>>,
}

type RawDocument = BTreeMap<String, BTreeMap<String, RawFieldPolicy>>;

fn build_policy(entity: &str, raw: BTreeMap<String, RawFieldPolicy>) -> Result<MergePolicy> {
    let mut policy = MergePolicy::new(entity);
    for (field, raw_field) in raw {
        let merge_type = FieldPolicy::parse_merge_type(&field, &raw_field.merge_type)
            .map_err(|source| MergeError::InvalidPolicy {
                entity: entity.to_string(),
                source,
            })?;
        let field_policy = FieldPolicy {
            merge_type,
            default_value: raw_field.default_value,
            source_hierarchy: raw_field.source_hierarchy.map(|hierarchy| {
                hierarchy
                    .into_iter()
                    .map(|label| label.trim().to_string())
                    .collect()
            }),
        };
        policy.fields.insert(field, field_policy);
    }
    Ok(policy)
}

/// Parses every section of a policy document.
pub fn parse_merge_policies(text: &str, origin: &Path) -> Result<BTreeMap<String, MergePolicy>> {
    let raw: RawDocument = serde_yaml::from_str(text).map_err(|source| MergeError::PolicyYaml {
        path: origin.to_path_buf(),
        source,
    })?;
    raw.into_iter()
        .map(|(entity, fields)| Ok((entity.clone(), build_policy(&entity, fields)?)))
        .collect()
}

/// Loads the policy for one entity section from a YAML file.
pub fn load_merge_policy(path: &Path, entity: &str) -> Result<MergePolicy> {
    let text = fs::read_to_string(path).map_err(|source| MergeError::PolicyIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut policies = parse_merge_policies(&text, path)?;
    policies
        .remove(entity)
        .ok_or_else(|| MergeError::UnknownEntity {
            entity: entity.to_string(),
            available: policies.keys().cloned().collect::<Vec<_>>().join(", "),
        })
}
