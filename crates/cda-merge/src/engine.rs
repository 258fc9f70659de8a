//! Field merge engine.
//!
//! Given the records that several contributors hold for one entity and a
//! [`MergePolicy`], [`merge_fields_level`] produces a single merged record.
//! Contributors are identified by string labels: source identifiers for
//! cross-source merges, research-subject ids for intra-source aggregation.
//!
//! Every function here is pure. A contributor that lacks a field, or holds an
//! absent value for it (see [`is_absent`]), simply contributes nothing.

use std::collections::BTreeMap;

use cda_model::{FieldPolicy, Fields, MergePolicy, MergeType, is_absent};
use serde_json::{Map, Value};

/// Contributor label to that contributor's record for the current entity.
pub type Contributions = BTreeMap<String, Fields>;

fn present<'a>(data: &'a Contributions, label: &str, field: &str) -> Option<&'a Value> {
    data.get(label)
        .and_then(|fields| fields.get(field))
        .filter(|value| !is_absent(value))
}

/// First non-absent value of `field` in hierarchy order.
pub fn coalesce_field_values<'a>(
    data: &'a Contributions,
    field: &str,
    hierarchy: &[String],
) -> Option<&'a Value> {
    hierarchy
        .iter()
        .find_map(|label| present(data, label, field))
}

/// Flattens values into one list: arrays are spliced in (recursively),
/// scalars and objects are appended, absent values are dropped.
pub fn flatten_values<'a, I>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut out = Vec::new();
    for value in values {
        flatten_into(&mut out, value);
    }
    out
}

fn flatten_into(out: &mut Vec<Value>, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(out, item);
            }
        }
        other if is_absent(other) => {}
        other => out.push(other.clone()),
    }
}

/// Every contributor's value of `field`, in hierarchy order, as one flat list.
///
/// Duplicates across contributors are kept verbatim.
pub fn append_field_vals_to_single_list(
    data: &Contributions,
    field: &str,
    hierarchy: &[String],
) -> Vec<Value> {
    flatten_values(
        hierarchy
            .iter()
            .filter_map(|label| present(data, label, field)),
    )
}

fn concept_elements(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(object) => vec![object],
        _ => Vec::new(),
    }
}

/// Merges a codeable-concept field (`[{text, coding}]`).
///
/// `text` is coalesced and `coding` appended across contributors. Returns
/// `None` when no contributor holds the field; otherwise always a
/// one-element list.
pub fn merge_codeable_concept(
    data: &Contributions,
    field: &str,
    hierarchy: &[String],
) -> Option<Value> {
    let elements: Vec<&Map<String, Value>> = hierarchy
        .iter()
        .filter_map(|label| present(data, label, field))
        .flat_map(concept_elements)
        .collect();
    if elements.is_empty() {
        return None;
    }
    let text = elements
        .iter()
        .filter_map(|element| element.get("text"))
        .find(|text| !is_absent(text))
        .cloned()
        .unwrap_or(Value::Null);
    let coding = flatten_values(elements.iter().filter_map(|element| element.get("coding")));

    let mut concept = Map::new();
    concept.insert("text".to_string(), text);
    concept.insert("coding".to_string(), Value::Array(coding));
    Some(Value::Array(vec![Value::Object(concept)]))
}

/// Merges one field according to its policy.
///
/// The field starts at `default_value` and keeps it when no contributor
/// holds a present value, for every merge type: an `append_field_vals`
/// field with nothing to collect is `default_value`, not `[]`.
pub fn merge_field(
    data: &Contributions,
    field: &str,
    policy: &FieldPolicy,
    default_hierarchy: &[String],
) -> Value {
    let hierarchy = policy.effective_hierarchy(default_hierarchy);
    match policy.merge_type {
        MergeType::Coalesce => coalesce_field_values(data, field, hierarchy)
            .cloned()
            .unwrap_or_else(|| policy.default_value.clone()),
        MergeType::AppendFieldVals => {
            let values = append_field_vals_to_single_list(data, field, hierarchy);
            if values.is_empty() {
                policy.default_value.clone()
            } else {
                Value::Array(values)
            }
        }
        MergeType::MergeCodeableConcept => merge_codeable_concept(data, field, hierarchy)
            .unwrap_or_else(|| policy.default_value.clone()),
    }
}

/// Produces one merged record holding exactly the policy's fields.
pub fn merge_fields_level(
    data: &Contributions,
    policy: &MergePolicy,
    default_hierarchy: &[String],
) -> Fields {
    policy
        .fields
        .iter()
        .map(|(field, field_policy)| {
            (
                field.clone(),
                merge_field(data, field, field_policy, default_hierarchy),
            )
        })
        .collect()
}
