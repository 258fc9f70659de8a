//! Intra-source aggregation.
//!
//! One source may emit the same patient several times, once per research
//! subject (project enrolment). Records sharing an `id` are merged with the
//! research-subject ids as contributor labels, in first-seen order.

use cda_model::{Fields, MergePolicy, entity_id};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{MergeError, Result};
use crate::group::GroupBuilder;

/// Accepted spellings of the nested research-subject list.
pub const RESEARCH_SUBJECT_FIELDS: &[&str] = &["Research_Subject", "ResearchSubject"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub input_records: usize,
    pub output_records: usize,
    /// Entities built from two or more records.
    pub merged_entities: usize,
}

/// Id of the single research subject nested in a record.
///
/// Zero or several entries violate the one-record-per-enrolment precondition.
pub fn research_subject_id<'a>(entity_id: &str, fields: &'a Fields) -> Result<&'a str> {
    let entries = RESEARCH_SUBJECT_FIELDS
        .iter()
        .find_map(|name| fields.get(*name))
        .and_then(Value::as_array);
    let count = entries.map_or(0, Vec::len);
    let entries = match entries {
        Some(entries) if count == 1 => entries,
        _ => {
            return Err(MergeError::ResearchSubjectCount {
                entity_id: entity_id.to_string(),
                count,
            });
        }
    };
    entries[0]
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MergeError::MissingResearchSubjectId {
            entity_id: entity_id.to_string(),
        })
}

/// Groups records by entity `id` and merges every group of two or more.
pub fn aggregate_records(
    records: Vec<Fields>,
    policy: &MergePolicy,
) -> Result<(Vec<Fields>, AggregateSummary)> {
    let mut summary = AggregateSummary {
        input_records: records.len(),
        ..AggregateSummary::default()
    };
    let mut builder = GroupBuilder::new();
    for (index, fields) in records.into_iter().enumerate() {
        let id = entity_id(&fields)
            .ok_or_else(|| MergeError::MissingId {
                source_label: "input".to_string(),
                index,
            })?
            .to_string();
        let subject = research_subject_id(&id, &fields)?.to_string();
        builder.insert(&id, &subject, fields)?;
    }

    let groups = builder.finish();
    let mut output = Vec::with_capacity(groups.len());
    for group in groups {
        if group.contributor_count() > 1 {
            summary.merged_entities += 1;
            debug!(
                entity_id = %group.key,
                research_subjects = group.contributor_count(),
                "aggregating entity"
            );
        }
        let hierarchy = group.arrival.clone();
        output.push(group.resolve(policy, &hierarchy));
    }
    summary.output_records = output.len();
    info!(
        input_records = summary.input_records,
        output_records = summary.output_records,
        merged_entities = summary.merged_entities,
        "aggregation complete"
    );
    Ok((output, summary))
}
