//! Cross-source merging of entity-keyed record streams.

use std::collections::{BTreeMap, BTreeSet};

use cda_model::{Fields, MergePolicy, SourceId, entity_id};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::merge_fields_level;
use crate::error::{MergeError, Result};
use crate::group::{EntityGroup, GroupBuilder};

/// Default cadence of progress log lines, in processed keys.
pub const DEFAULT_PROGRESS_EVERY: usize = 5_000;

/// All records one source holds for the entity type being merged.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStream {
    pub source: SourceId,
    pub records: Vec<Fields>,
    /// Id each record carried before [`rekey_records`] replaced it, by
    /// record index. Empty until the stream is re-keyed.
    pub rekeyed_from: Vec<Option<String>>,
}

impl SourceStream {
    pub fn new(source: SourceId, records: Vec<Fields>) -> Self {
        Self {
            source,
            records,
            rekeyed_from: Vec::new(),
        }
    }

    /// The id a record had in its source, before any re-keying.
    fn origin_id(&self, index: usize, current: &str) -> String {
        self.rekeyed_from
            .get(index)
            .and_then(Option::as_deref)
            .unwrap_or(current)
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Default source priority, highest first.
    pub hierarchy: Vec<String>,
    /// Log progress after this many keys; 0 disables progress lines.
    pub progress_every: usize,
}

impl MergeOptions {
    pub fn new<I, S>(hierarchy: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hierarchy: hierarchy.into_iter().map(Into::into).collect(),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    #[must_use]
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub input_records: BTreeMap<String, usize>,
    pub output_records: usize,
    /// Keys observed in two or more sources.
    pub merged_entities: usize,
    /// Keys that several records of one source were re-keyed onto.
    pub collapsed_entities: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RekeySummary {
    pub rekeyed: usize,
    pub unmapped: usize,
}

/// Rewrites each record's `id` through a canonical-id lookup.
///
/// Records without a canonical id keep their own and are counted as
/// unmapped. Replaced ids are kept in [`SourceStream::rekeyed_from`].
pub fn rekey_records<F>(stream: &mut SourceStream, lookup: F) -> RekeySummary
where
    F: Fn(&SourceId, &str) -> Option<String>,
{
    let mut summary = RekeySummary::default();
    stream.rekeyed_from.resize(stream.records.len(), None);
    for (record, previous) in stream.records.iter_mut().zip(&mut stream.rekeyed_from) {
        let Some(current) = entity_id(record).map(str::to_string) else {
            continue;
        };
        match lookup(&stream.source, &current) {
            Some(canonical) => {
                if canonical != current {
                    record.insert("id".to_string(), Value::String(canonical));
                    if previous.is_none() {
                        *previous = Some(current);
                    }
                }
                summary.rekeyed += 1;
            }
            None => summary.unmapped += 1,
        }
    }
    if summary.unmapped > 0 {
        warn!(
            source = %stream.source,
            unmapped = summary.unmapped,
            "WARNING: records without a canonical id keep their source id"
        );
    }
    summary
}

/// The policy with every per-field source hierarchy removed, for merging
/// records that all come from one source.
fn within_source_policy(policy: &MergePolicy) -> MergePolicy {
    let mut policy = policy.clone();
    for field in policy.fields.values_mut() {
        field.source_hierarchy = None;
    }
    policy
}

/// Folds the records one source re-keyed onto the same id into one record.
///
/// Records rank in source order. Policy fields that some record holds are
/// merged; every other field comes from the first record.
fn collapse_within_source(group: EntityGroup, policy: &MergePolicy) -> Fields {
    let mut collapsed = group
        .arrival
        .first()
        .and_then(|first| group.contributions.get(first))
        .cloned()
        .unwrap_or_default();
    let merged = merge_fields_level(&group.contributions, policy, &group.arrival);
    for (field, value) in merged {
        let held = group
            .contributions
            .values()
            .any(|fields| fields.contains_key(&field));
        if held {
            collapsed.insert(field, value);
        }
    }
    collapsed
}

/// Merges N source streams by entity `id`.
///
/// Keys seen in one source pass through unchanged; keys seen in several are
/// merged with the policy. Output follows first-seen key order across the
/// streams in the order given.
///
/// A source may hold several records for one key only when re-keying put
/// them there (see [`SourceStream::rekeyed_from`]). Those are folded into a
/// single record first, in source order. Two records that already shared an
/// id in their source are fatal.
pub fn merge_sources(
    streams: Vec<SourceStream>,
    policy: &MergePolicy,
    options: &MergeOptions,
) -> Result<(Vec<Fields>, MergeSummary)> {
    let mut summary = MergeSummary::default();
    let mut seen_sources = BTreeSet::new();
    let mut builder = GroupBuilder::new();
    let local_policy = within_source_policy(policy);
    for mut stream in streams {
        let label = stream.source.as_str().to_string();
        if !seen_sources.insert(label.clone()) {
            return Err(MergeError::DuplicateSource(label));
        }
        summary
            .input_records
            .insert(label.clone(), stream.records.len());

        let records = std::mem::take(&mut stream.records);
        let mut local = GroupBuilder::new();
        for (index, fields) in records.into_iter().enumerate() {
            let id = entity_id(&fields)
                .ok_or_else(|| MergeError::MissingId {
                    source_label: label.clone(),
                    index,
                })?
                .to_string();
            let origin = stream.origin_id(index, &id);
            local
                .insert(&id, &origin, fields)
                .map_err(|_| MergeError::DuplicateEntity {
                    entity_id: origin.clone(),
                    contributor: label.clone(),
                })?;
        }

        for group in local.finish() {
            if group.contributor_count() == 1 {
                let key = group.key.clone();
                builder.insert(&key, &label, group.resolve(policy, &[]))?;
                continue;
            }
            debug!(
                source = %label,
                entity_id = %group.key,
                records = group.contributor_count(),
                "collapsing re-keyed records"
            );
            summary.collapsed_entities += 1;
            let key = group.key.clone();
            builder.insert(&key, &label, collapse_within_source(group, &local_policy))?;
        }
    }

    let groups = builder.finish();
    let total = groups.len();
    let mut output = Vec::with_capacity(total);
    for (processed, group) in groups.into_iter().enumerate() {
        if group.contributor_count() > 1 {
            summary.merged_entities += 1;
        }
        output.push(group.resolve(policy, &options.hierarchy));
        let processed = processed + 1;
        if options.progress_every > 0 && processed % options.progress_every == 0 {
            info!(processed, total, "merge progress");
        }
    }
    summary.output_records = output.len();
    info!(
        output_records = summary.output_records,
        merged_entities = summary.merged_entities,
        collapsed_entities = summary.collapsed_entities,
        "merge complete"
    );
    Ok((output, summary))
}
