//! Field merge engine and the aggregators that drive it.
//!
//! - [`engine`]: pure per-field merge strategies.
//! - [`aggregate`]: collapses one source's per-enrolment records per patient.
//! - [`merge`]: merges N sources' records sharing an entity id.
//! - [`loader`]: YAML merge policy loading.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod group;
pub mod loader;
pub mod merge;

pub use aggregate::{AggregateSummary, RESEARCH_SUBJECT_FIELDS, aggregate_records, research_subject_id};
pub use engine::{
    Contributions, append_field_vals_to_single_list, coalesce_field_values, flatten_values,
    merge_codeable_concept, merge_field, merge_fields_level,
};
pub use error::{MergeError, Result};
pub use group::{EntityGroup, GroupBuilder};
pub use loader::{load_merge_policy, parse_merge_policies};
pub use merge::{
    DEFAULT_PROGRESS_EVERY, MergeOptions, MergeSummary, RekeySummary, SourceStream,
    merge_sources, rekey_records,
};
