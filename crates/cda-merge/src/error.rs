//! Error types for merge operations.

use std::path::PathBuf;

use cda_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to read merge policy {path}: {source}")]
    PolicyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse merge policy {path}: {source}")]
    PolicyYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("merge policy section {entity:?}: {source}")]
    InvalidPolicy {
        entity: String,
        #[source]
        source: ModelError,
    },

    #[error("merge policy has no section {entity:?} (available: {available})")]
    UnknownEntity { entity: String, available: String },

    #[error("record {index} from {source_label} has no string id")]
    MissingId { source_label: String, index: usize },

    #[error("entity {entity_id} has {count} research subject entries; exactly one is required")]
    ResearchSubjectCount { entity_id: String, count: usize },

    #[error("entity {entity_id} has a research subject without an id")]
    MissingResearchSubjectId { entity_id: String },

    #[error("entity {entity_id} appears twice under {contributor}")]
    DuplicateEntity {
        entity_id: String,
        contributor: String,
    },

    #[error("source {0} is listed more than once")]
    DuplicateSource(String),
}

pub type Result<T> = std::result::Result<T, MergeError>;
