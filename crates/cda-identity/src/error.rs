//! Error types for identity resolution.
//!
//! Every variant here is fatal: a violated identity invariant means the
//! pairwise tables or the closure built on them cannot be trusted.

use std::path::PathBuf;

use cda_ingest::IngestError;
use cda_model::{EntityAlias, ModelError, SourceId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to read identity config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse identity config {path}: {source}")]
    ConfigYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("source {0} is not declared under `sources`")]
    UnknownSource(SourceId),

    #[error("{subject_source} subject {alias} has {field} {first:?} and {second:?}")]
    InconsistentSubject {
        subject_source: SourceId,
        alias: EntityAlias,
        field: &'static str,
        first: String,
        second: String,
    },

    #[error("{subject_source} membership row in {path} names unknown subject {alias}")]
    UnknownMember {
        subject_source: SourceId,
        alias: EntityAlias,
        path: PathBuf,
    },

    #[error("{subject_source} subject {alias} belongs to {count} containers; exactly one is required")]
    ContainerCount {
        subject_source: SourceId,
        alias: EntityAlias,
        count: usize,
    },

    #[error(
        "{subject_source} subjects {first} and {second} share natural key {natural_key:?} in container {container:?}"
    )]
    DuplicateNaturalKey {
        subject_source: SourceId,
        container: String,
        natural_key: String,
        first: EntityAlias,
        second: EntityAlias,
    },

    #[error(
        "{b_source} subject {b_alias} (natural key {natural_key:?}) matches both {first} and {second} in {a_source}"
    )]
    ConflictingMatch {
        a_source: SourceId,
        b_source: SourceId,
        b_alias: EntityAlias,
        natural_key: String,
        first: EntityAlias,
        second: EntityAlias,
    },

    #[error("{a_source} subject {a_alias} is matched by both {first} and {second} in {b_source}")]
    NonInjectiveMatch {
        a_source: SourceId,
        b_source: SourceId,
        a_alias: EntityAlias,
        first: EntityAlias,
        second: EntityAlias,
    },

    #[error("source {0} has already been merged into the closure")]
    SourceAlreadyClosed(SourceId),

    #[error("cannot merge {subject_source} through {prior}: {prior} is not in the closure yet")]
    PriorNotClosed {
        subject_source: SourceId,
        prior: SourceId,
    },

    #[error("matches {a_source} <- {b_source} cannot be used to merge {expected}")]
    RouteMismatch {
        expected: SourceId,
        a_source: SourceId,
        b_source: SourceId,
    },

    #[error("{subject_source} subject {alias} matches {prior} subject {prior_alias}, which has no canonical entity")]
    UnknownPriorAlias {
        subject_source: SourceId,
        alias: EntityAlias,
        prior: SourceId,
        prior_alias: EntityAlias,
    },

    #[error(
        "{subject_source} subject {alias} resolves to {first} via {first_route} but to {second} via {second_route}"
    )]
    ClosureConflict {
        subject_source: SourceId,
        alias: EntityAlias,
        first: EntityAlias,
        first_route: SourceId,
        second: EntityAlias,
        second_route: SourceId,
    },

    #[error(
        "{subject_source} subject id {subject_id:?} appears twice in the closure table (aliases {first} and {second})"
    )]
    DuplicateCanonicalSubject {
        subject_source: SourceId,
        subject_id: String,
        first: EntityAlias,
        second: EntityAlias,
    },

    #[error("closure order is empty")]
    EmptyClosureOrder,
}

pub type Result<T> = std::result::Result<T, IdentityError>;
