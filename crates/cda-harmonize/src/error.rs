//! Error types for value harmonization.
//!
//! Curation disagreements between map revisions are not errors; they are
//! logged and counted in the build report. Only broken inputs end up here.

use std::path::PathBuf;

use cda_ingest::IngestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarmonizeError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("failed to read harmonization config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse harmonization config {path}: {source}")]
    ConfigYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read ontology {path}: {source}")]
    OntologyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {detail}")]
    MalformedOntology {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("{concept} value {raw_value:?} maps to {term_id}, which is {status} in {ontology}")]
    UnknownOntologyTerm {
        concept: String,
        raw_value: String,
        term_id: String,
        status: &'static str,
        ontology: PathBuf,
    },

    #[error("column {column:?} of {table} names undeclared concept {concept:?}")]
    UnknownConcept {
        table: PathBuf,
        column: String,
        concept: String,
    },

    #[error("concept {concept:?}: {detail}")]
    InvalidConcept { concept: String, detail: String },
}

pub type Result<T> = std::result::Result<T, HarmonizeError>;
