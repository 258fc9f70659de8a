use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid source identifier: {0:?}")]
    InvalidSourceId(String),
    #[error("invalid entity alias: {0:?}")]
    InvalidAlias(String),
    #[error("unknown merge_type {value:?} for field {field:?}")]
    UnknownMergeType { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
