pub mod error;
pub mod jsonl;
pub mod layout;
pub mod tsv;

pub use error::{IngestError, Result};
pub use jsonl::{read_jsonl, write_jsonl};
pub use layout::{ROOT_ENV_VAR, WorkspaceLayout};
pub use tsv::{TsvTable, read_tsv, write_tsv};
