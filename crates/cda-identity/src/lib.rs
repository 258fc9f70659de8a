//! Cross-source identity resolution.
//!
//! One generic matcher replaces a family of per-source-pair scripts: it is
//! parameterized by subject tables (alias, id, natural key, containers) and a
//! hand-curated container equivalence map. The closure builder then chains
//! pairwise results into one canonical entity per connected component.

pub mod closure;
pub mod config;
pub mod equivalence;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod subjects;

pub use closure::{
    CLOSURE_HEADERS, CanonicalTable, ClosureBuilder, SourceClosureSummary, read_canonical_table,
};
pub use config::{ClosureConfig, IdentityConfig, MatchConfig, SubjectSourceConfig};
pub use equivalence::{ContainerEquivalence, load_equivalence};
pub use error::{IdentityError, Result};
pub use matcher::{PairwiseMatches, match_subjects};
pub use pipeline::{ClosureStage, MatchStage, load_subject_tables, run_closure, run_matches};
pub use subjects::{Subject, SubjectColumns, SubjectTable, SubjectTableBuilder, load_subject_table};
