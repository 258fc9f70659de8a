//! Value harmonization for the CDA ETL.
//!
//! Raw values observed in the per-source tables are normalized, filtered
//! through null-like deletion patterns and mapped per concept to curated
//! targets carried over from earlier map revisions. New values get the
//! [`UNASSIGNED`] placeholder and wait for a curator; nothing is inferred.

pub mod config;
pub mod error;
pub mod map;
pub mod normalize;
pub mod ontology;
pub mod pipeline;
pub mod substitute;
pub mod target;

pub use config::{ColumnConfig, ConceptConfig, HarmonizationConfig};
pub use error::{HarmonizeError, Result};
pub use map::{
    HarmonizationMap, HarmonizationMapBuilder, HarmonizationReport, Substitution, load_icd_to_do,
};
pub use normalize::{
    DEFAULT_DELETION_PATTERNS, DeletionPatterns, UNASSIGNED, is_unassigned, normalize_raw,
};
pub use ontology::{OntologyTerm, OntologyTerms, load_ontology, parse_obo};
pub use pipeline::{
    HarmonizeStage, SubstitutionReport, apply_substitution, build_maps, substituted_path,
};
pub use substitute::{SubstitutionStats, substitute_column};
pub use target::{ConceptKind, HarmonizedTarget};
