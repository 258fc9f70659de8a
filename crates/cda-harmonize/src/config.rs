//! Harmonization configuration.
//!
//! ```yaml
//! concepts:
//!   disease:
//!     kind: disease
//!     curated:
//!       - auxiliary_metadata/harmonization/disease.tsv
//!     ontology: auxiliary_metadata/ontologies/doid.obo
//!     icd_to_do: auxiliary_metadata/harmonization/icd_to_do.tsv
//!   sex:
//!     curated: [auxiliary_metadata/harmonization/sex.tsv]
//! columns:
//!   - table: cda_tsvs/gdc/diagnosis.tsv
//!     column: primary_diagnosis
//!     concept: disease
//!     substitute: true
//! extra_deletion_patterns: ["not allowed to collect"]
//! output_dir: cda_tsvs/harmonization_maps
//! substituted_dir: cda_tsvs/harmonized
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HarmonizeError, Result};
use crate::normalize::DeletionPatterns;
use crate::target::ConceptKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConceptConfig {
    #[serde(default)]
    pub kind: ConceptKind,
    /// Curated maps, highest priority first.
    #[serde(default)]
    pub curated: Vec<PathBuf>,
    #[serde(default)]
    pub ontology: Option<PathBuf>,
    #[serde(default)]
    pub icd_to_do: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnConfig {
    pub table: PathBuf,
    pub column: String,
    pub concept: String,
    /// Rewrite this column during substitution; otherwise only scan it.
    #[serde(default)]
    pub substitute: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("cda_tsvs").join("harmonization_maps")
}

fn default_substituted_dir() -> PathBuf {
    PathBuf::from("cda_tsvs").join("harmonized")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarmonizationConfig {
    pub concepts: BTreeMap<String, ConceptConfig>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub extra_deletion_patterns: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_substituted_dir")]
    pub substituted_dir: PathBuf,
}

impl HarmonizationConfig {
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|source| HarmonizeError::ConfigYaml {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| HarmonizeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn deletion_patterns(&self) -> DeletionPatterns {
        DeletionPatterns::default().with_extra(&self.extra_deletion_patterns)
    }

    fn validate(&self) -> Result<()> {
        for (concept, config) in &self.concepts {
            if config.icd_to_do.is_some() && config.kind != ConceptKind::Disease {
                return Err(HarmonizeError::InvalidConcept {
                    concept: concept.clone(),
                    detail: format!("icd_to_do applies to disease concepts, not {}", config.kind),
                });
            }
            let needs_ontology = matches!(config.kind, ConceptKind::Disease | ConceptKind::AnatomicSite);
            if config.ontology.is_some() && !needs_ontology {
                return Err(HarmonizeError::InvalidConcept {
                    concept: concept.clone(),
                    detail: format!("{} concepts carry no ontology ids", config.kind),
                });
            }
        }
        for column in &self.columns {
            if !self.concepts.contains_key(&column.concept) {
                return Err(HarmonizeError::UnknownConcept {
                    table: column.table.clone(),
                    column: column.column.clone(),
                    concept: column.concept.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_to_free_text() {
        let text = "concepts:\n  sex:\n    curated: [sex.tsv]\n";
        let config = HarmonizationConfig::parse(text, Path::new("h.yml")).unwrap();
        assert_eq!(config.concepts["sex"].kind, ConceptKind::Default);
        assert_eq!(config.output_dir, PathBuf::from("cda_tsvs/harmonization_maps"));
    }

    #[test]
    fn column_must_name_declared_concept() {
        let text = "concepts: {}\ncolumns:\n  - {table: t.tsv, column: sex, concept: sex}\n";
        let err = HarmonizationConfig::parse(text, Path::new("h.yml")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "column \"sex\" of t.tsv names undeclared concept \"sex\""
        );
    }

    #[test]
    fn icd_table_needs_disease_kind() {
        let text = "concepts:\n  site:\n    kind: anatomic_site\n    icd_to_do: icd.tsv\n";
        assert!(matches!(
            HarmonizationConfig::parse(text, Path::new("h.yml")).unwrap_err(),
            HarmonizeError::InvalidConcept { .. }
        ));
    }

    #[test]
    fn extra_deletion_patterns_apply() {
        let text = "concepts: {}\nextra_deletion_patterns: [\"Not Allowed To Collect\"]\n";
        let config = HarmonizationConfig::parse(text, Path::new("h.yml")).unwrap();
        assert!(config.deletion_patterns().is_deleted("not allowed to collect"));
    }
}
