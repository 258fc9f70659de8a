//! Concept kinds and their harmonized targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::normalize::{UNASSIGNED, is_unassigned};

/// Shape of a concept's harmonized target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    /// Free-text concept mapped to a single harmonized string.
    #[default]
    Default,
    /// NCBI taxonomy.
    Species,
    /// Disease Ontology with ICD cross-reference.
    Disease,
    /// UBERON anatomy.
    AnatomicSite,
}

impl ConceptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptKind::Default => "default",
            ConceptKind::Species => "species",
            ConceptKind::Disease => "disease",
            ConceptKind::AnatomicSite => "anatomic_site",
        }
    }

    /// Map file columns, `original_value` first.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            ConceptKind::Default => &["original_value", "harmonized_value"],
            ConceptKind::Species => &[
                "original_value",
                "ncbi_tax_id",
                "scientific_name",
                "cda_common_name",
            ],
            ConceptKind::Disease => &["original_value", "do_id", "do_name", "icd_id", "icd_name"],
            ConceptKind::AnatomicSite => &["original_value", "uberon_id", "uberon_name"],
        }
    }
}

impl fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConceptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(ConceptKind::Default),
            "species" => Ok(ConceptKind::Species),
            "disease" => Ok(ConceptKind::Disease),
            "anatomic_site" => Ok(ConceptKind::AnatomicSite),
            other => Err(format!("Unknown concept kind: {other}")),
        }
    }
}

/// What one raw value harmonizes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarmonizedTarget {
    Text(String),
    Species {
        ncbi_tax_id: String,
        scientific_name: String,
        cda_common_name: String,
    },
    Disease {
        do_id: String,
        do_name: String,
        icd_id: String,
        icd_name: String,
    },
    AnatomicSite {
        uberon_id: String,
        uberon_name: String,
    },
}

impl HarmonizedTarget {
    /// The placeholder target for a newly observed value.
    pub fn unassigned(kind: ConceptKind) -> Self {
        let placeholder = || UNASSIGNED.to_string();
        match kind {
            ConceptKind::Default => HarmonizedTarget::Text(placeholder()),
            ConceptKind::Species => HarmonizedTarget::Species {
                ncbi_tax_id: placeholder(),
                scientific_name: placeholder(),
                cda_common_name: placeholder(),
            },
            ConceptKind::Disease => HarmonizedTarget::Disease {
                do_id: placeholder(),
                do_name: placeholder(),
                icd_id: placeholder(),
                icd_name: placeholder(),
            },
            ConceptKind::AnatomicSite => HarmonizedTarget::AnatomicSite {
                uberon_id: placeholder(),
                uberon_name: placeholder(),
            },
        }
    }

    /// Builds a target from the cells after `original_value`; missing cells
    /// read as empty.
    pub fn from_cells(kind: ConceptKind, cells: &[&str]) -> Self {
        let cell = |index: usize| {
            cells
                .get(index)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };
        match kind {
            ConceptKind::Default => HarmonizedTarget::Text(cell(0)),
            ConceptKind::Species => HarmonizedTarget::Species {
                ncbi_tax_id: cell(0),
                scientific_name: cell(1),
                cda_common_name: cell(2),
            },
            ConceptKind::Disease => HarmonizedTarget::Disease {
                do_id: cell(0),
                do_name: cell(1),
                icd_id: cell(2),
                icd_name: cell(3),
            },
            ConceptKind::AnatomicSite => HarmonizedTarget::AnatomicSite {
                uberon_id: cell(0),
                uberon_name: cell(1),
            },
        }
    }

    pub fn kind(&self) -> ConceptKind {
        match self {
            HarmonizedTarget::Text(_) => ConceptKind::Default,
            HarmonizedTarget::Species { .. } => ConceptKind::Species,
            HarmonizedTarget::Disease { .. } => ConceptKind::Disease,
            HarmonizedTarget::AnatomicSite { .. } => ConceptKind::AnatomicSite,
        }
    }

    /// Cells in [`ConceptKind::columns`] order, without `original_value`.
    pub fn cells(&self) -> Vec<String> {
        match self {
            HarmonizedTarget::Text(text) => vec![text.clone()],
            HarmonizedTarget::Species {
                ncbi_tax_id,
                scientific_name,
                cda_common_name,
            } => vec![
                ncbi_tax_id.clone(),
                scientific_name.clone(),
                cda_common_name.clone(),
            ],
            HarmonizedTarget::Disease {
                do_id,
                do_name,
                icd_id,
                icd_name,
            } => vec![do_id.clone(), do_name.clone(), icd_id.clone(), icd_name.clone()],
            HarmonizedTarget::AnatomicSite {
                uberon_id,
                uberon_name,
            } => vec![uberon_id.clone(), uberon_name.clone()],
        }
    }

    /// True when nothing about the value has been curated yet.
    pub fn is_unassigned(&self) -> bool {
        match self {
            HarmonizedTarget::Text(text) => is_unassigned(text),
            HarmonizedTarget::Species {
                ncbi_tax_id,
                scientific_name,
                ..
            } => is_unassigned(ncbi_tax_id) && is_unassigned(scientific_name),
            HarmonizedTarget::Disease { do_id, icd_id, .. } => {
                is_unassigned(do_id) && is_unassigned(icd_id)
            }
            HarmonizedTarget::AnatomicSite { uberon_id, .. } => is_unassigned(uberon_id),
        }
    }

    /// Text written back into harmonized tables, if any has been curated.
    pub fn substitution_text(&self) -> Option<&str> {
        let text = match self {
            HarmonizedTarget::Text(text) => text,
            HarmonizedTarget::Species {
                scientific_name, ..
            } => scientific_name,
            HarmonizedTarget::Disease { do_name, .. } => do_name,
            HarmonizedTarget::AnatomicSite { uberon_name, .. } => uberon_name,
        };
        (!is_unassigned(text)).then_some(text.as_str())
    }
}

impl fmt::Display for HarmonizedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cells().join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_follow_column_order() {
        let target = HarmonizedTarget::from_cells(
            ConceptKind::Disease,
            &["DOID:3910", "lung adenocarcinoma", "C34.9"],
        );
        assert_eq!(
            target.cells(),
            vec!["DOID:3910", "lung adenocarcinoma", "C34.9", ""]
        );
        assert_eq!(
            ConceptKind::Disease.columns().len(),
            target.cells().len() + 1
        );
        assert_eq!(target.substitution_text(), Some("lung adenocarcinoma"));
    }

    #[test]
    fn unassigned_targets_substitute_nothing() {
        for kind in [
            ConceptKind::Default,
            ConceptKind::Species,
            ConceptKind::Disease,
            ConceptKind::AnatomicSite,
        ] {
            let target = HarmonizedTarget::unassigned(kind);
            assert!(target.is_unassigned());
            assert_eq!(target.kind(), kind);
            assert_eq!(target.substitution_text(), None);
        }
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("Anatomic_Site".parse::<ConceptKind>(), Ok(ConceptKind::AnatomicSite));
        assert!("tissue".parse::<ConceptKind>().is_err());
    }
}
