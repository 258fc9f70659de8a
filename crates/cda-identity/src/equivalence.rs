//! Hand-curated container equivalence maps.
//!
//! These tables pair one source's projects or studies with another's. They
//! are vetted by hand to remove false positives and are never derived from
//! name similarity.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use cda_ingest::read_tsv;

use crate::error::Result;

/// Maps a container of the matched source to containers of the target source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEquivalence {
    targets: BTreeMap<String, BTreeSet<String>>,
}

impl ContainerEquivalence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank cells on either side are ignored.
    pub fn insert(&mut self, from: &str, to: &str) {
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return;
        }
        self.targets
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn targets<'a>(&'a self, from: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.targets
            .get(from)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Number of distinct container pairs.
    pub fn len(&self) -> usize {
        self.targets.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ContainerEquivalence {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut equivalence = Self::new();
        for (from, to) in iter {
            equivalence.insert(from, to);
        }
        equivalence
    }
}

/// Reads an equivalence TSV, pairing `from_column` with `to_column`.
pub fn load_equivalence(path: &Path, from_column: &str, to_column: &str) -> Result<ContainerEquivalence> {
    let table = read_tsv(path)?;
    let indices = table.require_columns(&[from_column, to_column])?;
    let mut equivalence = ContainerEquivalence::new();
    for row in 0..table.len() {
        equivalence.insert(table.value(row, indices[0]), table.value(row, indices[1]));
    }
    Ok(equivalence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_container_may_map_to_several() {
        let equivalence: ContainerEquivalence = [
            ("CPTAC-3", "PDC000127"),
            ("CPTAC-3", "PDC000204"),
            ("TCGA-BRCA", " "),
        ]
        .into_iter()
        .collect();
        let targets: Vec<&str> = equivalence.targets("CPTAC-3").collect();
        assert_eq!(targets, vec!["PDC000127", "PDC000204"]);
        assert_eq!(equivalence.targets("TCGA-BRCA").count(), 0);
        assert_eq!(equivalence.len(), 2);
    }
}
