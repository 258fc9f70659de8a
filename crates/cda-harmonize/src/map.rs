//! Harmonization map construction.
//!
//! A map is built per concept in one pass:
//!
//! 1. Load curated maps from earlier revisions, highest priority first
//! 2. Check curated ontology ids against the current ontology
//! 3. For diseases, propagate DO mappings through shared ICD codes
//! 4. Observe raw values scanned from the harmonized tables
//! 5. Build: every observed value gets its curated target or the
//!    unassigned placeholder
//!
//! Curated values disagreeing across revisions are logged loudly and the
//! earlier revision wins; they never abort the build.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use cda_ingest::{read_tsv, write_tsv};
use tracing::{debug, info, warn};

use crate::error::{HarmonizeError, Result};
use crate::normalize::{DeletionPatterns, is_unassigned, normalize_raw};
use crate::ontology::OntologyTerms;
use crate::target::{ConceptKind, HarmonizedTarget};

/// Counts describing one concept's build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarmonizationReport {
    pub concept: String,
    /// Distinct raw values observed (after deletion).
    pub observed: usize,
    /// Observed values with a curated target.
    pub mapped: usize,
    /// Observed values still waiting for curation.
    pub unassigned: usize,
    /// Curated entries no longer observed.
    pub dropped: usize,
    /// Disagreements between curated revisions.
    pub conflicts: usize,
    /// Raw cells discarded by deletion patterns.
    pub deleted: usize,
    /// Disease entries that gained a DO mapping through their ICD code.
    pub propagated: usize,
}

/// Replacement decided for one raw cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution<'a> {
    /// Null-like value; the cell is emptied.
    Deleted,
    /// Curated harmonized text.
    Mapped(&'a str),
    /// Observed but not yet curated; the cell is left as it was.
    Unassigned,
}

#[derive(Debug, Clone)]
pub struct HarmonizationMap {
    concept: String,
    kind: ConceptKind,
    entries: BTreeMap<String, HarmonizedTarget>,
}

impl HarmonizationMap {
    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn kind(&self) -> ConceptKind {
        self.kind
    }

    /// Looks a raw value up after normalizing it.
    pub fn get(&self, raw: &str) -> Option<&HarmonizedTarget> {
        self.entries.get(&normalize_raw(raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HarmonizedTarget)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn substitute(&self, raw: &str, deletion: &DeletionPatterns) -> Substitution<'_> {
        if deletion.is_deleted(raw) {
            return Substitution::Deleted;
        }
        match self.get(raw).and_then(HarmonizedTarget::substitution_text) {
            Some(text) => Substitution::Mapped(text),
            None => Substitution::Unassigned,
        }
    }

    /// Writes the map in the curated layout of its kind, sorted by raw value.
    pub fn write(&self, path: &Path) -> Result<()> {
        let rows = self.entries.iter().map(|(raw, target)| {
            let mut row = Vec::with_capacity(self.kind.columns().len());
            row.push(raw.clone());
            row.extend(target.cells());
            row
        });
        write_tsv(path, self.kind.columns(), rows)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct HarmonizationMapBuilder {
    concept: String,
    kind: ConceptKind,
    deletion: DeletionPatterns,
    curated: BTreeMap<String, HarmonizedTarget>,
    observed: BTreeSet<String>,
    report: HarmonizationReport,
}

impl HarmonizationMapBuilder {
    pub fn new(concept: impl Into<String>, kind: ConceptKind, deletion: DeletionPatterns) -> Self {
        let concept = concept.into();
        Self {
            report: HarmonizationReport {
                concept: concept.clone(),
                ..HarmonizationReport::default()
            },
            concept,
            kind,
            deletion,
            curated: BTreeMap::new(),
            observed: BTreeSet::new(),
        }
    }

    pub fn curated_len(&self) -> usize {
        self.curated.len()
    }

    /// Adds one curated entry. `origin` names where it came from in logs.
    ///
    /// Returns false when the raw value is null-like and was skipped.
    pub fn insert_curated(&mut self, raw: &str, target: HarmonizedTarget, origin: &str) -> bool {
        let raw = normalize_raw(raw);
        if self.deletion.is_deleted(&raw) {
            return false;
        }
        match self.curated.get_mut(&raw) {
            None => {
                self.curated.insert(raw, target);
            }
            Some(existing) if *existing == target => {}
            Some(existing) if existing.is_unassigned() => {
                debug!(
                    concept = %self.concept,
                    raw_value = %raw,
                    origin,
                    "curated value replaces unassigned entry"
                );
                *existing = target;
            }
            Some(existing) => {
                if !target.is_unassigned() {
                    warn!(
                        concept = %self.concept,
                        raw_value = %raw,
                        kept = %existing,
                        ignored = %target,
                        origin,
                        "WARNING: YARRRGH! conflicting harmonization targets; keeping the earlier one"
                    );
                    self.report.conflicts += 1;
                }
            }
        }
        true
    }

    /// Loads a curated map TSV in this concept's layout.
    pub fn load_curated(&mut self, path: &Path) -> Result<usize> {
        let table = read_tsv(path)?;
        let indices = table.require_columns(self.kind.columns())?;
        let origin = path.display().to_string();
        let mut loaded = 0;
        for row in 0..table.len() {
            let cells: Vec<&str> = indices[1..]
                .iter()
                .map(|column| table.value(row, *column))
                .collect();
            let target = HarmonizedTarget::from_cells(self.kind, &cells);
            if self.insert_curated(table.value(row, indices[0]), target, &origin) {
                loaded += 1;
            }
        }
        info!(concept = %self.concept, path = %origin, entries = loaded, "loaded curated map");
        Ok(loaded)
    }

    /// Checks curated ontology ids and fills in empty names.
    ///
    /// A curated id missing from the current ontology, or obsolete there,
    /// is an error: the curated map must be fixed by hand.
    pub fn validate_ontology(&mut self, terms: &OntologyTerms) -> Result<usize> {
        let mut filled = 0;
        for (raw, target) in &mut self.curated {
            let (id, name) = match target {
                HarmonizedTarget::Disease { do_id, do_name, .. } => (do_id, do_name),
                HarmonizedTarget::AnatomicSite {
                    uberon_id,
                    uberon_name,
                } => (uberon_id, uberon_name),
                HarmonizedTarget::Text(_) | HarmonizedTarget::Species { .. } => continue,
            };
            if is_unassigned(id) {
                continue;
            }
            let status = match terms.get(id) {
                None => Some("missing"),
                Some(term) if term.obsolete => Some("obsolete"),
                Some(term) => {
                    if is_unassigned(name) && !term.name.is_empty() {
                        *name = term.name.clone();
                        filled += 1;
                    }
                    None
                }
            };
            if let Some(status) = status {
                return Err(HarmonizeError::UnknownOntologyTerm {
                    concept: self.concept.clone(),
                    raw_value: raw.clone(),
                    term_id: id.clone(),
                    status,
                    ontology: terms.path().to_path_buf(),
                });
            }
        }
        if filled > 0 {
            info!(concept = %self.concept, filled, "filled names from ontology");
        }
        Ok(filled)
    }

    /// Gives disease entries that only carry an ICD code the DO mapping of
    /// another entry with the same ICD code.
    ///
    /// `explicit` pairs ICD codes with `(do_id, do_name)` and takes priority
    /// over pairs derived from the curated entries. Existing DO mappings are
    /// never overridden.
    pub fn propagate_icd_to_do(&mut self, explicit: &HashMap<String, (String, String)>) -> usize {
        if self.kind != ConceptKind::Disease {
            return 0;
        }
        let mut icd_to_do: HashMap<String, (String, String)> = explicit.clone();
        for target in self.curated.values() {
            if let HarmonizedTarget::Disease {
                do_id,
                do_name,
                icd_id,
                ..
            } = target
            {
                if !is_unassigned(do_id) && !is_unassigned(icd_id) {
                    icd_to_do
                        .entry(icd_id.clone())
                        .or_insert_with(|| (do_id.clone(), do_name.clone()));
                }
            }
        }

        let mut propagated = 0;
        for (raw, target) in &mut self.curated {
            let HarmonizedTarget::Disease {
                do_id,
                do_name,
                icd_id,
                ..
            } = target
            else {
                continue;
            };
            if !is_unassigned(do_id) || is_unassigned(icd_id) {
                continue;
            }
            if let Some((mapped_id, mapped_name)) = icd_to_do.get(icd_id.as_str()) {
                debug!(raw_value = %raw, icd_id = %icd_id, do_id = %mapped_id, "propagated DO mapping");
                *do_id = mapped_id.clone();
                *do_name = mapped_name.clone();
                propagated += 1;
            }
        }
        self.report.propagated += propagated;
        propagated
    }

    /// Records a raw value seen in the data. Returns false if it was deleted.
    pub fn observe(&mut self, raw: &str) -> bool {
        let raw = normalize_raw(raw);
        if self.deletion.is_deleted(&raw) {
            self.report.deleted += 1;
            return false;
        }
        self.observed.insert(raw);
        true
    }

    pub fn build(self) -> (HarmonizationMap, HarmonizationReport) {
        let mut report = self.report;
        let mut curated = self.curated;
        let mut entries = BTreeMap::new();
        for raw in self.observed {
            let target = match curated.remove(&raw) {
                Some(target) => target,
                None => HarmonizedTarget::unassigned(self.kind),
            };
            if target.is_unassigned() {
                report.unassigned += 1;
            } else {
                report.mapped += 1;
            }
            entries.insert(raw, target);
        }
        report.observed = entries.len();
        report.dropped = curated.len();
        info!(
            concept = %report.concept,
            observed = report.observed,
            mapped = report.mapped,
            unassigned = report.unassigned,
            dropped = report.dropped,
            conflicts = report.conflicts,
            "built harmonization map"
        );
        let map = HarmonizationMap {
            concept: self.concept,
            kind: self.kind,
            entries,
        };
        (map, report)
    }
}

/// Reads an explicit ICD-to-DO table (`icd_id`, `do_id`, `do_name`).
pub fn load_icd_to_do(path: &Path) -> Result<HashMap<String, (String, String)>> {
    let table = read_tsv(path)?;
    let indices = table.require_columns(&["icd_id", "do_id", "do_name"])?;
    let mut pairs = HashMap::new();
    for row in 0..table.len() {
        let icd_id = table.value(row, indices[0]).trim();
        let do_id = table.value(row, indices[1]).trim();
        if is_unassigned(icd_id) || is_unassigned(do_id) {
            continue;
        }
        pairs.entry(icd_id.to_string()).or_insert_with(|| {
            (
                do_id.to_string(),
                table.value(row, indices[2]).trim().to_string(),
            )
        });
    }
    Ok(pairs)
}
