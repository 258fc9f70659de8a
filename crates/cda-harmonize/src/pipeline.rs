//! Harmonization stages driven by a [`HarmonizationConfig`].
//!
//! 1. **Curate**: load curated maps, propagate ICD codes, check ontology ids
//! 2. **Scan**: observe every raw value of the configured columns
//! 3. **Build**: write one `<concept>.tsv` map per concept
//! 4. **Substitute** (optional): rewrite `substitute: true` columns

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use cda_ingest::{TsvTable, WorkspaceLayout, read_tsv};
use tracing::{info, info_span};

use crate::config::{ColumnConfig, HarmonizationConfig};
use crate::error::{HarmonizeError, Result};
use crate::map::{HarmonizationMap, HarmonizationMapBuilder, HarmonizationReport, load_icd_to_do};
use crate::normalize::DeletionPatterns;
use crate::ontology::load_ontology;
use crate::substitute::{SubstitutionStats, substitute_column};

/// Result of building every concept's map.
#[derive(Debug)]
pub struct HarmonizeStage {
    pub maps: BTreeMap<String, HarmonizationMap>,
    /// One report per concept, in concept-name order.
    pub reports: Vec<HarmonizationReport>,
    pub deletion: DeletionPatterns,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionReport {
    pub table: PathBuf,
    pub output: PathBuf,
    pub stats: SubstitutionStats,
}

fn curate(
    config: &HarmonizationConfig,
    layout: &WorkspaceLayout,
    deletion: &DeletionPatterns,
) -> Result<BTreeMap<String, HarmonizationMapBuilder>> {
    let mut builders = BTreeMap::new();
    for (concept, concept_config) in &config.concepts {
        let span = info_span!("concept", concept = %concept);
        let _guard = span.enter();
        let mut builder =
            HarmonizationMapBuilder::new(concept.clone(), concept_config.kind, deletion.clone());
        for path in &concept_config.curated {
            builder.load_curated(&layout.resolve(path))?;
        }
        let explicit = match &concept_config.icd_to_do {
            Some(path) => load_icd_to_do(&layout.resolve(path))?,
            None => HashMap::new(),
        };
        builder.propagate_icd_to_do(&explicit);
        // Propagated DO ids are checked along with the curated ones.
        if let Some(path) = &concept_config.ontology {
            let terms = load_ontology(&layout.resolve(path))?;
            builder.validate_ontology(&terms)?;
        }
        builders.insert(concept.clone(), builder);
    }
    Ok(builders)
}

fn read_cached(cache: &mut BTreeMap<PathBuf, TsvTable>, path: PathBuf) -> Result<&TsvTable> {
    match cache.entry(path) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let table = read_tsv(entry.key())?;
            Ok(entry.insert(table))
        }
    }
}

fn scan(
    config: &HarmonizationConfig,
    layout: &WorkspaceLayout,
    builders: &mut BTreeMap<String, HarmonizationMapBuilder>,
) -> Result<()> {
    let mut cache = BTreeMap::new();
    for column in &config.columns {
        let table = read_cached(&mut cache, layout.resolve(&column.table))?;
        let index = table.require_column(&column.column)?;
        let builder = builders
            .get_mut(&column.concept)
            .ok_or_else(|| HarmonizeError::UnknownConcept {
                table: column.table.clone(),
                column: column.column.clone(),
                concept: column.concept.clone(),
            })?;
        let mut kept = 0usize;
        for value in table.column_values(index) {
            if builder.observe(value) {
                kept += 1;
            }
        }
        info!(
            table = %column.table.display(),
            column = %column.column,
            concept = %column.concept,
            values = kept,
            "scanned column"
        );
    }
    Ok(())
}

/// Builds and writes every concept's harmonization map.
pub fn build_maps(config: &HarmonizationConfig, layout: &WorkspaceLayout) -> Result<HarmonizeStage> {
    let deletion = config.deletion_patterns();
    let mut builders = curate(config, layout, &deletion)?;
    scan(config, layout, &mut builders)?;

    let output_dir = layout.resolve(&config.output_dir);
    let mut maps = BTreeMap::new();
    let mut reports = Vec::with_capacity(builders.len());
    for (concept, builder) in builders {
        let (map, report) = builder.build();
        let path = output_dir.join(format!("{concept}.tsv"));
        map.write(&path)?;
        info!(concept = %concept, path = %path.display(), entries = map.len(), "wrote harmonization map");
        maps.insert(concept, map);
        reports.push(report);
    }
    Ok(HarmonizeStage {
        maps,
        reports,
        deletion,
    })
}

/// Where a substituted copy of `table` is written.
///
/// Relative table paths keep their structure under `substituted_dir`, so
/// same-named tables of different sources do not collide.
pub fn substituted_path(config: &HarmonizationConfig, layout: &WorkspaceLayout, table: &Path) -> PathBuf {
    let base = layout.resolve(&config.substituted_dir);
    if table.is_absolute() {
        base.join(table.file_name().unwrap_or(table.as_os_str()))
    } else {
        base.join(table)
    }
}

/// Rewrites every table that has `substitute: true` columns.
pub fn apply_substitution(
    config: &HarmonizationConfig,
    layout: &WorkspaceLayout,
    stage: &HarmonizeStage,
) -> Result<Vec<SubstitutionReport>> {
    let mut by_table: BTreeMap<&Path, Vec<&ColumnConfig>> = BTreeMap::new();
    for column in config.columns.iter().filter(|column| column.substitute) {
        by_table.entry(column.table.as_path()).or_default().push(column);
    }

    let mut reports = Vec::with_capacity(by_table.len());
    for (table_path, columns) in by_table {
        let mut table = read_tsv(&layout.resolve(table_path))?;
        let mut stats = SubstitutionStats::default();
        for column in columns {
            let index = table.require_column(&column.column)?;
            let map = stage
                .maps
                .get(&column.concept)
                .ok_or_else(|| HarmonizeError::UnknownConcept {
                    table: column.table.clone(),
                    column: column.column.clone(),
                    concept: column.concept.clone(),
                })?;
            stats.absorb(&substitute_column(&mut table, index, map, &stage.deletion));
        }
        let output = substituted_path(config, layout, table_path);
        table.write(&output)?;
        info!(
            table = %table_path.display(),
            output = %output.display(),
            replaced = stats.replaced,
            deleted = stats.deleted,
            unassigned = stats.unassigned,
            "wrote harmonized table"
        );
        reports.push(SubstitutionReport {
            table: table_path.to_path_buf(),
            output,
            stats,
        });
    }
    Ok(reports)
}
