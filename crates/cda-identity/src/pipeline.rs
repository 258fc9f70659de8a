//! Identity resolution stages driven by an [`IdentityConfig`].
//!
//! 1. **Load**: read the subject tables of every configured source
//! 2. **Match**: run each configured pairwise match and write its TSV
//! 3. **Close**: merge sources in closure order and write the closure TSV

use std::collections::BTreeMap;

use cda_ingest::WorkspaceLayout;
use cda_model::SourceId;
use tracing::{info, info_span};

use crate::closure::{CanonicalTable, ClosureBuilder, SourceClosureSummary};
use crate::config::IdentityConfig;
use crate::equivalence::load_equivalence;
use crate::error::{IdentityError, Result};
use crate::matcher::{PairwiseMatches, match_subjects};
use crate::subjects::{SubjectTable, load_subject_table};

/// Loads every declared source's subject table.
pub fn load_subject_tables(
    config: &IdentityConfig,
    layout: &WorkspaceLayout,
) -> Result<BTreeMap<SourceId, SubjectTable>> {
    let mut tables = BTreeMap::new();
    for (source, source_config) in &config.sources {
        let table = load_subject_table(
            source.clone(),
            &layout.resolve(&source_config.subjects),
            &layout.resolve(source_config.membership_path()),
            source_config.columns(),
            source_config.single_container,
        )?;
        info!(source = %source, subjects = table.len(), "loaded subjects");
        tables.insert(source.clone(), table);
    }
    Ok(tables)
}

/// Result of the match stage.
#[derive(Debug)]
pub struct MatchStage {
    pub tables: BTreeMap<SourceId, SubjectTable>,
    /// One entry per configured match, in configuration order.
    pub matches: Vec<PairwiseMatches>,
}

/// Runs every configured pairwise match, writing each result TSV.
pub fn run_matches(config: &IdentityConfig, layout: &WorkspaceLayout) -> Result<MatchStage> {
    let tables = load_subject_tables(config, layout)?;
    let mut matches = Vec::with_capacity(config.matches.len());
    for match_config in &config.matches {
        let span = info_span!("match", source = %match_config.source, into = %match_config.into);
        let _guard = span.enter();
        let a = table(&tables, &match_config.into)?;
        let b = table(&tables, &match_config.source)?;
        let equivalence = load_equivalence(
            &layout.resolve(&match_config.equivalence),
            &match_config.source_column,
            &match_config.into_column,
        )?;
        let result = match_subjects(a, b, &equivalence)?;
        let output = match_config.output_path(layout);
        result.write(&output)?;
        info!(path = %output.display(), matched = result.len(), "wrote pairwise matches");
        matches.push(result);
    }
    Ok(MatchStage { tables, matches })
}

/// Result of the closure stage.
#[derive(Debug)]
pub struct ClosureStage {
    pub canonical: CanonicalTable,
    pub summaries: Vec<SourceClosureSummary>,
}

/// Builds the transitive closure from a finished match stage.
///
/// Does nothing when the configuration has no `closure` section.
pub fn run_closure(
    config: &IdentityConfig,
    layout: &WorkspaceLayout,
    stage: &MatchStage,
) -> Result<Option<ClosureStage>> {
    let Some(closure) = &config.closure else {
        return Ok(None);
    };
    let mut builder = ClosureBuilder::new();
    let mut summaries = Vec::with_capacity(closure.order.len());
    for (position, source) in closure.order.iter().enumerate() {
        let subjects = table(&stage.tables, source)?;
        let mut routes = Vec::new();
        for prior in closure.precedence_for(position) {
            if !closure.order[..position].contains(&prior) {
                return Err(IdentityError::PriorNotClosed {
                    subject_source: source.clone(),
                    prior,
                });
            }
            for found in stage
                .matches
                .iter()
                .filter(|found| found.b_source == *source && found.a_source == prior)
            {
                routes.push(found.clone());
            }
            for found in stage
                .matches
                .iter()
                .filter(|found| found.a_source == *source && found.b_source == prior)
            {
                routes.push(found.reversed());
            }
        }
        let routes: Vec<&PairwiseMatches> = routes.iter().collect();
        summaries.push(builder.merge_source(subjects, &routes)?);
    }

    let canonical = builder.finish()?;
    let output = layout.resolve(&closure.output);
    canonical.write(&output)?;
    info!(
        path = %output.display(),
        subjects = canonical.len(),
        entities = canonical.entity_count(),
        "wrote merge closure"
    );
    Ok(Some(ClosureStage {
        canonical,
        summaries,
    }))
}

fn table<'a>(
    tables: &'a BTreeMap<SourceId, SubjectTable>,
    source: &SourceId,
) -> Result<&'a SubjectTable> {
    tables
        .get(source)
        .ok_or_else(|| IdentityError::UnknownSource(source.clone()))
}
