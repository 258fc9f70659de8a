//! Transitive merge closure over pairwise matches.
//!
//! Sources are merged one at a time in a fixed order. The first source seeds
//! the closure with every subject as its own canonical entity. Each later
//! source resolves its subjects through its matches into already-closed
//! sources; subjects with no match become new canonical entities. When two
//! routes disagree on a subject's canonical entity the closure fails.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use cda_ingest::{read_tsv, write_tsv};
use cda_model::{CanonicalAssignment, EntityAlias, SourceId};
use tracing::{info, warn};

use crate::error::{IdentityError, Result};
use crate::matcher::PairwiseMatches;
use crate::subjects::SubjectTable;

pub const CLOSURE_HEADERS: [&str; 5] = [
    "source",
    "subject_alias",
    "subject_id",
    "new_subject_alias",
    "new_subject_id",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Canonical {
    alias: EntityAlias,
    id: String,
}

/// Counts for one source merged into the closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceClosureSummary {
    pub source: SourceId,
    pub subjects: usize,
    /// Subjects resolved into an entity from an earlier source.
    pub joined: usize,
    /// Subjects that became canonical entities of their own.
    pub new_entities: usize,
}

#[derive(Debug, Default)]
pub struct ClosureBuilder {
    order: Vec<SourceId>,
    assignments: BTreeMap<(SourceId, EntityAlias), (String, Canonical)>,
}

impl ClosureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.order
    }

    fn is_closed(&self, source: &SourceId) -> bool {
        self.order.contains(source)
    }

    /// Merges one source's subjects into the closure.
    ///
    /// `routes` are this source's matches into earlier sources, in
    /// precedence order; every route must have this source as its B side and
    /// an already-merged source as its A side. An empty closure takes the
    /// first source as its seed, so no routes apply to it.
    pub fn merge_source(
        &mut self,
        table: &SubjectTable,
        routes: &[&PairwiseMatches],
    ) -> Result<SourceClosureSummary> {
        let source = table.source().clone();
        if self.is_closed(&source) {
            return Err(IdentityError::SourceAlreadyClosed(source));
        }

        let mut resolved: BTreeMap<EntityAlias, (Canonical, SourceId)> = BTreeMap::new();
        for route in routes {
            if route.b_source != source {
                return Err(IdentityError::RouteMismatch {
                    expected: source,
                    a_source: route.a_source.clone(),
                    b_source: route.b_source.clone(),
                });
            }
            let prior = &route.a_source;
            if !self.is_closed(prior) {
                return Err(IdentityError::PriorNotClosed {
                    subject_source: source,
                    prior: prior.clone(),
                });
            }
            for pair in &route.matches {
                let Some((_, canonical)) = self
                    .assignments
                    .get(&(prior.clone(), pair.a_alias.clone()))
                else {
                    return Err(IdentityError::UnknownPriorAlias {
                        subject_source: source,
                        alias: pair.b_alias.clone(),
                        prior: prior.clone(),
                        prior_alias: pair.a_alias.clone(),
                    });
                };
                match resolved.get(&pair.b_alias) {
                    Some((existing, first_route)) if existing != canonical => {
                        return Err(IdentityError::ClosureConflict {
                            subject_source: source,
                            alias: pair.b_alias.clone(),
                            first: existing.alias.clone(),
                            first_route: first_route.clone(),
                            second: canonical.alias.clone(),
                            second_route: prior.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        resolved.insert(pair.b_alias.clone(), (canonical.clone(), prior.clone()));
                    }
                }
            }
        }

        let mut summary = SourceClosureSummary {
            source: source.clone(),
            subjects: table.len(),
            joined: 0,
            new_entities: 0,
        };
        let mut fan_in: HashMap<EntityAlias, usize> = HashMap::new();
        for subject in table.iter() {
            let canonical = match resolved.remove(&subject.alias) {
                Some((canonical, _)) => {
                    summary.joined += 1;
                    *fan_in.entry(canonical.alias.clone()).or_default() += 1;
                    canonical
                }
                None => {
                    summary.new_entities += 1;
                    Canonical {
                        alias: subject.alias.clone(),
                        id: subject.id.clone(),
                    }
                }
            };
            self.assignments.insert(
                (source.clone(), subject.alias.clone()),
                (subject.id.clone(), canonical),
            );
        }

        for (canonical, count) in fan_in.iter().filter(|(_, count)| **count > 1) {
            warn!(
                source = %source,
                canonical = %canonical,
                subjects = count,
                "WARNING: several subjects of one source collapse into one canonical entity"
            );
        }
        if !resolved.is_empty() {
            warn!(
                source = %source,
                unknown = resolved.len(),
                "WARNING: matches name subjects missing from the subject table"
            );
        }

        self.order.push(source);
        info!(
            source = %summary.source,
            subjects = summary.subjects,
            joined = summary.joined,
            new_entities = summary.new_entities,
            "merged source into closure"
        );
        Ok(summary)
    }

    /// Freezes the closure into a table ordered by merge order, then alias.
    pub fn finish(self) -> Result<CanonicalTable> {
        let rank: HashMap<&SourceId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(index, source)| (source, index))
            .collect();
        let mut rows: Vec<CanonicalAssignment> = self
            .assignments
            .iter()
            .map(|((source, alias), (id, canonical))| CanonicalAssignment {
                source: source.clone(),
                subject_alias: alias.clone(),
                subject_id: id.clone(),
                new_subject_alias: canonical.alias.clone(),
                new_subject_id: canonical.id.clone(),
            })
            .collect();
        rows.sort_by(|left, right| {
            rank.get(&left.source)
                .cmp(&rank.get(&right.source))
                .then_with(|| left.subject_alias.cmp(&right.subject_alias))
        });
        CanonicalTable::from_rows(rows)
    }
}

/// Every subject's canonical entity, with lookup by `(source, subject_id)`.
#[derive(Debug, Clone, Default)]
pub struct CanonicalTable {
    rows: Vec<CanonicalAssignment>,
    by_subject_id: HashMap<(SourceId, String), usize>,
}

impl CanonicalTable {
    /// Indexes `rows` by `(source, subject_id)`.
    ///
    /// A subject id listed twice for one source is an error, even when both
    /// rows agree on the canonical entity.
    pub fn from_rows(rows: Vec<CanonicalAssignment>) -> Result<Self> {
        let mut by_subject_id = HashMap::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let key = (row.source.clone(), row.subject_id.clone());
            if let Some(first) = by_subject_id.insert(key, index) {
                return Err(IdentityError::DuplicateCanonicalSubject {
                    subject_source: row.source.clone(),
                    subject_id: row.subject_id.clone(),
                    first: rows[first].subject_alias.clone(),
                    second: row.subject_alias.clone(),
                });
            }
        }
        Ok(Self {
            rows,
            by_subject_id,
        })
    }

    pub fn rows(&self) -> &[CanonicalAssignment] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct canonical entities.
    pub fn entity_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_representative()).count()
    }

    pub fn canonical_id(&self, source: &SourceId, subject_id: &str) -> Option<&str> {
        self.by_subject_id
            .get(&(source.clone(), subject_id.to_string()))
            .map(|index| self.rows[*index].new_subject_id.as_str())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let rows = self.rows.iter().map(|row| {
            vec![
                row.source.to_string(),
                row.subject_alias.to_string(),
                row.subject_id.clone(),
                row.new_subject_alias.to_string(),
                row.new_subject_id.clone(),
            ]
        });
        write_tsv(path, &CLOSURE_HEADERS, rows)?;
        Ok(())
    }
}

/// Reads a closure table written by [`CanonicalTable::write`].
pub fn read_canonical_table(path: &Path) -> Result<CanonicalTable> {
    let table = read_tsv(path)?;
    let indices = table.require_columns(&CLOSURE_HEADERS)?;
    let mut rows = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let cell = |column: usize| table.value(row, indices[column]);
        rows.push(CanonicalAssignment {
            source: SourceId::new(cell(0))?,
            subject_alias: EntityAlias::new(cell(1))?,
            subject_id: cell(2).trim().to_string(),
            new_subject_alias: EntityAlias::new(cell(3))?,
            new_subject_id: cell(4).trim().to_string(),
        });
    }
    CanonicalTable::from_rows(rows)
}
