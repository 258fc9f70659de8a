//! Pairwise subject matching between two sources.
//!
//! Source B's subjects are matched into source A when both carry the same
//! natural key inside containers the equivalence map pairs up. The result is
//! a partial injection: every B subject matches at most one A subject and no
//! A subject is claimed twice. Any violation is an error, never a tie-break.

use std::collections::BTreeMap;
use std::path::Path;

use cda_ingest::write_tsv;
use cda_model::{EntityAlias, PairwiseMatch, SourceId};
use tracing::{debug, info};

use crate::equivalence::ContainerEquivalence;
use crate::error::{IdentityError, Result};
use crate::subjects::SubjectTable;

/// The matches found between a target source (A) and a matched source (B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairwiseMatches {
    pub a_source: SourceId,
    pub b_source: SourceId,
    /// Sorted by B alias.
    pub matches: Vec<PairwiseMatch>,
    /// B subjects that carried a natural key and were therefore candidates.
    pub candidates: usize,
}

impl PairwiseMatches {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The same relation seen from the other side.
    ///
    /// Matches are injective both ways, so swapping sides loses nothing.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut matches: Vec<PairwiseMatch> = self
            .matches
            .iter()
            .map(|pair| PairwiseMatch {
                a_alias: pair.b_alias.clone(),
                a_id: pair.b_id.clone(),
                b_alias: pair.a_alias.clone(),
                b_id: pair.a_id.clone(),
            })
            .collect();
        matches.sort_by(|left, right| left.b_alias.cmp(&right.b_alias));
        Self {
            a_source: self.b_source.clone(),
            b_source: self.a_source.clone(),
            matches,
            candidates: self.candidates,
        }
    }

    pub fn headers(&self) -> [String; 4] {
        [
            format!("{}_subject_alias", self.a_source),
            format!("{}_subject_id", self.a_source),
            format!("{}_subject_alias", self.b_source),
            format!("{}_subject_id", self.b_source),
        ]
    }

    /// Writes the matches as a four-column TSV.
    pub fn write(&self, path: &Path) -> Result<()> {
        let rows = self.matches.iter().map(|pair| {
            vec![
                pair.a_alias.to_string(),
                pair.a_id.clone(),
                pair.b_alias.to_string(),
                pair.b_id.clone(),
            ]
        });
        write_tsv(path, &self.headers(), rows)?;
        Ok(())
    }
}

/// Matches every subject of `b` into `a`.
///
/// `equivalence` maps B containers to A containers.
pub fn match_subjects(
    a: &SubjectTable,
    b: &SubjectTable,
    equivalence: &ContainerEquivalence,
) -> Result<PairwiseMatches> {
    let index = a.natural_key_index()?;
    let mut b_to_a: BTreeMap<EntityAlias, EntityAlias> = BTreeMap::new();
    let mut candidates = 0;

    for subject in b.iter() {
        let Some(natural_key) = &subject.natural_key else {
            continue;
        };
        candidates += 1;
        for container in &subject.containers {
            for a_container in equivalence.targets(container) {
                let key = (a_container.to_string(), natural_key.clone());
                let Some(a_alias) = index.get(&key) else {
                    continue;
                };
                match b_to_a.get(&subject.alias) {
                    Some(existing) if existing != a_alias => {
                        return Err(IdentityError::ConflictingMatch {
                            a_source: a.source().clone(),
                            b_source: b.source().clone(),
                            b_alias: subject.alias.clone(),
                            natural_key: natural_key.clone(),
                            first: existing.clone(),
                            second: a_alias.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        debug!(
                            b_alias = %subject.alias,
                            a_alias = %a_alias,
                            container = %a_container,
                            "matched subject"
                        );
                        b_to_a.insert(subject.alias.clone(), a_alias.clone());
                    }
                }
            }
        }
    }

    let mut claimed: BTreeMap<&EntityAlias, &EntityAlias> = BTreeMap::new();
    for (b_alias, a_alias) in &b_to_a {
        if let Some(first) = claimed.insert(a_alias, b_alias) {
            return Err(IdentityError::NonInjectiveMatch {
                a_source: a.source().clone(),
                b_source: b.source().clone(),
                a_alias: a_alias.clone(),
                first: first.clone(),
                second: b_alias.clone(),
            });
        }
    }

    let matches: Vec<PairwiseMatch> = b_to_a
        .iter()
        .filter_map(|(b_alias, a_alias)| {
            let a_subject = a.get(a_alias)?;
            let b_subject = b.get(b_alias)?;
            Some(PairwiseMatch {
                a_alias: a_alias.clone(),
                a_id: a_subject.id.clone(),
                b_alias: b_alias.clone(),
                b_id: b_subject.id.clone(),
            })
        })
        .collect();

    info!(
        a_source = %a.source(),
        b_source = %b.source(),
        candidates,
        matched = matches.len(),
        "pairwise match complete"
    );
    Ok(PairwiseMatches {
        a_source: a.source().clone(),
        b_source: b.source().clone(),
        matches,
        candidates,
    })
}
