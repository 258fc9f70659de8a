//! Per-source subject tables.
//!
//! A subject table holds, for one source, every subject alias with its
//! native id, its natural key (usually the submitter id) and the containers
//! (projects, studies) it belongs to.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use cda_ingest::read_tsv;
use cda_model::{EntityAlias, SourceId};
use tracing::debug;

use crate::error::{IdentityError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub alias: EntityAlias,
    pub id: String,
    /// Trimmed natural key; `None` when the source left it blank.
    pub natural_key: Option<String>,
    pub containers: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct SubjectTable {
    source: SourceId,
    subjects: BTreeMap<EntityAlias, Subject>,
}

impl SubjectTable {
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn get(&self, alias: &EntityAlias) -> Option<&Subject> {
        self.subjects.get(alias)
    }

    /// Subjects in alias order.
    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Index of `(container, natural_key)` to the subject holding it.
    ///
    /// Two subjects sharing a key inside one container make any match through
    /// that key ambiguous, so that is an error.
    pub fn natural_key_index(&self) -> Result<HashMap<(String, String), EntityAlias>> {
        let mut index: HashMap<(String, String), EntityAlias> = HashMap::new();
        for subject in self.subjects.values() {
            let Some(natural_key) = &subject.natural_key else {
                continue;
            };
            for container in &subject.containers {
                let key = (container.clone(), natural_key.clone());
                if let Some(existing) = index.get(&key) {
                    return Err(IdentityError::DuplicateNaturalKey {
                        subject_source: self.source.clone(),
                        container: container.clone(),
                        natural_key: natural_key.clone(),
                        first: existing.clone(),
                        second: subject.alias.clone(),
                    });
                }
                index.insert(key, subject.alias.clone());
            }
        }
        Ok(index)
    }
}

/// Accumulates subject and membership rows, then validates them.
#[derive(Debug)]
pub struct SubjectTableBuilder {
    source: SourceId,
    single_container: bool,
    subjects: BTreeMap<EntityAlias, Subject>,
}

impl SubjectTableBuilder {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            single_container: false,
            subjects: BTreeMap::new(),
        }
    }

    /// Requires every subject to belong to exactly one container.
    #[must_use]
    pub fn single_container(mut self, required: bool) -> Self {
        self.single_container = required;
        self
    }

    /// Records a subject. Repeating a row is fine; contradicting one is not.
    pub fn add_subject(&mut self, alias: EntityAlias, id: &str, natural_key: &str) -> Result<()> {
        let id = id.trim().to_string();
        let natural_key = Some(natural_key.trim().to_string()).filter(|key| !key.is_empty());
        if let Some(existing) = self.subjects.get(&alias) {
            if existing.id != id {
                return Err(self.inconsistent(alias, "id", &existing.id, &id));
            }
            if existing.natural_key != natural_key {
                let first = existing.natural_key.clone().unwrap_or_default();
                let second = natural_key.unwrap_or_default();
                return Err(self.inconsistent(alias, "natural key", &first, &second));
            }
            return Ok(());
        }
        self.subjects.insert(
            alias.clone(),
            Subject {
                alias,
                id,
                natural_key,
                containers: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Adds a container to a known subject. Returns false for unknown aliases.
    pub fn add_membership(&mut self, alias: &EntityAlias, container: &str) -> bool {
        let Some(subject) = self.subjects.get_mut(alias) else {
            return false;
        };
        let container = container.trim();
        if !container.is_empty() {
            subject.containers.insert(container.to_string());
        }
        true
    }

    pub fn build(self) -> Result<SubjectTable> {
        if self.single_container {
            if let Some(subject) = self
                .subjects
                .values()
                .find(|subject| subject.containers.len() != 1)
            {
                return Err(IdentityError::ContainerCount {
                    subject_source: self.source.clone(),
                    alias: subject.alias.clone(),
                    count: subject.containers.len(),
                });
            }
        }
        Ok(SubjectTable {
            source: self.source,
            subjects: self.subjects,
        })
    }

    fn inconsistent(
        &self,
        alias: EntityAlias,
        field: &'static str,
        first: &str,
        second: &str,
    ) -> IdentityError {
        IdentityError::InconsistentSubject {
            subject_source: self.source.clone(),
            alias,
            field,
            first: first.to_string(),
            second: second.to_string(),
        }
    }
}

/// Column names locating subjects and memberships in their TSV files.
#[derive(Debug, Clone, Copy)]
pub struct SubjectColumns<'a> {
    pub alias: &'a str,
    pub id: &'a str,
    pub natural_key: &'a str,
    pub membership_alias: &'a str,
    pub container: &'a str,
}

/// Reads a subject table from TSV. Subjects and memberships may share a file.
pub fn load_subject_table(
    source: SourceId,
    subjects_path: &Path,
    membership_path: &Path,
    columns: SubjectColumns<'_>,
    single_container: bool,
) -> Result<SubjectTable> {
    let mut builder = SubjectTableBuilder::new(source).single_container(single_container);

    let subjects = read_tsv(subjects_path)?;
    let indices = subjects.require_columns(&[columns.alias, columns.id, columns.natural_key])?;
    for row in 0..subjects.len() {
        let raw_alias = subjects.value(row, indices[0]);
        if raw_alias.trim().is_empty() {
            continue;
        }
        builder.add_subject(
            EntityAlias::new(raw_alias)?,
            subjects.value(row, indices[1]),
            subjects.value(row, indices[2]),
        )?;
    }

    let membership = if membership_path == subjects_path {
        subjects
    } else {
        read_tsv(membership_path)?
    };
    let indices = membership.require_columns(&[columns.membership_alias, columns.container])?;
    for row in 0..membership.len() {
        let raw_alias = membership.value(row, indices[0]);
        if raw_alias.trim().is_empty() {
            continue;
        }
        let alias = EntityAlias::new(raw_alias)?;
        if !builder.add_membership(&alias, membership.value(row, indices[1])) {
            return Err(IdentityError::UnknownMember {
                subject_source: builder.source.clone(),
                alias,
                path: membership_path.to_path_buf(),
            });
        }
    }

    let table = builder.build()?;
    debug!(
        source = %table.source,
        subjects = table.len(),
        "loaded subject table"
    );
    Ok(table)
}
