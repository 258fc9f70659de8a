//! Grouping of entity-keyed records prior to merging.

use std::collections::HashMap;

use cda_model::{Fields, MergePolicy};

use crate::engine::{Contributions, merge_fields_level};
use crate::error::{MergeError, Result};

/// All contributions collected for one entity key.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    pub key: String,
    pub contributions: Contributions,
    /// Contributor labels in the order they were first seen.
    pub arrival: Vec<String>,
}

impl EntityGroup {
    pub fn contributor_count(&self) -> usize {
        self.contributions.len()
    }

    /// Passes a single contribution through unchanged, otherwise merges.
    pub fn resolve(self, policy: &MergePolicy, hierarchy: &[String]) -> Fields {
        if self.contributions.len() == 1 {
            if let Some(fields) = self.contributions.into_values().next() {
                return fields;
            }
            return Fields::new();
        }
        merge_fields_level(&self.contributions, policy, hierarchy)
    }
}

/// Collects records into groups; keys keep first-seen order.
#[derive(Debug, Default)]
pub struct GroupBuilder {
    index: HashMap<String, usize>,
    groups: Vec<EntityGroup>,
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one contribution; a second record from the same contributor for
    /// the same key is fatal.
    pub fn insert(&mut self, key: &str, contributor: &str, fields: Fields) -> Result<()> {
        let position = match self.index.get(key) {
            Some(position) => *position,
            None => {
                self.groups.push(EntityGroup {
                    key: key.to_string(),
                    contributions: Contributions::new(),
                    arrival: Vec::new(),
                });
                let position = self.groups.len() - 1;
                self.index.insert(key.to_string(), position);
                position
            }
        };
        let group = &mut self.groups[position];
        if group.contributions.contains_key(contributor) {
            return Err(MergeError::DuplicateEntity {
                entity_id: key.to_string(),
                contributor: contributor.to_string(),
            });
        }
        group.arrival.push(contributor.to_string());
        group.contributions.insert(contributor.to_string(), fields);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn finish(self) -> Vec<EntityGroup> {
        self.groups
    }
}
