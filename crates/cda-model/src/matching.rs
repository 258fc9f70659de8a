use serde::{Deserialize, Serialize};

use crate::{EntityAlias, SourceId};

/// Asserts that an alias in source A and an alias in source B denote the
/// same real-world entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairwiseMatch {
    pub a_alias: EntityAlias,
    pub a_id: String,
    pub b_alias: EntityAlias,
    pub b_id: String,
}

/// The canonical entity a per-source alias resolves to after closure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalAssignment {
    pub source: SourceId,
    pub subject_alias: EntityAlias,
    pub subject_id: String,
    pub new_subject_alias: EntityAlias,
    pub new_subject_id: String,
}

impl CanonicalAssignment {
    /// True when this alias is the representative of its own component.
    pub fn is_representative(&self) -> bool {
        self.subject_alias == self.new_subject_alias
    }
}
