//! Writing harmonized values back into tables.

use cda_ingest::TsvTable;

use crate::map::{HarmonizationMap, Substitution};
use crate::normalize::DeletionPatterns;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionStats {
    pub cells: usize,
    pub replaced: usize,
    pub deleted: usize,
    /// Cells left as-is because their value is not curated yet.
    pub unassigned: usize,
}

impl SubstitutionStats {
    pub fn absorb(&mut self, other: &SubstitutionStats) {
        self.cells += other.cells;
        self.replaced += other.replaced;
        self.deleted += other.deleted;
        self.unassigned += other.unassigned;
    }
}

/// Rewrites one column of a table in place.
pub fn substitute_column(
    table: &mut TsvTable,
    column: usize,
    map: &HarmonizationMap,
    deletion: &DeletionPatterns,
) -> SubstitutionStats {
    let mut stats = SubstitutionStats::default();
    for row in &mut table.rows {
        let Some(cell) = row.get_mut(column) else {
            continue;
        };
        stats.cells += 1;
        match map.substitute(cell, deletion) {
            Substitution::Deleted => {
                cell.clear();
                stats.deleted += 1;
            }
            Substitution::Mapped(text) => {
                if cell.as_str() != text {
                    *cell = text.to_string();
                }
                stats.replaced += 1;
            }
            Substitution::Unassigned => stats.unassigned += 1,
        }
    }
    stats
}
