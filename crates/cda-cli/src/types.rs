use std::path::PathBuf;

use cda_harmonize::{HarmonizationReport, SubstitutionReport};
use cda_identity::SourceClosureSummary;
use cda_merge::{AggregateSummary, MergeSummary, RekeySummary};
use cda_model::SourceId;

#[derive(Debug)]
pub struct AggregateResult {
    pub entity: String,
    pub output: PathBuf,
    pub summary: AggregateSummary,
}

#[derive(Debug)]
pub struct MergeResult {
    pub entity: String,
    pub output: PathBuf,
    pub hierarchy: Vec<String>,
    pub summary: MergeSummary,
    /// Present only when records were re-keyed through a closure table.
    pub rekeyed: Vec<(SourceId, RekeySummary)>,
}

/// One written pairwise match file.
#[derive(Debug)]
pub struct PairSummary {
    pub a_source: SourceId,
    pub b_source: SourceId,
    pub candidates: usize,
    pub matched: usize,
    pub output: PathBuf,
}

#[derive(Debug)]
pub struct MatchResult {
    pub pairs: Vec<PairSummary>,
}

#[derive(Debug)]
pub struct CloseResult {
    pub pairs: Vec<PairSummary>,
    pub sources: Vec<SourceClosureSummary>,
    pub subjects: usize,
    pub entities: usize,
    pub output: PathBuf,
}

#[derive(Debug)]
pub struct HarmonizeResult {
    pub reports: Vec<HarmonizationReport>,
    pub output_dir: PathBuf,
    /// Empty unless substitution ran.
    pub substitutions: Vec<SubstitutionReport>,
}
