//! Raw-value normalization and null-like deletion patterns.

use std::collections::BTreeSet;

/// Placeholder target for observed values nobody has curated yet.
pub const UNASSIGNED: &str = "__CDA_UNASSIGNED__";

/// Null-like values that carry no information, compared after normalization.
pub const DEFAULT_DELETION_PATTERNS: &[&str] = &[
    "",
    "-",
    "--",
    "n/a",
    "na",
    "nan",
    "none",
    "not applicable",
    "not available",
    "not reported",
    "not specified",
    "null",
    "unknown",
    "unk",
    "unspecified",
    "[discrepancy]",
    "[not applicable]",
    "[not available]",
    "[not evaluated]",
    "[not reported]",
    "[unknown]",
];

/// Normalizes a raw value for lookup: lower-cased, whitespace runs collapsed
/// to one space, trimmed.
///
/// # Examples
///
/// ```
/// use cda_harmonize::normalize_raw;
///
/// assert_eq!(normalize_raw("  Lung\tAdenocarcinoma "), "lung adenocarcinoma");
/// assert_eq!(normalize_raw("Not   Reported"), "not reported");
/// ```
pub fn normalize_raw(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when a value is empty or the unassigned placeholder.
pub fn is_unassigned(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == UNASSIGNED
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPatterns {
    patterns: BTreeSet<String>,
}

impl Default for DeletionPatterns {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_DELETION_PATTERNS
                .iter()
                .map(|pattern| (*pattern).to_string())
                .collect(),
        }
    }
}

impl DeletionPatterns {
    /// Adds configured patterns on top of the defaults.
    #[must_use]
    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns
            .extend(extra.into_iter().map(|pattern| normalize_raw(pattern.as_ref())));
        self
    }

    pub fn is_deleted(&self, value: &str) -> bool {
        self.patterns.contains(&normalize_raw(value))
    }

    /// Normalized values that survive deletion.
    pub fn retain<'a, I>(&self, values: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        values
            .into_iter()
            .map(normalize_raw)
            .filter(|value| !self.patterns.contains(value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_ignores_case_and_spacing() {
        let patterns = DeletionPatterns::default();
        assert!(patterns.is_deleted(" Not  Reported "));
        assert!(patterns.is_deleted("UNKNOWN"));
        assert!(patterns.is_deleted("[Not Available]"));
        assert!(patterns.is_deleted("   "));
        assert!(!patterns.is_deleted("Unknown primary site"));
    }

    #[test]
    fn extra_patterns_are_normalized() {
        let patterns = DeletionPatterns::default().with_extra(["Not Allowed To Collect"]);
        assert!(patterns.is_deleted("not allowed to collect"));
        assert_eq!(patterns.len(), DEFAULT_DELETION_PATTERNS.len() + 1);
    }

    #[test]
    fn placeholder_counts_as_unassigned() {
        assert!(is_unassigned(UNASSIGNED));
        assert!(is_unassigned(" "));
        assert!(!is_unassigned("Homo sapiens"));
    }
}
