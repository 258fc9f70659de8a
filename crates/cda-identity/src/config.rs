//! Identity pipeline configuration.
//!
//! ```yaml
//! sources:
//!   gdc:
//!     subjects: cda_tsvs/gdc/subject.tsv
//!     membership: cda_tsvs/gdc/subject_associated_project.tsv
//!     natural_key_column: submitter_id
//!     container_column: associated_project
//!     single_container: true
//!   pdc:
//!     subjects: cda_tsvs/pdc/subject.tsv
//! matches:
//!   - source: pdc
//!     into: gdc
//!     equivalence: auxiliary_metadata/pdc_gdc_project_map.tsv
//!     source_column: pdc_project_id
//!     into_column: gdc_project_id
//! closure:
//!   order: [gdc, pdc]
//!   output: cda_tsvs/merged_subjects.tsv
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cda_ingest::WorkspaceLayout;
use cda_model::SourceId;
use serde::Deserialize;

use crate::error::{IdentityError, Result};
use crate::subjects::SubjectColumns;

fn default_alias_column() -> String {
    "subject_alias".to_string()
}

fn default_id_column() -> String {
    "subject_id".to_string()
}

fn default_natural_key_column() -> String {
    "submitter_id".to_string()
}

fn default_container_column() -> String {
    "project_id".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectSourceConfig {
    pub subjects: PathBuf,
    /// Separate membership file; defaults to the subjects file.
    #[serde(default)]
    pub membership: Option<PathBuf>,
    #[serde(default = "default_alias_column")]
    pub alias_column: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_natural_key_column")]
    pub natural_key_column: String,
    /// Alias column of the membership file; defaults to `alias_column`.
    #[serde(default)]
    pub membership_alias_column: Option<String>,
    #[serde(default = "default_container_column")]
    pub container_column: String,
    #[serde(default)]
    pub single_container: bool,
}

impl SubjectSourceConfig {
    pub fn columns(&self) -> SubjectColumns<'_> {
        SubjectColumns {
            alias: &self.alias_column,
            id: &self.id_column,
            natural_key: &self.natural_key_column,
            membership_alias: self
                .membership_alias_column
                .as_deref()
                .unwrap_or(&self.alias_column),
            container: &self.container_column,
        }
    }

    pub fn membership_path(&self) -> &Path {
        self.membership.as_deref().unwrap_or(&self.subjects)
    }
}

/// One pairwise match: subjects of `source` matched into `into`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    pub source: SourceId,
    pub into: SourceId,
    pub equivalence: PathBuf,
    /// Equivalence column holding `source` containers.
    pub source_column: String,
    /// Equivalence column holding `into` containers.
    pub into_column: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl MatchConfig {
    /// Configured output, else `cda_tsvs/<into>_<source>_subject_matches.tsv`.
    pub fn output_path(&self, layout: &WorkspaceLayout) -> PathBuf {
        match &self.output {
            Some(path) => layout.resolve(path),
            None => layout
                .cda_tsvs()
                .join(format!("{}_{}_subject_matches.tsv", self.into, self.source)),
        }
    }

    /// True when this match links the two sources, in either direction.
    pub fn links(&self, left: &SourceId, right: &SourceId) -> bool {
        (&self.source == left && &self.into == right) || (&self.source == right && &self.into == left)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClosureConfig {
    pub order: Vec<SourceId>,
    /// Per-source route precedence; defaults to the most recently merged
    /// prior source first.
    #[serde(default)]
    pub precedence: BTreeMap<SourceId, Vec<SourceId>>,
    pub output: PathBuf,
}

impl ClosureConfig {
    /// Route precedence for the source at `position` in the closure order.
    pub fn precedence_for(&self, position: usize) -> Vec<SourceId> {
        let source = &self.order[position];
        match self.precedence.get(source) {
            Some(explicit) => explicit.clone(),
            None => self.order[..position].iter().rev().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub sources: BTreeMap<SourceId, SubjectSourceConfig>,
    #[serde(default)]
    pub matches: Vec<MatchConfig>,
    #[serde(default)]
    pub closure: Option<ClosureConfig>,
}

impl IdentityConfig {
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).map_err(|source| IdentityError::ConfigYaml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| IdentityError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn source(&self, id: &SourceId) -> Result<&SubjectSourceConfig> {
        self.sources
            .get(id)
            .ok_or_else(|| IdentityError::UnknownSource(id.clone()))
    }

    /// Every source named by a match or the closure must be declared.
    fn validate(&self) -> Result<()> {
        for config in &self.matches {
            self.source(&config.source)?;
            self.source(&config.into)?;
        }
        if let Some(closure) = &self.closure {
            if closure.order.is_empty() {
                return Err(IdentityError::EmptyClosureOrder);
            }
            for source in closure.order.iter().chain(closure.precedence.values().flatten()) {
                self.source(source)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r"
sources:
  gdc:
    subjects: cda_tsvs/gdc/subject.tsv
    single_container: true
  PDC:
    subjects: cda_tsvs/pdc/subject.tsv
    membership: cda_tsvs/pdc/subject_study.tsv
    membership_alias_column: alias
  cds:
    subjects: cda_tsvs/cds/subject.tsv
matches:
  - source: pdc
    into: gdc
    equivalence: auxiliary_metadata/pdc_gdc.tsv
    source_column: pdc
    into_column: gdc
closure:
  order: [gdc, pdc, cds]
  precedence:
    cds: [gdc, pdc]
  output: cda_tsvs/merged_subjects.tsv
";

    fn source(id: &str) -> SourceId {
        SourceId::new(id).unwrap()
    }

    #[test]
    fn parses_sources_with_defaults() {
        let config = IdentityConfig::parse(CONFIG, Path::new("identity.yml")).unwrap();
        let pdc = config.source(&source("pdc")).unwrap();
        assert_eq!(pdc.columns().membership_alias, "alias");
        assert_eq!(pdc.columns().natural_key, "submitter_id");
        assert_eq!(pdc.membership_path(), Path::new("cda_tsvs/pdc/subject_study.tsv"));

        let gdc = config.source(&source("gdc")).unwrap();
        assert!(gdc.single_container);
        assert_eq!(gdc.membership_path(), Path::new("cda_tsvs/gdc/subject.tsv"));
    }

    #[test]
    fn default_precedence_prefers_latest_prior() {
        let config = IdentityConfig::parse(CONFIG, Path::new("identity.yml")).unwrap();
        let closure = config.closure.unwrap();
        assert_eq!(closure.precedence_for(1), vec![source("gdc")]);
        assert_eq!(closure.precedence_for(2), vec![source("gdc"), source("pdc")]);

        let mut implicit = closure.clone();
        implicit.precedence.clear();
        assert_eq!(implicit.precedence_for(2), vec![source("pdc"), source("gdc")]);
    }

    #[test]
    fn default_match_output_lives_under_cda_tsvs() {
        let config = IdentityConfig::parse(CONFIG, Path::new("identity.yml")).unwrap();
        let layout = WorkspaceLayout::new("/data");
        assert_eq!(
            config.matches[0].output_path(&layout),
            PathBuf::from("/data/cda_tsvs/gdc_pdc_subject_matches.tsv")
        );
    }

    #[test]
    fn undeclared_source_is_rejected() {
        let text = "sources: {}\nmatches:\n  - {source: pdc, into: gdc, equivalence: e.tsv, source_column: a, into_column: b}\n";
        let err = IdentityConfig::parse(text, Path::new("identity.yml")).unwrap_err();
        assert_eq!(err.to_string(), "source pdc is not declared under `sources`");
    }
}
