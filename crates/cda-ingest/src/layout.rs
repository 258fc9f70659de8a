//! Working-directory layout shared by every pipeline stage.

use std::path::{Path, PathBuf};

/// Environment variable for overriding the working-directory root.
pub const ROOT_ENV_VAR: &str = "CDA_ETL_ROOT";

/// Per-source transformed tables (`cda_tsvs/<source>/...`).
pub const CDA_TSVS_DIR: &str = "cda_tsvs";
/// Hand-curated maps and ontology files.
pub const AUXILIARY_METADATA_DIR: &str = "auxiliary_metadata";
/// Raw extraction dumps.
pub const EXTRACTED_DATA_DIR: &str = "extracted_data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Explicit root if given, else `CDA_ETL_ROOT`, else the current directory.
    pub fn discover(explicit: Option<&Path>) -> Self {
        if let Some(root) = explicit {
            return Self::new(root);
        }
        if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
            if !root.trim().is_empty() {
                return Self::new(root);
            }
        }
        Self::new(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cda_tsvs(&self) -> PathBuf {
        self.root.join(CDA_TSVS_DIR)
    }

    pub fn auxiliary_metadata(&self) -> PathBuf {
        self.root.join(AUXILIARY_METADATA_DIR)
    }

    pub fn extracted_data(&self) -> PathBuf {
        self.root.join(EXTRACTED_DATA_DIR)
    }

    /// Resolves a configured path: absolute paths pass through, relative
    /// paths are taken from the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_against_root() {
        let layout = WorkspaceLayout::new("/data/run");
        assert_eq!(
            layout.resolve(Path::new("cda_tsvs/gdc/subject.tsv")),
            PathBuf::from("/data/run/cda_tsvs/gdc/subject.tsv")
        );
        assert_eq!(layout.resolve(Path::new("/abs/x.tsv")), PathBuf::from("/abs/x.tsv"));
        assert_eq!(layout.cda_tsvs(), PathBuf::from("/data/run/cda_tsvs"));
    }

    #[test]
    fn explicit_root_wins() {
        let layout = WorkspaceLayout::discover(Some(Path::new("/explicit")));
        assert_eq!(layout.root(), Path::new("/explicit"));
    }
}
