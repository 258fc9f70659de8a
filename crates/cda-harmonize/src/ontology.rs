//! Ontology term tables (Disease Ontology, UBERON).
//!
//! Terms come from OBO files or from two-column `id`/`name` TSVs. Only the
//! parts harmonization needs are read: term ids, names and obsolescence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use cda_ingest::read_tsv;
use tracing::debug;

use crate::error::{HarmonizeError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyTerm {
    pub name: String,
    pub obsolete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OntologyTerms {
    path: PathBuf,
    terms: HashMap<String, OntologyTerm>,
}

impl OntologyTerms {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            terms: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&mut self, id: &str, term: OntologyTerm) {
        self.terms.insert(id.trim().to_string(), term);
    }

    pub fn get(&self, id: &str) -> Option<&OntologyTerm> {
        self.terms.get(id.trim())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Loads an ontology, choosing the parser by file extension.
pub fn load_ontology(path: &Path) -> Result<OntologyTerms> {
    let is_obo = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("obo"));
    let terms = if is_obo {
        let text = fs::read_to_string(path).map_err(|source| HarmonizeError::OntologyIo {
            path: path.to_path_buf(),
            source,
        })?;
        parse_obo(&text, path)?
    } else {
        let table = read_tsv(path)?;
        let indices = table.require_columns(&["id", "name"])?;
        let mut terms = OntologyTerms::new(path);
        for row in 0..table.len() {
            let id = table.value(row, indices[0]).trim();
            if id.is_empty() {
                continue;
            }
            terms.insert(
                id,
                OntologyTerm {
                    name: table.value(row, indices[1]).trim().to_string(),
                    obsolete: false,
                },
            );
        }
        terms
    };
    debug!(path = %path.display(), terms = terms.len(), "loaded ontology");
    Ok(terms)
}

#[derive(Default)]
struct Stanza {
    id: Option<String>,
    name: String,
    obsolete: bool,
}

impl Stanza {
    fn flush(&mut self, terms: &mut OntologyTerms) {
        let stanza = std::mem::take(self);
        if let Some(id) = stanza.id {
            terms.insert(
                &id,
                OntologyTerm {
                    name: stanza.name,
                    obsolete: stanza.obsolete,
                },
            );
        }
    }
}

/// Parses the `[Term]` stanzas of an OBO document.
pub fn parse_obo(text: &str, origin: &Path) -> Result<OntologyTerms> {
    let mut terms = OntologyTerms::new(origin);
    let mut current: Option<Stanza> = None;
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.starts_with('[') {
            if let Some(stanza) = current.as_mut() {
                stanza.flush(&mut terms);
            }
            current = (line == "[Term]").then(Stanza::default);
            continue;
        }
        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };
        let value = strip_trailing_modifiers(value.trim());
        match tag.trim() {
            "id" => {
                if stanza.id.is_some() {
                    return Err(HarmonizeError::MalformedOntology {
                        path: origin.to_path_buf(),
                        line: index + 1,
                        detail: "term stanza has two ids".to_string(),
                    });
                }
                stanza.id = Some(value.to_string());
            }
            "name" => stanza.name = value.to_string(),
            "is_obsolete" => stanza.obsolete = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }
    if let Some(stanza) = current.as_mut() {
        stanza.flush(&mut terms);
    }
    Ok(terms)
}

/// Drops OBO trailing modifiers (`{...}`) and comments (` ! ...`).
fn strip_trailing_modifiers(value: &str) -> &str {
    let value = value.split(" ! ").next().unwrap_or(value);
    match value.find(" {") {
        Some(position) if value.ends_with('}') => value[..position].trim_end(),
        _ => value.trim_end(),
    }
}
