//! CLI argument definitions for `cda-etl`.

use std::path::PathBuf;

use cda_model::SourceId;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

/// Merge policy section used when `--entity` is not given.
pub const DEFAULT_ENTITY: &str = "Patient_merge";

#[derive(Parser)]
#[command(
    name = "cda-etl",
    version,
    about = "CDA ETL merge core - merge, match and harmonize per-source records",
    long_about = "Merge per-source records into one entity each, resolve subject \
                  identity across sources, and build value harmonization maps.\n\n\
                  Relative paths inside configuration files resolve against --root, \
                  else CDA_ETL_ROOT, else the current directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Working-directory root holding cda_tsvs/, auxiliary_metadata/ and extracted_data/.
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Collapse one source's per-enrolment records into one record per entity.
    Aggregate(AggregateArgs),

    /// Merge several sources' records by entity id.
    Merge(MergeArgs),

    /// Run every configured pairwise subject match.
    Match(ConfigArgs),

    /// Run the matches and build the transitive merge closure.
    Close(ConfigArgs),

    /// Build harmonization maps for every configured concept.
    Harmonize(ConfigArgs),

    /// Build harmonization maps and rewrite the substitutable tables.
    ApplyHarmonization(ConfigArgs),
}

#[derive(Args)]
pub struct AggregateArgs {
    /// YAML merge policy file.
    #[arg(value_name = "MERGE_FILE")]
    pub merge_file: PathBuf,

    /// JSON-Lines input (gzip when the name ends in .gz).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// JSON-Lines output (gzip when the name ends in .gz).
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Merge policy section to apply.
    #[arg(long, default_value = DEFAULT_ENTITY)]
    pub entity: String,
}

#[derive(Args)]
pub struct MergeArgs {
    /// YAML merge policy file.
    #[arg(value_name = "MERGE_FILE")]
    pub merge_file: PathBuf,

    /// JSON-Lines output (gzip when the name ends in .gz).
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// GDC records.
    #[arg(long, value_name = "FILE")]
    pub gdc: Option<PathBuf>,

    /// PDC records.
    #[arg(long, value_name = "FILE")]
    pub pdc: Option<PathBuf>,

    /// Records of any other source (repeatable).
    #[arg(long = "source", value_name = "NAME=FILE", value_parser = parse_named_source)]
    pub sources: Vec<(SourceId, PathBuf)>,

    /// Source precedence, highest first (default: the order sources are given).
    #[arg(long, value_name = "SOURCES", value_delimiter = ',')]
    pub hierarchy: Vec<String>,

    /// Closure TSV used to re-key records to canonical ids before merging.
    #[arg(long, value_name = "CLOSURE_TSV")]
    pub canonical: Option<PathBuf>,

    /// Merge policy section to apply.
    #[arg(long, default_value = DEFAULT_ENTITY)]
    pub entity: String,
}

impl MergeArgs {
    /// Every named input, in the order `--gdc`, `--pdc`, then each `--source`.
    pub fn named_sources(&self) -> Result<Vec<(SourceId, PathBuf)>, cda_model::ModelError> {
        let mut named = Vec::new();
        if let Some(path) = &self.gdc {
            named.push((SourceId::new("gdc")?, path.clone()));
        }
        if let Some(path) = &self.pdc {
            named.push((SourceId::new("pdc")?, path.clone()));
        }
        named.extend(self.sources.iter().cloned());
        Ok(named)
    }
}

#[derive(Args)]
pub struct ConfigArgs {
    /// YAML configuration file.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Parses a `NAME=FILE` source argument.
pub fn parse_named_source(value: &str) -> Result<(SourceId, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=FILE, got {value:?}"))?;
    if path.trim().is_empty() {
        return Err(format!("no file given for source {name:?}"));
    }
    let source = SourceId::new(name).map_err(|error| error.to_string())?;
    Ok((source, PathBuf::from(path)))
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
