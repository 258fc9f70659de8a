//! CDA ETL command-line driver.

use std::io::{self, IsTerminal};

use cda_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use cda_cli::commands::{
    run_aggregate, run_apply_harmonization, run_close, run_harmonize, run_match, run_merge,
};
use cda_cli::logging::{LogConfig, LogFormat, init_logging};
use cda_cli::summary::{
    print_aggregate_summary, print_close_summary, print_harmonize_summary, print_match_summary,
    print_merge_summary,
};
use cda_ingest::WorkspaceLayout;
use clap::{ColorChoice, Parser};
use tracing::level_filters::LevelFilter;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("FATAL: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let layout = WorkspaceLayout::discover(cli.root.as_deref());
    let outcome = match &cli.command {
        Command::Aggregate(args) => run_aggregate(args).map(|result| print_aggregate_summary(&result)),
        Command::Merge(args) => run_merge(args).map(|result| print_merge_summary(&result)),
        Command::Match(args) => {
            run_match(&layout, &args.config).map(|result| print_match_summary(&result))
        }
        Command::Close(args) => {
            run_close(&layout, &args.config).map(|result| print_close_summary(&result))
        }
        Command::Harmonize(args) => {
            run_harmonize(&layout, &args.config).map(|result| print_harmonize_summary(&result))
        }
        Command::ApplyHarmonization(args) => run_apply_harmonization(&layout, &args.config)
            .map(|result| print_harmonize_summary(&result)),
    };
    if let Err(error) = outcome {
        eprintln!("FATAL: {error:#}");
        std::process::exit(1);
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
