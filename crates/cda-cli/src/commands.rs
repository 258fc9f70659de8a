use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use cda_harmonize::{HarmonizationConfig, apply_substitution, build_maps};
use cda_identity::{IdentityConfig, MatchStage, read_canonical_table, run_closure, run_matches};
use cda_ingest::{WorkspaceLayout, read_jsonl, write_jsonl};
use cda_merge::{
    MergeOptions, SourceStream, aggregate_records, load_merge_policy, merge_sources, rekey_records,
};

use crate::cli::{AggregateArgs, MergeArgs};
use crate::types::{
    AggregateResult, CloseResult, HarmonizeResult, MatchResult, MergeResult, PairSummary,
};

pub fn run_aggregate(args: &AggregateArgs) -> Result<AggregateResult> {
    let span = info_span!("aggregate", entity = %args.entity);
    let _guard = span.enter();
    let policy = load_merge_policy(&args.merge_file, &args.entity).context("load merge policy")?;
    let records = read_jsonl(&args.input)
        .with_context(|| format!("read records from {}", args.input.display()))?;
    let (merged, summary) = aggregate_records(records, &policy)
        .with_context(|| format!("aggregate {}", args.input.display()))?;
    write_jsonl(&args.output, &merged)
        .with_context(|| format!("write {}", args.output.display()))?;
    info!(output = %args.output.display(), records = merged.len(), "wrote aggregated records");
    Ok(AggregateResult {
        entity: args.entity.clone(),
        output: args.output.clone(),
        summary,
    })
}

pub fn run_merge(args: &MergeArgs) -> Result<MergeResult> {
    let span = info_span!("merge", entity = %args.entity);
    let _guard = span.enter();
    let named = args.named_sources().context("parse source names")?;
    if named.is_empty() {
        bail!("no input sources given (use --gdc, --pdc or --source NAME=FILE)");
    }
    let policy = load_merge_policy(&args.merge_file, &args.entity).context("load merge policy")?;

    let mut streams = Vec::with_capacity(named.len());
    for (source, path) in named {
        let records = read_jsonl(&path)
            .with_context(|| format!("read {source} records from {}", path.display()))?;
        streams.push(SourceStream::new(source, records));
    }

    let mut rekeyed = Vec::new();
    if let Some(path) = &args.canonical {
        let canonical = read_canonical_table(path)
            .with_context(|| format!("read closure table {}", path.display()))?;
        for stream in &mut streams {
            let summary = rekey_records(stream, |source, id| {
                canonical.canonical_id(source, id).map(str::to_string)
            });
            rekeyed.push((stream.source.clone(), summary));
        }
    }

    let hierarchy: Vec<String> = if args.hierarchy.is_empty() {
        streams.iter().map(|stream| stream.source.to_string()).collect()
    } else {
        args.hierarchy
            .iter()
            .map(|label| label.trim().to_lowercase())
            .collect()
    };
    let options = MergeOptions::new(hierarchy.iter().cloned());
    let (merged, summary) = merge_sources(streams, &policy, &options).context("merge sources")?;
    write_jsonl(&args.output, &merged)
        .with_context(|| format!("write {}", args.output.display()))?;
    info!(output = %args.output.display(), records = merged.len(), "wrote merged records");
    Ok(MergeResult {
        entity: args.entity.clone(),
        output: args.output.clone(),
        hierarchy,
        summary,
        rekeyed,
    })
}

fn load_identity_config(path: &Path) -> Result<IdentityConfig> {
    IdentityConfig::load(path).with_context(|| format!("load identity config {}", path.display()))
}

fn pair_summaries(config: &IdentityConfig, layout: &WorkspaceLayout, stage: &MatchStage) -> Vec<PairSummary> {
    config
        .matches
        .iter()
        .zip(&stage.matches)
        .map(|(match_config, found)| PairSummary {
            a_source: found.a_source.clone(),
            b_source: found.b_source.clone(),
            candidates: found.candidates,
            matched: found.len(),
            output: match_config.output_path(layout),
        })
        .collect()
}

pub fn run_match(layout: &WorkspaceLayout, config_path: &Path) -> Result<MatchResult> {
    let config = load_identity_config(config_path)?;
    let stage = run_matches(&config, layout).context("match subjects")?;
    Ok(MatchResult {
        pairs: pair_summaries(&config, layout, &stage),
    })
}

pub fn run_close(layout: &WorkspaceLayout, config_path: &Path) -> Result<CloseResult> {
    let config = load_identity_config(config_path)?;
    let Some(closure) = &config.closure else {
        bail!("{} has no closure section", config_path.display());
    };
    let output = layout.resolve(&closure.output);
    let stage = run_matches(&config, layout).context("match subjects")?;
    let Some(closed) = run_closure(&config, layout, &stage).context("build merge closure")? else {
        bail!("{} has no closure section", config_path.display());
    };
    Ok(CloseResult {
        pairs: pair_summaries(&config, layout, &stage),
        sources: closed.summaries,
        subjects: closed.canonical.len(),
        entities: closed.canonical.entity_count(),
        output,
    })
}

fn load_harmonization_config(path: &Path) -> Result<HarmonizationConfig> {
    HarmonizationConfig::load(path)
        .with_context(|| format!("load harmonization config {}", path.display()))
}

pub fn run_harmonize(layout: &WorkspaceLayout, config_path: &Path) -> Result<HarmonizeResult> {
    let config = load_harmonization_config(config_path)?;
    let stage = build_maps(&config, layout).context("build harmonization maps")?;
    Ok(HarmonizeResult {
        reports: stage.reports,
        output_dir: layout.resolve(&config.output_dir),
        substitutions: Vec::new(),
    })
}

pub fn run_apply_harmonization(
    layout: &WorkspaceLayout,
    config_path: &Path,
) -> Result<HarmonizeResult> {
    let config = load_harmonization_config(config_path)?;
    let stage = build_maps(&config, layout).context("build harmonization maps")?;
    let substitutions =
        apply_substitution(&config, layout, &stage).context("apply harmonization")?;
    Ok(HarmonizeResult {
        reports: stage.reports,
        output_dir: layout.resolve(&config.output_dir),
        substitutions,
    })
}
