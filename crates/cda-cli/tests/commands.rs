use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use cda_cli::cli::{Cli, Command, parse_named_source};
use cda_cli::commands::{run_aggregate, run_close, run_merge};
use cda_ingest::{WorkspaceLayout, read_jsonl};
use clap::Parser;
use serde_json::json;
use tempfile::TempDir;

const POLICY: &str = "\
Patient_merge:
  id:
    merge_type: coalesce
  sex:
    merge_type: coalesce
  Research_Subject:
    merge_type: append_field_vals
    default_value: []
";

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn named_source_needs_name_and_file() {
    let (source, path) = parse_named_source("IDC=idc.jsonl.gz").unwrap();
    assert_eq!(source.as_str(), "idc");
    assert_eq!(path, Path::new("idc.jsonl.gz"));

    assert!(parse_named_source("idc.jsonl").is_err());
    assert!(parse_named_source("idc=").is_err());
    assert!(parse_named_source("=idc.jsonl").is_err());
}

#[test]
fn merge_sources_follow_flag_order() {
    let cli = Cli::try_parse_from([
        "cda-etl",
        "merge",
        "merge.yml",
        "out.jsonl",
        "--source",
        "idc=idc.jsonl",
        "--pdc",
        "pdc.jsonl",
        "--gdc",
        "gdc.jsonl",
        "--hierarchy",
        "pdc,gdc",
    ])
    .unwrap();
    let Command::Merge(args) = cli.command else {
        panic!("expected merge");
    };
    let names: Vec<String> = args
        .named_sources()
        .unwrap()
        .into_iter()
        .map(|(source, _)| source.to_string())
        .collect();
    assert_eq!(names, ["gdc", "pdc", "idc"]);
    assert_eq!(args.hierarchy, ["pdc", "gdc"]);
    assert_eq!(args.entity, "Patient_merge");
}

#[test]
fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from(["cda-etl", "match", "identity.yml", "--root", "/data", "-v"])
        .unwrap();
    assert_eq!(cli.root.as_deref(), Some(Path::new("/data")));
    assert!(cli.verbosity.is_present());
}

#[test]
fn aggregate_writes_one_record_per_patient() {
    let dir = TempDir::new().unwrap();
    let policy = write(dir.path(), "merge.yml", POLICY);
    let input = write(
        dir.path(),
        "patients.jsonl",
        concat!(
            "{\"id\": \"P1\", \"sex\": \"\", \"Research_Subject\": [{\"id\": \"RS1\"}]}\n",
            "{\"id\": \"P1\", \"sex\": \"female\", \"Research_Subject\": [{\"id\": \"RS2\"}]}\n",
        ),
    );
    let output = dir.path().join("out").join("patients.jsonl.gz");

    let cli = Cli::try_parse_from([
        OsStr::new("cda-etl"),
        OsStr::new("aggregate"),
        policy.as_os_str(),
        input.as_os_str(),
        output.as_os_str(),
    ])
    .unwrap();
    let Command::Aggregate(args) = cli.command else {
        panic!("expected aggregate");
    };
    let result = run_aggregate(&args).unwrap();
    assert_eq!(result.summary.input_records, 2);
    assert_eq!(result.summary.merged_entities, 1);

    let records = read_jsonl(&output).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["sex"], json!("female"));
    assert_eq!(records[0]["Research_Subject"], json!([{"id": "RS1"}, {"id": "RS2"}]));
}

#[test]
fn merge_rekeys_through_closure_table() {
    let dir = TempDir::new().unwrap();
    let policy = write(dir.path(), "merge.yml", POLICY);
    let gdc = write(dir.path(), "gdc.jsonl", "{\"id\": \"g1\", \"sex\": \"\"}\n");
    let pdc = write(
        dir.path(),
        "pdc.jsonl",
        "{\"id\": \"p1\", \"sex\": \"male\"}\n{\"id\": \"p2\", \"sex\": \"female\"}\n",
    );
    let closure = write(
        dir.path(),
        "closure.tsv",
        "source\tsubject_alias\tsubject_id\tnew_subject_alias\tnew_subject_id\n\
         gdc\t1\tg1\t1\tg1\n\
         pdc\t7\tp1\t1\tg1\n",
    );
    let output = dir.path().join("merged.jsonl");

    let cli = Cli::try_parse_from([
        OsStr::new("cda-etl"),
        OsStr::new("merge"),
        policy.as_os_str(),
        output.as_os_str(),
        OsStr::new("--gdc"),
        gdc.as_os_str(),
        OsStr::new("--pdc"),
        pdc.as_os_str(),
        OsStr::new("--canonical"),
        closure.as_os_str(),
    ])
    .unwrap();
    let Command::Merge(args) = cli.command else {
        panic!("expected merge");
    };
    let result = run_merge(&args).unwrap();
    assert_eq!(result.hierarchy, ["gdc", "pdc"]);
    assert_eq!(result.summary.merged_entities, 1);
    assert_eq!(result.rekeyed.len(), 2);
    assert_eq!(result.rekeyed[1].1.unmapped, 1);

    let records = read_jsonl(&output).unwrap();
    let ids: Vec<&str> = records.iter().filter_map(|r| r["id"].as_str()).collect();
    assert_eq!(ids, ["g1", "p2"]);
    assert_eq!(records[0]["sex"], json!("male"));
}

#[test]
fn merge_folds_pdc_subjects_closed_onto_one_entity() {
    let dir = TempDir::new().unwrap();
    let policy = write(dir.path(), "merge.yml", POLICY);
    let gdc = write(dir.path(), "gdc.jsonl", "{\"id\": \"g1\", \"sex\": \"\"}\n");
    let pdc = write(
        dir.path(),
        "pdc.jsonl",
        concat!(
            "{\"id\": \"p1\", \"sex\": \"\", \"Research_Subject\": [{\"id\": \"RS1\"}]}\n",
            "{\"id\": \"p2\", \"sex\": \"female\", \"Research_Subject\": [{\"id\": \"RS2\"}]}\n",
        ),
    );
    let closure = write(
        dir.path(),
        "closure.tsv",
        "source\tsubject_alias\tsubject_id\tnew_subject_alias\tnew_subject_id\n\
         gdc\t1\tg1\t1\tg1\n\
         pdc\t7\tp1\t1\tg1\n\
         pdc\t8\tp2\t1\tg1\n",
    );
    let output = dir.path().join("merged.jsonl");

    let cli = Cli::try_parse_from([
        OsStr::new("cda-etl"),
        OsStr::new("merge"),
        policy.as_os_str(),
        output.as_os_str(),
        OsStr::new("--gdc"),
        gdc.as_os_str(),
        OsStr::new("--pdc"),
        pdc.as_os_str(),
        OsStr::new("--canonical"),
        closure.as_os_str(),
    ])
    .unwrap();
    let Command::Merge(args) = cli.command else {
        panic!("expected merge");
    };
    let result = run_merge(&args).unwrap();
    assert_eq!(result.summary.output_records, 1);
    assert_eq!(result.summary.collapsed_entities, 1);

    let records = read_jsonl(&output).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!("g1"));
    assert_eq!(records[0]["sex"], json!("female"));
    assert_eq!(records[0]["Research_Subject"], json!([{"id": "RS1"}, {"id": "RS2"}]));
}

#[test]
fn merge_without_sources_is_fatal() {
    let dir = TempDir::new().unwrap();
    let policy = write(dir.path(), "merge.yml", POLICY);
    let output = dir.path().join("merged.jsonl");
    let cli = Cli::try_parse_from([
        OsStr::new("cda-etl"),
        OsStr::new("merge"),
        policy.as_os_str(),
        output.as_os_str(),
    ])
    .unwrap();
    let Command::Merge(args) = cli.command else {
        panic!("expected merge");
    };
    let err = run_merge(&args).unwrap_err();
    assert!(format!("{err:#}").contains("no input sources"));
    assert!(!output.exists());
}

#[test]
fn fatal_errors_carry_context_chain() {
    let dir = TempDir::new().unwrap();
    let policy = write(dir.path(), "merge.yml", POLICY);
    let input = write(
        dir.path(),
        "patients.jsonl",
        "{\"id\": \"P1\", \"Research_Subject\": []}\n",
    );
    let cli = Cli::try_parse_from([
        OsStr::new("cda-etl"),
        OsStr::new("aggregate"),
        policy.as_os_str(),
        input.as_os_str(),
        dir.path().join("out.jsonl").as_os_str(),
    ])
    .unwrap();
    let Command::Aggregate(args) = cli.command else {
        panic!("expected aggregate");
    };
    let message = format!("{:#}", run_aggregate(&args).unwrap_err());
    assert!(message.starts_with("aggregate "), "{message}");
    assert!(message.contains("P1"), "{message}");
}

#[test]
fn close_requires_closure_section() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "identity.yml",
        "sources:\n  gdc:\n    subjects: gdc.tsv\n",
    );
    let layout = WorkspaceLayout::new(dir.path());
    let err = run_close(&layout, &config).unwrap_err();
    assert!(err.to_string().ends_with("has no closure section"));
}
