use std::fs;

use cda_merge::{
    MergeError, MergeOptions, SourceStream, aggregate_records, load_merge_policy, merge_sources,
    rekey_records,
};
use cda_model::{FieldPolicy, Fields, MergePolicy, MergeType, SourceId};
use serde_json::{Value, json};
use tempfile::TempDir;

fn record(value: Value) -> Fields {
    value.as_object().cloned().expect("object")
}

fn patient_policy() -> MergePolicy {
    MergePolicy::new("Patient_merge")
        .with_field("id", FieldPolicy::new(MergeType::Coalesce, Value::Null))
        .with_field("sex", FieldPolicy::new(MergeType::Coalesce, Value::Null))
        .with_field(
            "Research_Subject",
            FieldPolicy::new(MergeType::AppendFieldVals, json!([])),
        )
        .with_field(
            "identifier",
            FieldPolicy::new(MergeType::AppendFieldVals, json!([])),
        )
}

fn source(label: &str) -> SourceId {
    label.parse().expect("source id")
}

#[test]
fn aggregates_one_patient_across_enrolments() {
    let records = vec![
        record(json!({
            "id": "P1",
            "sex": "",
            "identifier": [{"value": "P1", "system": "GDC"}],
            "Research_Subject": [{"id": "RS1", "project": "TCGA-BRCA"}],
        })),
        record(json!({"id": "P2", "sex": "male", "Research_Subject": [{"id": "RS9"}]})),
        record(json!({
            "id": "P1",
            "sex": "female",
            "identifier": [{"value": "P1", "system": "GDC"}],
            "Research_Subject": [{"id": "RS2", "project": "CPTAC-3"}],
        })),
    ];

    let (output, summary) = aggregate_records(records, &patient_policy()).unwrap();
    assert_eq!(summary.input_records, 3);
    assert_eq!(summary.output_records, 2);
    assert_eq!(summary.merged_entities, 1);

    let p1 = &output[0];
    assert_eq!(p1["id"], json!("P1"));
    assert_eq!(p1["sex"], json!("female"));
    assert_eq!(
        p1["Research_Subject"],
        json!([
            {"id": "RS1", "project": "TCGA-BRCA"},
            {"id": "RS2", "project": "CPTAC-3"}
        ])
    );
    assert_eq!(p1["identifier"].as_array().map(Vec::len), Some(2));
    // P2 only appeared once and passes through as-is.
    assert_eq!(output[1], record(json!({"id": "P2", "sex": "male", "Research_Subject": [{"id": "RS9"}]})));
}

#[test]
fn aggregate_rejects_repeated_enrolment() {
    let records = vec![
        record(json!({"id": "P1", "Research_Subject": [{"id": "RS1"}]})),
        record(json!({"id": "P1", "Research_Subject": [{"id": "RS1"}]})),
    ];
    let err = aggregate_records(records, &patient_policy()).unwrap_err();
    assert!(matches!(err, MergeError::DuplicateEntity { .. }));
}

#[test]
fn merges_two_sources_by_id() {
    let gdc = SourceStream::new(
        source("gdc"),
        vec![
            record(json!({"id": "X", "sex": "", "identifier": [{"system": "GDC", "value": "X"}]})),
            record(json!({"id": "G", "sex": "male"})),
        ],
    );
    let pdc = SourceStream::new(
        source("pdc"),
        vec![
            record(json!({"id": "P", "sex": "female"})),
            record(json!({"id": "X", "sex": "female", "identifier": [{"system": "PDC", "value": "X"}]})),
        ],
    );

    let options = MergeOptions::new(["gdc", "pdc"]).with_progress_every(1);
    let (output, summary) = merge_sources(vec![gdc, pdc], &patient_policy(), &options).unwrap();

    assert_eq!(summary.output_records, 3);
    assert_eq!(summary.merged_entities, 1);
    assert_eq!(summary.input_records["gdc"], 2);
    let ids: Vec<&str> = output.iter().filter_map(|r| r["id"].as_str()).collect();
    assert_eq!(ids, vec!["X", "G", "P"]);
    assert_eq!(output[0]["sex"], json!("female"));
    assert_eq!(
        output[0]["identifier"],
        json!([{"system": "GDC", "value": "X"}, {"system": "PDC", "value": "X"}])
    );
}

#[test]
fn listing_a_source_twice_is_fatal() {
    let streams = vec![
        SourceStream::new(source("gdc"), Vec::new()),
        SourceStream::new(source("GDC"), Vec::new()),
    ];
    let err = merge_sources(streams, &patient_policy(), &MergeOptions::new(["gdc"])).unwrap_err();
    assert!(matches!(err, MergeError::DuplicateSource(label) if label == "gdc"));
}

#[test]
fn records_without_id_are_fatal() {
    let streams = vec![SourceStream::new(source("gdc"), vec![record(json!({"sex": "male"}))])];
    let err = merge_sources(streams, &patient_policy(), &MergeOptions::new(["gdc"])).unwrap_err();
    assert_eq!(err.to_string(), "record 0 from gdc has no string id");
}

#[test]
fn rekeying_joins_matched_entities() {
    let mut pdc = SourceStream::new(
        source("pdc"),
        vec![
            record(json!({"id": "pdc-uuid", "sex": "female"})),
            record(json!({"id": "pdc-only", "sex": "male"})),
        ],
    );
    let summary = rekey_records(&mut pdc, |source, id| {
        (source.as_str() == "pdc" && id == "pdc-uuid").then(|| "gdc-uuid".to_string())
    });
    assert_eq!(summary.rekeyed, 1);
    assert_eq!(summary.unmapped, 1);

    let gdc = SourceStream::new(source("gdc"), vec![record(json!({"id": "gdc-uuid", "sex": ""}))]);
    let (output, summary) =
        merge_sources(vec![gdc, pdc], &patient_policy(), &MergeOptions::new(["gdc", "pdc"]))
            .unwrap();
    assert_eq!(summary.merged_entities, 1);
    assert_eq!(output[0]["id"], json!("gdc-uuid"));
    assert_eq!(output[0]["sex"], json!("female"));
    assert_eq!(output[1]["id"], json!("pdc-only"));
}

#[test]
fn records_rekeyed_onto_one_id_fold_in_source_order() {
    let mut pdc = SourceStream::new(
        source("pdc"),
        vec![
            record(json!({
                "id": "pdc-1",
                "sex": "",
                "identifier": [{"system": "PDC", "value": "pdc-1"}],
                "study": "CPTAC-3",
            })),
            record(json!({"id": "pdc-solo", "sex": "female"})),
            record(json!({
                "id": "pdc-2",
                "sex": "male",
                "identifier": [{"system": "PDC", "value": "pdc-2"}],
                "study": "CPTAC-2",
            })),
        ],
    );
    rekey_records(&mut pdc, |_, id| match id {
        "pdc-solo" => Some(id.to_string()),
        _ => Some("gdc-1".to_string()),
    });
    assert_eq!(
        pdc.rekeyed_from,
        vec![Some("pdc-1".to_string()), None, Some("pdc-2".to_string())]
    );

    let gdc = SourceStream::new(source("gdc"), vec![record(json!({"id": "gdc-1", "sex": ""}))]);
    // A per-field override names sources, not the records inside one.
    let policy = patient_policy().with_field(
        "sex",
        FieldPolicy::new(MergeType::Coalesce, Value::Null).with_hierarchy(["pdc", "gdc"]),
    );
    let (output, summary) =
        merge_sources(vec![gdc, pdc], &policy, &MergeOptions::new(["gdc", "pdc"])).unwrap();

    assert_eq!(summary.input_records["pdc"], 3);
    assert_eq!(summary.output_records, 2);
    assert_eq!(summary.merged_entities, 1);
    assert_eq!(summary.collapsed_entities, 1);
    assert_eq!(output[0]["id"], json!("gdc-1"));
    assert_eq!(output[0]["sex"], json!("male"));
    assert_eq!(
        output[0]["identifier"],
        json!([{"system": "PDC", "value": "pdc-1"}, {"system": "PDC", "value": "pdc-2"}])
    );
    assert_eq!(output[0]["Research_Subject"], json!([]));
    assert_eq!(output[1], record(json!({"id": "pdc-solo", "sex": "female"})));
}

#[test]
fn collapsed_record_keeps_fields_outside_the_policy() {
    let mut pdc = SourceStream::new(
        source("pdc"),
        vec![
            record(json!({"id": "pdc-1", "sex": "", "study": "CPTAC-3"})),
            record(json!({"id": "pdc-2", "sex": "male", "study": "CPTAC-2"})),
        ],
    );
    rekey_records(&mut pdc, |_, _| Some("case-1".to_string()));
    let (output, summary) =
        merge_sources(vec![pdc], &patient_policy(), &MergeOptions::new(["pdc"])).unwrap();

    assert_eq!(summary.merged_entities, 0);
    assert_eq!(summary.collapsed_entities, 1);
    assert_eq!(
        output,
        vec![record(json!({"id": "case-1", "sex": "male", "study": "CPTAC-3"}))]
    );
}

#[test]
fn repeated_id_within_a_source_is_fatal() {
    let streams = vec![SourceStream::new(
        source("gdc"),
        vec![
            record(json!({"id": "gdc-1", "sex": "male"})),
            record(json!({"id": "gdc-1", "sex": "female"})),
        ],
    )];
    let err = merge_sources(streams, &patient_policy(), &MergeOptions::new(["gdc"])).unwrap_err();
    assert_eq!(err.to_string(), "entity gdc-1 appears twice under gdc");

    let mut pdc = SourceStream::new(
        source("pdc"),
        vec![
            record(json!({"id": "pdc-1"})),
            record(json!({"id": "pdc-1"})),
        ],
    );
    rekey_records(&mut pdc, |_, _| Some("gdc-1".to_string()));
    let err = merge_sources(vec![pdc], &patient_policy(), &MergeOptions::new(["pdc"])).unwrap_err();
    assert_eq!(err.to_string(), "entity pdc-1 appears twice under pdc");
}

#[test]
fn loads_named_policy_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("merge.yml");
    fs::write(
        &path,
        "Patient_merge:\n  sex:\n    merge_type: coalesce\nFile_merge:\n  size:\n    merge_type: coalesce\n",
    )
    .unwrap();

    let policy = load_merge_policy(&path, "Patient_merge").unwrap();
    assert_eq!(policy.entity, "Patient_merge");
    assert_eq!(policy.len(), 1);

    let err = load_merge_policy(&path, "Specimen_merge").unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge policy has no section \"Specimen_merge\" (available: File_merge, Patient_merge)"
    );
}

#[test]
fn missing_policy_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let err = load_merge_policy(&dir.path().join("absent.yml"), "Patient_merge").unwrap_err();
    assert!(matches!(err, MergeError::PolicyIo { .. }));
}
