use cda_identity::{ClosureBuilder, PairwiseMatches, SubjectTable, SubjectTableBuilder};
use cda_merge::{MergeOptions, SourceStream, merge_sources, rekey_records};
use cda_model::{EntityAlias, FieldPolicy, Fields, MergePolicy, MergeType, PairwiseMatch, SourceId};
use serde_json::{Value, json};

fn source(id: &str) -> SourceId {
    SourceId::new(id).expect("source id")
}

fn alias(value: &str) -> EntityAlias {
    EntityAlias::new(value).expect("alias")
}

fn subjects(id: &str, aliases: &[&str]) -> SubjectTable {
    let mut builder = SubjectTableBuilder::new(source(id));
    for subject in aliases {
        builder
            .add_subject(alias(subject), &format!("{subject}-id"), &format!("K-{subject}"))
            .expect("subject row");
        assert!(builder.add_membership(&alias(subject), "P"));
    }
    builder.build().expect("subject table")
}

fn pairs(a: &str, b: &str, rows: &[(&str, &str)]) -> PairwiseMatches {
    PairwiseMatches {
        a_source: source(a),
        b_source: source(b),
        matches: rows
            .iter()
            .map(|(a_alias, b_alias)| PairwiseMatch {
                a_alias: alias(a_alias),
                a_id: format!("{a_alias}-id"),
                b_alias: alias(b_alias),
                b_id: format!("{b_alias}-id"),
            })
            .collect(),
        candidates: rows.len(),
    }
}

fn record(value: Value) -> Fields {
    value.as_object().cloned().expect("object")
}

fn patient_policy() -> MergePolicy {
    MergePolicy::new("Patient_merge")
        .with_field("id", FieldPolicy::new(MergeType::Coalesce, Value::Null))
        .with_field("sex", FieldPolicy::new(MergeType::Coalesce, Value::Null))
        .with_field(
            "identifier",
            FieldPolicy::new(MergeType::AppendFieldVals, json!([])),
        )
}

#[test]
fn subjects_joined_through_different_routes_merge_into_one_patient() {
    let gdc = subjects("gdc", &["g1"]);
    let cds = subjects("cds", &["c1"]);
    let pdc = subjects("pdc", &["p1", "p2"]);

    let mut closure = ClosureBuilder::new();
    closure.merge_source(&gdc, &[]).expect("gdc");
    closure
        .merge_source(&cds, &[&pairs("gdc", "cds", &[("g1", "c1")])])
        .expect("cds");
    let summary = closure
        .merge_source(
            &pdc,
            &[
                &pairs("gdc", "pdc", &[("g1", "p1")]),
                &pairs("cds", "pdc", &[("c1", "p2")]),
            ],
        )
        .expect("pdc");
    assert_eq!(summary.joined, 2);
    let canonical = closure.finish().expect("closure table");
    assert_eq!(canonical.entity_count(), 1);

    let mut streams = vec![
        SourceStream::new(
            source("gdc"),
            vec![record(json!({"id": "g1-id", "sex": "", "identifier": [{"value": "g1"}]}))],
        ),
        SourceStream::new(source("cds"), vec![record(json!({"id": "c1-id", "sex": ""}))]),
        SourceStream::new(
            source("pdc"),
            vec![
                record(json!({"id": "p1-id", "sex": "", "identifier": [{"value": "p1"}]})),
                record(json!({"id": "p2-id", "sex": "male", "identifier": [{"value": "p2"}]})),
            ],
        ),
    ];
    for stream in &mut streams {
        let rekey = rekey_records(stream, |subject_source, id| {
            canonical.canonical_id(subject_source, id).map(str::to_string)
        });
        assert_eq!(rekey.unmapped, 0);
    }

    let (output, summary) = merge_sources(
        streams,
        &patient_policy(),
        &MergeOptions::new(["gdc", "cds", "pdc"]),
    )
    .expect("merge");
    assert_eq!(summary.output_records, 1);
    assert_eq!(summary.merged_entities, 1);
    assert_eq!(summary.collapsed_entities, 1);
    assert_eq!(
        output,
        vec![record(json!({
            "id": "g1-id",
            "sex": "male",
            "identifier": [{"value": "g1"}, {"value": "p1"}, {"value": "p2"}],
        }))]
    );
}
