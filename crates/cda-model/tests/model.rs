//! Tests for cda-model types.

use cda_model::{
    CanonicalAssignment, EntityAlias, FieldPolicy, MergePolicy, MergeType, ModelError, SourceId,
};
use serde_json::json;

#[test]
fn source_id_is_normalized() {
    let source = SourceId::new("  GDC ").expect("valid source");
    assert_eq!(source.as_str(), "gdc");
    assert_eq!(source, "gdc".parse::<SourceId>().unwrap());
}

#[test]
fn source_id_rejects_blank_and_spaced_values() {
    assert_eq!(
        SourceId::new("   "),
        Err(ModelError::InvalidSourceId("   ".to_string()))
    );
    assert!(SourceId::new("g dc").is_err());
}

#[test]
fn alias_keeps_case_but_trims() {
    let alias = EntityAlias::new(" GDC.program.ABC ").expect("alias");
    assert_eq!(alias.as_str(), "GDC.program.ABC");
    assert!(EntityAlias::new("").is_err());
}

#[test]
fn source_id_deserializes_through_validation() {
    let source: SourceId = serde_json::from_str("\"PDC\"").expect("deserialize");
    assert_eq!(source.as_str(), "pdc");
    assert!(serde_json::from_str::<SourceId>("\"\"").is_err());
}

#[test]
fn policy_serializes_merge_type_in_snake_case() {
    let policy = MergePolicy::new("Patient_merge").with_field(
        "coding",
        FieldPolicy::new(MergeType::AppendFieldVals, json!([])).with_hierarchy(["gdc", "pdc"]),
    );
    let value = serde_json::to_value(&policy).expect("serialize policy");
    assert_eq!(
        value["fields"]["coding"]["merge_type"],
        json!("append_field_vals")
    );
    assert_eq!(
        value["fields"]["coding"]["source_hierarchy"],
        json!(["gdc", "pdc"])
    );
}

#[test]
fn representative_assignment() {
    let alias = EntityAlias::new("GDC.subject.1").unwrap();
    let assignment = CanonicalAssignment {
        source: SourceId::new("gdc").unwrap(),
        subject_alias: alias.clone(),
        subject_id: "TCGA.TCGA-01".to_string(),
        new_subject_alias: alias,
        new_subject_id: "TCGA.TCGA-01".to_string(),
    };
    assert!(assignment.is_representative());
}
