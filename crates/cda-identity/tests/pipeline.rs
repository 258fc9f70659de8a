use std::fs;
use std::path::Path;

use cda_identity::{IdentityConfig, read_canonical_table, run_closure, run_matches};
use cda_ingest::WorkspaceLayout;
use cda_model::SourceId;

const CONFIG: &str = "
sources:
  gdc:
    subjects: cda_tsvs/gdc/subject.tsv
    single_container: true
  pdc:
    subjects: cda_tsvs/pdc/subject.tsv
    membership: cda_tsvs/pdc/subject_study.tsv
    container_column: pdc_study_id
matches:
  - source: pdc
    into: gdc
    equivalence: auxiliary_metadata/pdc_gdc_projects.tsv
    source_column: pdc_study_id
    into_column: gdc_project_id
closure:
  order: [gdc, pdc]
  output: cda_tsvs/merged_subjects.tsv
";

fn write(root: &Path, relative: &str, rows: &[&[&str]]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    let text: String = rows.iter().map(|row| format!("{}\n", row.join("\t"))).collect();
    fs::write(path, text).expect("write fixture");
}

fn fixture(root: &Path) {
    write(
        root,
        "cda_tsvs/gdc/subject.tsv",
        &[
            &["subject_alias", "subject_id", "submitter_id", "project_id"],
            &["g0", "gdc-uuid-1", "TCGA-01", "TCGA-BRCA"],
            &["g1", "gdc-uuid-2", "TCGA-02", "TCGA-BRCA"],
        ],
    );
    write(
        root,
        "cda_tsvs/pdc/subject.tsv",
        &[
            &["subject_alias", "subject_id", "submitter_id"],
            &["p0", "pdc-1", "TCGA-01"],
            &["p1", "pdc-9", "CPTAC-9"],
        ],
    );
    write(
        root,
        "cda_tsvs/pdc/subject_study.tsv",
        &[
            &["subject_alias", "pdc_study_id"],
            &["p0", "PDC000173"],
            &["p1", "PDC000120"],
        ],
    );
    write(
        root,
        "auxiliary_metadata/pdc_gdc_projects.tsv",
        &[
            &["pdc_study_id", "gdc_project_id"],
            &["PDC000173", "TCGA-BRCA"],
        ],
    );
}

#[test]
fn match_and_close_from_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    fixture(dir.path());
    let layout = WorkspaceLayout::new(dir.path());
    let config = IdentityConfig::parse(CONFIG, Path::new("identity.yml")).expect("config");

    let stage = run_matches(&config, &layout).expect("matches");
    assert_eq!(stage.matches.len(), 1);
    let matches = fs::read_to_string(layout.cda_tsvs().join("gdc_pdc_subject_matches.tsv"))
        .expect("match output");
    insta::assert_snapshot!(matches.trim_end(), @r"
gdc_subject_alias	gdc_subject_id	pdc_subject_alias	pdc_subject_id
g0	gdc-uuid-1	p0	pdc-1
");

    let closure = run_closure(&config, &layout, &stage)
        .expect("closure")
        .expect("closure configured");
    assert_eq!(closure.canonical.entity_count(), 3);
    let written = fs::read_to_string(layout.cda_tsvs().join("merged_subjects.tsv"))
        .expect("closure output");
    insta::assert_snapshot!(written.trim_end(), @r"
source	subject_alias	subject_id	new_subject_alias	new_subject_id
gdc	g0	gdc-uuid-1	g0	gdc-uuid-1
gdc	g1	gdc-uuid-2	g1	gdc-uuid-2
pdc	p0	pdc-1	g0	gdc-uuid-1
pdc	p1	pdc-9	p1	pdc-9
");

    let reread = read_canonical_table(&layout.cda_tsvs().join("merged_subjects.tsv"))
        .expect("reread closure");
    let pdc = SourceId::new("pdc").expect("source id");
    assert_eq!(reread.canonical_id(&pdc, "pdc-1"), Some("gdc-uuid-1"));
    assert_eq!(reread.canonical_id(&pdc, "pdc-9"), Some("pdc-9"));
}

#[test]
fn missing_required_column_aborts() {
    let dir = tempfile::tempdir().expect("temp dir");
    fixture(dir.path());
    write(
        dir.path(),
        "cda_tsvs/gdc/subject.tsv",
        &[&["subject_alias", "subject_id", "project_id"], &["g0", "gdc-uuid-1", "TCGA-BRCA"]],
    );
    let layout = WorkspaceLayout::new(dir.path());
    let config = IdentityConfig::parse(CONFIG, Path::new("identity.yml")).expect("config");

    let err = run_matches(&config, &layout).unwrap_err();
    assert!(err.to_string().contains("required column \"submitter_id\" missing"));
}

#[test]
fn closure_table_with_repeated_subject_id_is_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("merged_subjects.tsv");
    fs::write(
        &path,
        "source\tsubject_alias\tsubject_id\tnew_subject_alias\tnew_subject_id\n\
         gdc\tg0\tgdc-uuid-1\tg0\tgdc-uuid-1\n\
         pdc\tp0\tpdc-1\tg0\tgdc-uuid-1\n\
         pdc\tp3\tpdc-1\tp3\tpdc-1\n",
    )
    .expect("write closure");

    let err = read_canonical_table(&path).unwrap_err();
    assert_eq!(
        err.to_string(),
        "pdc subject id \"pdc-1\" appears twice in the closure table (aliases p0 and p3)"
    );
}
