use std::fs;

use labtrend_core::{NormalRange, DEFAULT_ANNOTATION};
use labtrend_fhir::{
    blood_pressure_component, collect_observations, lab_panel, loinc, next_link, prepare_series,
    quantity_value_and_unit, CodeIndex,
};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn load_bundle() -> Value {
    let raw = fs::read_to_string(fixture_path("lipid_bundle.json")).expect("fixture bundle");
    serde_json::from_str(&raw).expect("fixture bundle is valid JSON")
}

#[test]
fn cholesterol_series_matches_golden() {
    let bundle = load_bundle();
    let observations = collect_observations(&bundle).expect("bundle flattens");
    let index = CodeIndex::from_observations(&observations);

    let series = prepare_series(
        index.by_code(loinc::TOTAL_CHOLESTEROL),
        "total_cholesterol_visualisation",
        NormalRange::bounded(125.0, 200.0),
    );

    let actual = serde_json::to_value(&series).expect("series serializes");
    let expected: Value = serde_json::from_str(
        &fs::read_to_string(fixture_path("cholesterol_series.json")).expect("golden series"),
    )
    .expect("golden series is valid JSON");

    assert_eq!(actual, expected);
}

#[test]
fn panel_values_come_from_most_recent_observations() {
    let bundle = load_bundle();
    let observations = collect_observations(&bundle).expect("bundle flattens");
    assert_eq!(observations.len(), 8, "OperationOutcome entries are dropped");

    let index = CodeIndex::from_observations(&observations);
    let bp_group = index.by_code(loinc::BP_PANEL);

    let systolic = blood_pressure_component(bp_group, loinc::SYSTOLIC_BP).expect("systolic");
    let diastolic = blood_pressure_component(bp_group, loinc::DIASTOLIC_BP).expect("diastolic");
    assert_eq!(systolic.to_string(), "117.77 mm[Hg]");
    assert_eq!(diastolic.to_string(), "75.5 mm[Hg]");

    let hdl = index
        .by_code(loinc::HDL)
        .first()
        .and_then(quantity_value_and_unit)
        .expect("hdl");
    assert_eq!(hdl.to_string(), "52.3 mg/dL");

    let ldl = index
        .by_code(loinc::LDL)
        .first()
        .and_then(quantity_value_and_unit)
        .expect("ldl");
    assert_eq!(ldl.to_string(), "113.7 mg/dL");
}

#[test]
fn lab_panel_collects_every_display_value() {
    let bundle = load_bundle();
    let observations = collect_observations(&bundle).expect("bundle flattens");
    let index = CodeIndex::from_observations(&observations);

    let panel = lab_panel(&index);
    assert_eq!(
        panel.total_cholesterol.as_ref().map(ToString::to_string),
        Some("199.5 mg/dL".to_string())
    );
    assert_eq!(
        panel.hdl.as_ref().map(ToString::to_string),
        Some("52.3 mg/dL".to_string())
    );
    assert_eq!(
        panel.ldl.as_ref().map(ToString::to_string),
        Some("113.7 mg/dL".to_string())
    );
    assert_eq!(
        panel.systolic.as_ref().map(ToString::to_string),
        Some("117.77 mm[Hg]".to_string())
    );
    assert_eq!(
        panel.diastolic.as_ref().map(ToString::to_string),
        Some("75.5 mm[Hg]".to_string())
    );
    assert_eq!(panel.note, DEFAULT_ANNOTATION, "no annotation in the fixture");
}

#[test]
fn hdl_series_keeps_open_upper_bound() {
    let bundle = load_bundle();
    let observations = collect_observations(&bundle).expect("bundle flattens");
    let index = CodeIndex::from_observations(&observations);

    let series = prepare_series(
        index.by_code(loinc::HDL),
        "hdl_visualisation",
        NormalRange::from_sentinel(40.0, -1.0),
    );

    assert_eq!(series.title, "HDL Cholesterol (mg/dL) over time");
    assert_eq!(series.data.len(), 2);
    assert_eq!(series.normal_range.min, Some(40.0));
    assert_eq!(series.normal_range.max, None);
}

#[test]
fn single_page_bundle_has_no_next_link() {
    let bundle = load_bundle();
    assert_eq!(next_link(&bundle), None);
}
