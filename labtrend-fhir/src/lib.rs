//! FHIR JSON to plot-ready lab series and display records.
//!
//! Everything here works on raw `serde_json::Value` resources as handed
//! over by the SMART client; no typed FHIR model is involved.

use std::collections::HashMap;

use chrono::NaiveDate;
use labtrend_core::{
    ChartError, LabPanel, NormalRange, ObservationPoint, ObservationSeries, PatientCard,
    QuantityDisplay,
};
use serde_json::Value;

/// LOINC codes for the lab panel.
pub mod loinc {
    /// Systolic blood pressure - LOINC 8480-6
    pub const SYSTOLIC_BP: &str = "8480-6";
    /// Diastolic blood pressure - LOINC 8462-4
    pub const DIASTOLIC_BP: &str = "8462-4";
    /// HDL cholesterol - LOINC 2085-9
    pub const HDL: &str = "2085-9";
    /// LDL cholesterol - LOINC 2089-1
    pub const LDL: &str = "2089-1";
    /// Combined blood pressure panel - LOINC 55284-4
    pub const BP_PANEL: &str = "55284-4";
    /// Triglycerides - LOINC 3141-9
    pub const TRIGLYCERIDES: &str = "3141-9";
    /// Total cholesterol - LOINC 2093-3
    pub const TOTAL_CHOLESTEROL: &str = "2093-3";

    /// LOINC coding system URL.
    pub const SYSTEM: &str = "http://loinc.org";

    /// Every code the app requests, in query order.
    pub const PANEL_CODES: [&str; 7] = [
        DIASTOLIC_BP,
        SYSTOLIC_BP,
        HDL,
        LDL,
        BP_PANEL,
        TRIGLYCERIDES,
        TOTAL_CHOLESTEROL,
    ];
}

/// Page size requested from the Observation search endpoint.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Build the Observation search path for one patient and a set of LOINC
/// codes. The transport itself stays with the SMART client; this only
/// assembles the relative URL it is asked to request.
pub fn observation_query(patient_id: &str, codes: &[&str]) -> String {
    let code_param = codes
        .iter()
        .map(|code| format!("{}|{code}", loinc::SYSTEM))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "Observation?patient={}&_count={}&_sort=-date&code={}",
        encode_component(patient_id),
        DEFAULT_PAGE_SIZE,
        encode_component(&code_param),
    )
}

/// Flatten a searchset `Bundle` into its observation resources.
///
/// Entries without a resource and `OperationOutcome` entries are skipped.
/// A bundle without an `entry` array is an empty result page, not an error.
pub fn collect_observations(bundle: &Value) -> Result<Vec<Value>, ChartError> {
    let bundle_type = bundle
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or(ChartError::MissingData)?;

    if bundle_type != "Bundle" {
        return Err(ChartError::Parse(format!(
            "Expected resourceType Bundle, received {bundle_type}"
        )));
    }

    let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut resources = Vec::new();
    for entry in entries {
        let Some(resource) = entry.get("resource") else {
            continue;
        };
        match resource
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
        {
            "OperationOutcome" => {}
            _ => resources.push(resource.clone()),
        }
    }

    Ok(resources)
}

/// URL of the next result page, if the server reports one.
pub fn next_link(bundle: &Value) -> Option<&str> {
    let links = bundle.get("link")?.as_array()?;
    links.iter().find_map(|link| {
        let relation = link.get("relation").and_then(Value::as_str)?;
        if relation == "next" {
            link.get("url").and_then(Value::as_str)
        } else {
            None
        }
    })
}

/// Observations grouped under every code their `code.coding` carries,
/// preserving input order within each group. This stands in for the SMART
/// client's `byCodes` helper so bundles cross the JS boundary once.
#[derive(Debug, Default)]
pub struct CodeIndex {
    groups: HashMap<String, Vec<Value>>,
}

impl CodeIndex {
    pub fn from_observations(observations: &[Value]) -> Self {
        let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
        for observation in observations {
            for code in coding_codes(observation) {
                groups
                    .entry(code)
                    .or_default()
                    .push(observation.clone());
            }
        }
        Self { groups }
    }

    /// Observations carrying `code`, in the order they arrived.
    pub fn by_code(&self, code: &str) -> &[Value] {
        self.groups.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Extract `valueQuantity` from an observation. Both the value and the
/// unit must be present; the value is rounded to two decimal places.
pub fn quantity_value_and_unit(observation: &Value) -> Option<QuantityDisplay> {
    let quantity = observation.get("valueQuantity")?;
    let value = quantity.get("value").and_then(Value::as_f64)?;
    let unit = quantity.get("unit").and_then(Value::as_str)?;
    Some(QuantityDisplay::new(value, unit))
}

/// Pull one pressure out of a group of combined blood-pressure
/// observations. Scans for the first observation with a `component` whose
/// coding matches `component_code` and extracts that component's quantity;
/// `None` when no component matches or the quantity is incomplete.
pub fn blood_pressure_component(
    observations: &[Value],
    component_code: &str,
) -> Option<QuantityDisplay> {
    let component = observations.iter().find_map(|observation| {
        observation
            .get("component")
            .and_then(Value::as_array)?
            .iter()
            .find(|component| component_matches_code(component, component_code))
    })?;

    let quantity = component.get("valueQuantity")?;
    let value = quantity.get("value").and_then(Value::as_f64)?;
    let unit = quantity.get("unit").and_then(Value::as_str)?;
    Some(QuantityDisplay::new(value, unit))
}

/// Shape an ordered group of observations into the plot-input record.
///
/// The title comes from the first observation's coded text and unit; an
/// empty group keeps the placeholder title and an empty data sequence.
/// Points lacking a usable quantity or effective date are skipped.
pub fn prepare_series(
    observations: &[Value],
    display_location: &str,
    normal_range: NormalRange,
) -> ObservationSeries {
    let mut series = ObservationSeries::empty(display_location);
    series.normal_range = normal_range;

    for observation in observations {
        let Some(quantity) = observation.get("valueQuantity") else {
            continue;
        };
        let Some(value) = quantity.get("value").and_then(Value::as_f64) else {
            continue;
        };
        let units = quantity
            .get("unit")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(time) = observation
            .get("effectiveDateTime")
            .and_then(Value::as_str)
            .and_then(parse_observation_date)
        else {
            continue;
        };

        if series.data.is_empty() {
            let label = observation
                .get("code")
                .and_then(extract_codeable_text)
                .unwrap_or_else(|| "Observation".to_string());
            series.title = format!("{label} ({units}) over time");
        }

        series.data.push(ObservationPoint { value, units, time });
    }

    series
}

/// Calendar date of an ISO datetime string; the time of day is discarded.
pub fn parse_observation_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Assemble the demographics banner record from a `Patient` resource.
///
/// Every listed name contributes its given parts and family name; multiple
/// names are joined with " / ". A patient without a usable name gets the
/// "anonymous" fallback.
pub fn patient_card(patient: &Value) -> PatientCard {
    let gender = patient
        .get("gender")
        .and_then(Value::as_str)
        .map(str::to_string);
    let birth_date = patient
        .get("birthDate")
        .and_then(Value::as_str)
        .map(str::to_string);

    let name = patient
        .get("name")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(format_human_name)
                .collect::<Vec<_>>()
                .join(" / ")
        })
        .filter(|joined| !joined.is_empty());

    match name {
        Some(name) => PatientCard {
            name,
            gender,
            birth_date,
        },
        None => PatientCard {
            gender,
            birth_date,
            ..PatientCard::anonymous()
        },
    }
}

/// Medication display names from statement/request resources.
pub fn medication_names(resources: &[Value]) -> Vec<String> {
    resources
        .iter()
        .filter(|resource| {
            matches!(
                resource
                    .get("resourceType")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
                "MedicationStatement" | "MedicationRequest"
            )
        })
        .filter_map(|resource| {
            resource
                .get("medicationCodeableConcept")
                .and_then(extract_codeable_text)
                .or_else(|| {
                    resource
                        .get("medicationReference")
                        .and_then(|reference| reference.get("display"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
        })
        .collect()
}

/// Assemble the lab panel from grouped observations: latest lipid values,
/// the two pressures broken out of the combined blood-pressure panel, and
/// the annotation attached to the newest cholesterol observation.
pub fn lab_panel(index: &CodeIndex) -> LabPanel {
    let bp_group = index.by_code(loinc::BP_PANEL);
    let cholesterol_group = index.by_code(loinc::TOTAL_CHOLESTEROL);

    let mut panel = LabPanel {
        total_cholesterol: cholesterol_group.first().and_then(quantity_value_and_unit),
        hdl: index.by_code(loinc::HDL).first().and_then(quantity_value_and_unit),
        ldl: index.by_code(loinc::LDL).first().and_then(quantity_value_and_unit),
        systolic: blood_pressure_component(bp_group, loinc::SYSTOLIC_BP),
        diastolic: blood_pressure_component(bp_group, loinc::DIASTOLIC_BP),
        ..LabPanel::default()
    };

    if let Some(note) = cholesterol_group.first().and_then(annotation_text) {
        panel.note = note;
    }

    panel
}

/// First annotation note attached to an observation.
pub fn annotation_text(observation: &Value) -> Option<String> {
    observation
        .get("note")
        .and_then(Value::as_array)
        .and_then(|notes| notes.first())
        .and_then(|note| note.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn format_human_name(name: &Value) -> Option<String> {
    let mut parts: Vec<String> = name
        .get("given")
        .and_then(Value::as_array)
        .map(|given| {
            given
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(family) = name.get("family").and_then(Value::as_str) {
        parts.push(family.to_string());
    }

    let full = parts.join(" ").trim().to_string();
    if full.is_empty() {
        None
    } else {
        Some(full)
    }
}

fn coding_codes(observation: &Value) -> Vec<String> {
    observation
        .get("code")
        .and_then(|code| code.get("coding"))
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .filter_map(|coding| coding.get("code").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn component_matches_code(component: &Value, code: &str) -> bool {
    component
        .get("code")
        .and_then(|value| value.get("coding"))
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .any(|coding| coding.get("code").and_then(Value::as_str) == Some(code))
        })
        .unwrap_or(false)
}

fn extract_codeable_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    if let Some(codings) = value.get("coding").and_then(Value::as_array) {
        for coding in codings {
            if let Some(display) = coding.get("display").and_then(Value::as_str) {
                if !display.trim().is_empty() {
                    return Some(display.trim().to_string());
                }
            }
            if let Some(code) = coding.get("code").and_then(Value::as_str) {
                if !code.trim().is_empty() {
                    return Some(code.trim().to_string());
                }
            }
        }
    }

    None
}

fn encode_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(code: &str, text: &str, value: f64, unit: &str, date: &str) -> Value {
        json!({
            "resourceType": "Observation",
            "code": {
                "coding": [{ "system": loinc::SYSTEM, "code": code }],
                "text": text
            },
            "valueQuantity": { "value": value, "unit": unit },
            "effectiveDateTime": date
        })
    }

    fn bp_observation(date: &str, systolic: Option<f64>, diastolic: Option<f64>) -> Value {
        let mut components = Vec::new();
        if let Some(value) = systolic {
            components.push(json!({
                "code": { "coding": [{ "system": loinc::SYSTEM, "code": loinc::SYSTOLIC_BP }] },
                "valueQuantity": { "value": value, "unit": "mm[Hg]" }
            }));
        }
        if let Some(value) = diastolic {
            components.push(json!({
                "code": { "coding": [{ "system": loinc::SYSTEM, "code": loinc::DIASTOLIC_BP }] },
                "valueQuantity": { "value": value, "unit": "mm[Hg]" }
            }));
        }
        json!({
            "resourceType": "Observation",
            "code": {
                "coding": [{ "system": loinc::SYSTEM, "code": loinc::BP_PANEL }],
                "text": "Blood pressure"
            },
            "component": components,
            "effectiveDateTime": date
        })
    }

    #[test]
    fn query_carries_patient_count_sort_and_codes() {
        let query = observation_query("smart-1642068", &[loinc::HDL, loinc::TOTAL_CHOLESTEROL]);
        assert_eq!(
            query,
            "Observation?patient=smart-1642068&_count=100&_sort=-date\
             &code=http%3A%2F%2Floinc.org%7C2085-9%2Chttp%3A%2F%2Floinc.org%7C2093-3"
        );
    }

    #[test]
    fn collect_skips_outcomes_and_tolerates_empty_pages() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                { "resource": { "resourceType": "OperationOutcome" } },
                { "fullUrl": "urn:uuid:no-resource" },
                { "resource": observation(loinc::HDL, "HDL", 52.0, "mg/dL", "2024-03-01") }
            ]
        });
        let resources = collect_observations(&bundle).unwrap();
        assert_eq!(resources.len(), 1);

        let empty_page = json!({ "resourceType": "Bundle", "type": "searchset" });
        assert!(collect_observations(&empty_page).unwrap().is_empty());

        let not_a_bundle = json!({ "resourceType": "Patient" });
        assert!(collect_observations(&not_a_bundle).is_err());
    }

    #[test]
    fn next_link_found_only_when_relation_matches() {
        let bundle = json!({
            "resourceType": "Bundle",
            "link": [
                { "relation": "self", "url": "https://fhir.example/Observation?page=1" },
                { "relation": "next", "url": "https://fhir.example/Observation?page=2" }
            ]
        });
        assert_eq!(
            next_link(&bundle),
            Some("https://fhir.example/Observation?page=2")
        );

        let last_page = json!({
            "resourceType": "Bundle",
            "link": [{ "relation": "self", "url": "https://fhir.example/Observation?page=2" }]
        });
        assert_eq!(next_link(&last_page), None);
    }

    #[test]
    fn code_index_groups_under_every_coding() {
        let multi_coded = json!({
            "resourceType": "Observation",
            "code": {
                "coding": [
                    { "system": loinc::SYSTEM, "code": loinc::TOTAL_CHOLESTEROL },
                    { "system": "urn:local", "code": "chol-total" }
                ]
            }
        });
        let observations = vec![
            observation(loinc::HDL, "HDL", 61.5, "mg/dL", "2024-01-10"),
            multi_coded,
            observation(loinc::HDL, "HDL", 58.0, "mg/dL", "2023-09-02"),
        ];
        let index = CodeIndex::from_observations(&observations);

        let hdl = index.by_code(loinc::HDL);
        assert_eq!(hdl.len(), 2);
        assert_eq!(
            hdl[0]["valueQuantity"]["value"].as_f64(),
            Some(61.5),
            "order within a group follows input order"
        );
        assert_eq!(index.by_code(loinc::TOTAL_CHOLESTEROL).len(), 1);
        assert_eq!(index.by_code("chol-total").len(), 1);
        assert!(index.by_code(loinc::LDL).is_empty());
    }

    #[test]
    fn quantity_requires_value_and_unit() {
        let complete = observation(loinc::LDL, "LDL", 101.333, "mg/dL", "2024-02-02");
        let display = quantity_value_and_unit(&complete).unwrap();
        assert_eq!(display.value, 101.33);
        assert_eq!(display.to_string(), "101.33 mg/dL");

        let unitless = json!({
            "resourceType": "Observation",
            "valueQuantity": { "value": 101.0 }
        });
        assert_eq!(quantity_value_and_unit(&unitless), None);
        assert_eq!(quantity_value_and_unit(&json!({})), None);
    }

    #[test]
    fn blood_pressure_takes_first_matching_component() {
        let group = vec![
            bp_observation("2024-04-01", Some(117.816), Some(75.2)),
            bp_observation("2023-12-01", Some(131.0), Some(84.0)),
        ];
        let systolic = blood_pressure_component(&group, loinc::SYSTOLIC_BP).unwrap();
        assert_eq!(systolic.to_string(), "117.82 mm[Hg]");

        let diastolic = blood_pressure_component(&group, loinc::DIASTOLIC_BP).unwrap();
        assert_eq!(diastolic.to_string(), "75.2 mm[Hg]");
    }

    #[test]
    fn blood_pressure_missing_component_is_none() {
        let group = vec![bp_observation("2024-04-01", Some(117.0), None)];
        assert_eq!(blood_pressure_component(&group, loinc::DIASTOLIC_BP), None);
        assert_eq!(blood_pressure_component(&[], loinc::SYSTOLIC_BP), None);
    }

    #[test]
    fn series_title_comes_from_first_observation() {
        let group = vec![
            observation(loinc::TOTAL_CHOLESTEROL, "Total Cholesterol", 184.0, "mg/dL", "2024-05-01"),
            observation(loinc::TOTAL_CHOLESTEROL, "Cholesterol [Mass/Vol]", 199.0, "mg/dL", "2023-11-12"),
        ];
        let series = prepare_series(&group, "total_cholesterol_visualisation", NormalRange::bounded(125.0, 200.0));
        assert_eq!(series.title, "Total Cholesterol (mg/dL) over time");
        assert_eq!(series.display_location, "total_cholesterol_visualisation");
        assert_eq!(series.data.len(), 2);
        assert_eq!(series.data[0].value, 184.0, "input order is preserved");
        assert_eq!(series.data[1].value, 199.0);
    }

    #[test]
    fn empty_group_keeps_placeholder_title() {
        let series = prepare_series(&[], "hdl_visualisation", NormalRange::at_least(40.0));
        assert_eq!(series.title, labtrend_core::PLACEHOLDER_TITLE);
        assert!(series.is_empty());
        assert_eq!(series.normal_range, NormalRange::at_least(40.0));
    }

    #[test]
    fn malformed_points_are_skipped() {
        let missing_date = json!({
            "resourceType": "Observation",
            "code": { "text": "HDL" },
            "valueQuantity": { "value": 55.0, "unit": "mg/dL" }
        });
        let group = vec![
            observation(loinc::HDL, "HDL", 61.0, "mg/dL", "2024-01-10"),
            missing_date,
            observation(loinc::HDL, "HDL", 58.0, "mg/dL", "not-a-date"),
        ];
        let series = prepare_series(&group, "hdl_visualisation", NormalRange::at_least(40.0));
        assert_eq!(series.data.len(), 1);
    }

    #[test]
    fn observation_dates_drop_time_of_day() {
        assert_eq!(
            parse_observation_date("2009-04-15T08:30:00.000Z"),
            NaiveDate::from_ymd_opt(2009, 4, 15)
        );
        assert_eq!(
            parse_observation_date("2009-04-15"),
            NaiveDate::from_ymd_opt(2009, 4, 15)
        );
        assert_eq!(parse_observation_date("April 2009"), None);
    }

    #[test]
    fn patient_names_join_given_family_and_aliases() {
        let patient = json!({
            "resourceType": "Patient",
            "name": [
                { "given": ["Daniel", "X"], "family": "Adams" },
                { "given": ["Dan"], "family": "Adams" }
            ],
            "gender": "male",
            "birthDate": "1925-12-23"
        });
        let card = patient_card(&patient);
        assert_eq!(card.name, "Daniel X Adams / Dan Adams");
        assert_eq!(card.gender.as_deref(), Some("male"));
        assert_eq!(card.birth_date.as_deref(), Some("1925-12-23"));
    }

    #[test]
    fn nameless_patient_is_anonymous() {
        let card = patient_card(&json!({ "resourceType": "Patient", "gender": "female" }));
        assert_eq!(card.name, "anonymous");
        assert_eq!(card.gender.as_deref(), Some("female"));
    }

    #[test]
    fn lab_panel_note_follows_latest_cholesterol() {
        let mut cholesterol =
            observation(loinc::TOTAL_CHOLESTEROL, "Total Cholesterol", 184.0, "mg/dL", "2024-05-01");
        cholesterol["note"] = json!([{ "text": "Fasting sample" }]);

        let index = CodeIndex::from_observations(&[cholesterol]);
        let panel = lab_panel(&index);
        assert_eq!(panel.note, "Fasting sample");
        assert_eq!(panel.hdl, None);
        assert_eq!(panel.systolic, None);
    }

    #[test]
    fn medication_names_prefer_codeable_concept() {
        let resources = vec![
            json!({
                "resourceType": "MedicationRequest",
                "medicationCodeableConcept": { "text": "Lisinopril 10 MG Oral Tablet" }
            }),
            json!({
                "resourceType": "MedicationStatement",
                "medicationReference": { "display": "Atorvastatin 20 MG" }
            }),
            json!({ "resourceType": "Observation" }),
        ];
        assert_eq!(
            medication_names(&resources),
            vec!["Lisinopril 10 MG Oral Tablet", "Atorvastatin 20 MG"]
        );
    }
}
