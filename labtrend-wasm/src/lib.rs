//! JS bridge: SMART client bindings and the fetch -> shape -> render flow.
//!
//! The host page owns OAuth2 and transport through its SMART-on-FHIR
//! client library; this crate binds to that client object and drives the
//! chart pipeline with the data it hands back.

use labtrend_core::NormalRange;
use labtrend_fhir::{collect_observations, lab_panel, loinc, prepare_series, CodeIndex};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Chart placements and reference ranges for the plotted panels.
pub mod panels {
    /// Host-page container class for the total cholesterol chart.
    pub const TOTAL_CHOLESTEROL_LOCATION: &str = "total_cholesterol_visualisation";
    /// Host-page container class for the HDL chart.
    pub const HDL_LOCATION: &str = "hdl_visualisation";
    /// Desirable total cholesterol band, mg/dL.
    pub const TOTAL_CHOLESTEROL_RANGE: (f64, f64) = (125.0, 200.0);
    /// Desirable HDL floor, mg/dL; HDL has no upper bound.
    pub const HDL_MIN: f64 = 40.0;
}

#[derive(Deserialize)]
struct JsPlotOptions {
    #[serde(default)]
    display_location: Option<String>,
    #[serde(default)]
    normal_min: Option<f64>,
    #[serde(default)]
    normal_max: Option<f64>,
}

struct PlotOptions {
    display_location: String,
    normal_range: NormalRange,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            display_location: "observation_visualisation".to_string(),
            normal_range: NormalRange::default(),
        }
    }
}

impl From<JsPlotOptions> for PlotOptions {
    fn from(options: JsPlotOptions) -> Self {
        let mut base = PlotOptions::default();
        if let Some(location) = options.display_location {
            base.display_location = location;
        }
        // Legacy callers mark a missing bound with -1.
        base.normal_range = NormalRange::from_sentinel(
            options.normal_min.unwrap_or(-1.0),
            options.normal_max.unwrap_or(-1.0),
        );
        base
    }
}

/// Shape a fetched searchset bundle into the plot-input record for one
/// LOINC code. Host pages that fetch observations themselves call this and
/// hand the result to `mount_observation_chart`.
#[wasm_bindgen]
pub fn prepare_plot_series(
    bundle: JsValue,
    code: &str,
    options: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundle_value = from_value::<serde_json::Value>(bundle)
        .map_err(|err| JsValue::from_str(&format!("could not read JSON bundle: {err}")))?;

    let options = match options {
        Some(js_options) => {
            let options: JsPlotOptions = from_value(js_options)
                .map_err(|err| JsValue::from_str(&format!("could not read options: {err}")))?;
            PlotOptions::from(options)
        }
        None => PlotOptions::default(),
    };

    let observations = collect_observations(&bundle_value)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    let index = CodeIndex::from_observations(&observations);
    let series = prepare_series(
        index.by_code(code),
        &options.display_location,
        options.normal_range,
    );

    to_value(&series)
        .map_err(|err| JsValue::from_str(&format!("could not serialize series: {err}")))
}

/// Extract the latest lab-panel values (pressures, HDL, LDL, cholesterol)
/// from a fetched searchset bundle.
#[wasm_bindgen]
pub fn summarize_lab_panel(bundle: JsValue) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundle_value = from_value::<serde_json::Value>(bundle)
        .map_err(|err| JsValue::from_str(&format!("could not read JSON bundle: {err}")))?;

    let observations = collect_observations(&bundle_value)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    let index = CodeIndex::from_observations(&observations);

    to_value(&lab_panel(&index))
        .map_err(|err| JsValue::from_str(&format!("could not serialize panel: {err}")))
}

/// Relative search path the app requests for one patient's panel codes.
#[wasm_bindgen]
pub fn panel_query(patient_id: &str) -> String {
    labtrend_fhir::observation_query(patient_id, &loinc::PANEL_CODES)
}

#[cfg(target_arch = "wasm32")]
mod smart {
    use labtrend_core::ChartError;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    #[wasm_bindgen]
    extern "C" {
        /// Authorized SMART-on-FHIR client object provided by the host
        /// page's client library.
        pub type SmartClient;

        #[wasm_bindgen(method)]
        fn request(this: &SmartClient, path: &str) -> js_sys::Promise;

        #[wasm_bindgen(method, getter)]
        fn patient(this: &SmartClient) -> SmartPatient;

        pub type SmartPatient;

        #[wasm_bindgen(method, getter)]
        fn id(this: &SmartPatient) -> String;

        #[wasm_bindgen(js_namespace = ["FHIR", "oauth2"], js_name = ready)]
        fn oauth2_ready() -> js_sys::Promise;
    }

    impl SmartClient {
        pub fn patient_id(&self) -> String {
            self.patient().id()
        }
    }

    /// Resolve the client library's authorization handshake.
    pub async fn ready() -> Result<SmartClient, JsValue> {
        let client = JsFuture::from(oauth2_ready()).await?;
        Ok(client.unchecked_into::<SmartClient>())
    }

    /// One request through the client, decoded into JSON.
    pub async fn request_json(
        client: &SmartClient,
        path: &str,
    ) -> Result<serde_json::Value, ChartError> {
        let response = JsFuture::from(client.request(path))
            .await
            .map_err(|err| ChartError::Fetch(format!("{err:?}")))?;
        serde_wasm_bindgen::from_value(response)
            .map_err(|err| ChartError::Parse(err.to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
mod app {
    use labtrend_core::{ChartError, NormalRange};
    use labtrend_fhir::{
        collect_observations, lab_panel, loinc, next_link, observation_query, patient_card,
        prepare_series, CodeIndex,
    };
    use labtrend_ui as ui;
    use serde_json::Value;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{console, Document};

    use crate::panels;
    use crate::smart::{self, SmartClient};

    /// Entry point for the host page: runs the whole authorize -> fetch ->
    /// shape -> render flow. Any rejection in the chain is caught here and
    /// logged; there is no retry.
    #[wasm_bindgen]
    pub fn run_app() {
        console_error_panic_hook::set_once();
        spawn_local(async {
            if let Err(err) = run().await {
                console::error_1(&err);
            }
        });
    }

    async fn run() -> Result<(), JsValue> {
        let client = smart::ready().await?;
        let patient_id = client.patient_id();
        let document = document()?;

        let patient = smart::request_json(&client, &format!("Patient/{patient_id}"))
            .await
            .map_err(to_js)?;
        ui::render_patient_banner(&document, &patient_card(&patient)).map_err(to_js)?;

        let query = observation_query(&patient_id, &loinc::PANEL_CODES);
        let observations = fetch_all_observations(&client, &query).await.map_err(to_js)?;
        let index = CodeIndex::from_observations(&observations);

        ui::render_lab_panel(&document, &lab_panel(&index)).map_err(to_js)?;

        let (min, max) = panels::TOTAL_CHOLESTEROL_RANGE;
        let cholesterol = prepare_series(
            index.by_code(loinc::TOTAL_CHOLESTEROL),
            panels::TOTAL_CHOLESTEROL_LOCATION,
            NormalRange::bounded(min, max),
        );
        ui::mount_series(&document, cholesterol).map_err(to_js)?;

        let hdl = prepare_series(
            index.by_code(loinc::HDL),
            panels::HDL_LOCATION,
            NormalRange::at_least(panels::HDL_MIN),
        );
        ui::mount_series(&document, hdl).map_err(to_js)?;

        Ok(())
    }

    /// Show the host page's medication list.
    #[wasm_bindgen]
    pub fn display_medications(medications: JsValue) -> Result<(), JsValue> {
        let medications: Vec<String> = serde_wasm_bindgen::from_value(medications)
            .map_err(|err| JsValue::from_str(&format!("could not read medications: {err}")))?;

        let document = document()?;
        for medication in &medications {
            ui::append_medication(&document, medication).map_err(to_js)?;
        }
        Ok(())
    }

    /// Follow `next` links until the search is exhausted, flattening every
    /// page into one observation list. Pages are requested sequentially,
    /// matching the client library's own paging behavior.
    async fn fetch_all_observations(
        client: &SmartClient,
        first_page: &str,
    ) -> Result<Vec<Value>, ChartError> {
        let mut path = first_page.to_string();
        let mut observations = Vec::new();
        loop {
            let bundle = smart::request_json(client, &path).await?;
            observations.extend(collect_observations(&bundle)?);
            match next_link(&bundle) {
                Some(next) => path = next.to_string(),
                None => break,
            }
        }
        Ok(observations)
    }

    fn document() -> Result<Document, JsValue> {
        web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("could not access document"))
    }

    fn to_js(err: ChartError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
pub use app::{display_medications, run_app};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_open_range() {
        let options = PlotOptions::from(JsPlotOptions {
            display_location: None,
            normal_min: None,
            normal_max: None,
        });
        assert_eq!(options.display_location, "observation_visualisation");
        assert!(options.normal_range.is_open());
    }

    #[test]
    fn sentinel_options_open_one_side() {
        let options = PlotOptions::from(JsPlotOptions {
            display_location: Some("hdl_visualisation".to_string()),
            normal_min: Some(40.0),
            normal_max: Some(-1.0),
        });
        assert_eq!(options.display_location, "hdl_visualisation");
        assert_eq!(options.normal_range.min, Some(40.0));
        assert_eq!(options.normal_range.max, None);
    }
}
