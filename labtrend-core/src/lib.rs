//! Core data model for lab observation charts and the patient banner.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Title used when a series carries no observations to plot.
pub const PLACEHOLDER_TITLE: &str = "No observations found";

/// Annotation shown when the record carries no note.
pub const DEFAULT_ANNOTATION: &str = "No Annotation";

/// Pixel margins reserved around the plot area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChartMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for ChartMargins {
    fn default() -> Self {
        Self {
            top: 50.0,
            right: 30.0,
            bottom: 30.0,
            left: 30.0,
        }
    }
}

/// Clinical reference range for a charted quantity.
///
/// A `None` side means the range is open in that direction; the chart
/// extends the shaded band to the plot edge instead of drawing a boundary
/// line there.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl NormalRange {
    /// Range bounded on both sides.
    pub fn bounded(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Range with a lower bound only.
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Interpret legacy bounds where any negative value marks a missing side.
    pub fn from_sentinel(min: f64, max: f64) -> Self {
        Self {
            min: (min >= 0.0).then_some(min),
            max: (max >= 0.0).then_some(max),
        }
    }

    /// True when neither side is bounded.
    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// A measured quantity ready for display. The value is rounded to two
/// decimal places on construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuantityDisplay {
    pub value: f64,
    pub unit: String,
}

impl QuantityDisplay {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: round_to(value, 2),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for QuantityDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_numeric(self.value), self.unit)
    }
}

/// One charted observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationPoint {
    pub value: f64,
    pub units: String,
    pub time: NaiveDate,
}

/// Plot-ready record for a single chart. Built fresh per render and handed
/// to the rendering call that consumes it; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationSeries {
    pub title: String,
    pub display_location: String,
    pub normal_range: NormalRange,
    pub data: Vec<ObservationPoint>,
}

impl ObservationSeries {
    pub fn new(
        title: impl Into<String>,
        display_location: impl Into<String>,
        normal_range: NormalRange,
        data: Vec<ObservationPoint>,
    ) -> Self {
        Self {
            title: title.into(),
            display_location: display_location.into(),
            normal_range,
            data,
        }
    }

    /// Placeholder record for a location with nothing to plot.
    pub fn empty(display_location: impl Into<String>) -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            display_location: display_location.into(),
            normal_range: NormalRange::default(),
            data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Earliest and latest observation dates, in input order-independent form.
    pub fn time_extent(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.data.iter().map(|p| p.time).min()?;
        let last = self.data.iter().map(|p| p.time).max()?;
        Some((first, last))
    }

    /// Largest observed value.
    pub fn value_max(&self) -> Option<f64> {
        self.data
            .iter()
            .map(|p| p.value)
            .fold(None, |acc, v| match acc {
                Some(current) if current >= v => Some(current),
                _ => Some(v),
            })
    }
}

/// Demographics assembled from a FHIR `Patient` for direct display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientCard {
    pub name: String,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
}

impl PatientCard {
    /// Fallback card used when the resource carries no usable name.
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
            gender: None,
            birth_date: None,
        }
    }
}

/// Latest lab values shown next to the charts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabPanel {
    pub total_cholesterol: Option<QuantityDisplay>,
    pub hdl: Option<QuantityDisplay>,
    pub ldl: Option<QuantityDisplay>,
    pub systolic: Option<QuantityDisplay>,
    pub diastolic: Option<QuantityDisplay>,
    pub note: String,
}

impl Default for LabPanel {
    fn default() -> Self {
        Self {
            total_cholesterol: None,
            hdl: None,
            ldl: None,
            systolic: None,
            diastolic: None,
            note: DEFAULT_ANNOTATION.to_string(),
        }
    }
}

/// Errors shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("input bundle is missing required data")]
    MissingData,
    #[error("could not read FHIR payload: {0}")]
    Parse(String),
    #[error("document element not found: {0}")]
    Dom(String),
    #[error("request failed: {0}")]
    Fetch(String),
}

/// Round to `digits` decimal places, half away from zero.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Format a number for display without trailing zero noise.
pub fn format_numeric(value: f64) -> String {
    if (value.fract() - 0.0).abs() < f64::EPSILON {
        format!("{value:.0}")
    } else if (value * 10.0).fract().abs() < f64::EPSILON {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_bounds_become_open_sides() {
        let range = NormalRange::from_sentinel(40.0, -1.0);
        assert_eq!(range.min, Some(40.0));
        assert_eq!(range.max, None);

        let range = NormalRange::from_sentinel(-1.0, -1.0);
        assert!(range.is_open());
    }

    #[test]
    fn non_negative_bounds_pass_through() {
        let range = NormalRange::from_sentinel(125.0, 200.0);
        assert_eq!(range.min, Some(125.0));
        assert_eq!(range.max, Some(200.0));

        let range = NormalRange::from_sentinel(0.0, 0.0);
        assert_eq!(range.min, Some(0.0));
        assert_eq!(range.max, Some(0.0));
    }

    #[test]
    fn quantity_display_rounds_and_trims() {
        assert_eq!(QuantityDisplay::new(189.9999, "mg/dL").to_string(), "190 mg/dL");
        assert_eq!(QuantityDisplay::new(54.128, "mg/dL").to_string(), "54.13 mg/dL");
        assert_eq!(QuantityDisplay::new(117.5, "mm[Hg]").to_string(), "117.5 mm[Hg]");
    }

    #[test]
    fn empty_series_uses_placeholder_title() {
        let series = ObservationSeries::empty("hdl_visualisation");
        assert_eq!(series.title, PLACEHOLDER_TITLE);
        assert!(series.is_empty());
        assert_eq!(series.time_extent(), None);
        assert_eq!(series.value_max(), None);
    }

    #[test]
    fn extent_spans_unordered_data() {
        let mk = |y, m, d, v| ObservationPoint {
            value: v,
            units: "mg/dL".to_string(),
            time: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        };
        let series = ObservationSeries::new(
            "Cholesterol (mg/dL) over time",
            "total_cholesterol_visualisation",
            NormalRange::bounded(125.0, 200.0),
            vec![mk(2024, 5, 1, 180.0), mk(2023, 11, 12, 154.0), mk(2024, 1, 3, 210.0)],
        );
        assert_eq!(
            series.time_extent(),
            Some((
                NaiveDate::from_ymd_opt(2023, 11, 12).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
            ))
        );
        assert_eq!(series.value_max(), Some(210.0));
    }
}
