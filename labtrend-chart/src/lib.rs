//! Chart geometry for the observation plots.
//!
//! Scales, ticks, path interpolation, band geometry, and hit-testing are
//! computed here as plain data, so the same math backs the yew SVG
//! component and the native SVG writer.

use chrono::{Duration, NaiveDate};
use labtrend_core::{ChartMargins, NormalRange, ObservationSeries};

pub mod svg;

/// Vertical headroom added above the largest observation value.
pub const Y_HEADROOM: f64 = 50.0;

/// Radius of an observation dot, also the hover hit radius.
pub const DOT_RADIUS: f64 = 5.0;

/// Inner plot rectangle once margins are taken out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub width: f64,
    pub height: f64,
    pub margins: ChartMargins,
}

impl PlotArea {
    /// Carve the drawing area out of a viewport. The chart occupies 80%
    /// of the viewport in each direction, margins included.
    pub fn from_viewport(viewport_width: f64, viewport_height: f64, margins: ChartMargins) -> Self {
        let width = (0.8 * viewport_width - margins.right - margins.left).max(1.0);
        let height = (0.8 * viewport_height - margins.top - margins.bottom).max(1.0);
        Self {
            width,
            height,
            margins,
        }
    }

    pub fn outer_width(&self) -> f64 {
        self.width + self.margins.left + self.margins.right
    }

    pub fn outer_height(&self) -> f64 {
        self.height + self.margins.top + self.margins.bottom
    }
}

/// Maps observation dates onto `[0, range]` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    start: NaiveDate,
    end: NaiveDate,
    range: f64,
}

impl TimeScale {
    pub fn new(domain: (NaiveDate, NaiveDate), range: f64) -> Self {
        let (start, end) = if domain.0 <= domain.1 {
            domain
        } else {
            (domain.1, domain.0)
        };
        Self { start, end, range }
    }

    /// Pixel position of a date. A single-day domain maps to the middle
    /// of the range.
    pub fn position(&self, date: NaiveDate) -> f64 {
        let span = (self.end - self.start).num_days();
        if span == 0 {
            return self.range / 2.0;
        }
        let offset = (date - self.start).num_days();
        offset as f64 / span as f64 * self.range
    }

    /// Up to `count` evenly spaced tick dates, endpoints included.
    pub fn ticks(&self, count: usize) -> Vec<NaiveDate> {
        let span = (self.end - self.start).num_days();
        if span == 0 || count < 2 {
            return vec![self.start];
        }
        let mut ticks = Vec::with_capacity(count);
        for step in 0..count {
            let offset = span as f64 * step as f64 / (count - 1) as f64;
            let tick = self.start + Duration::days(offset.round() as i64);
            if ticks.last() != Some(&tick) {
                ticks.push(tick);
            }
        }
        ticks
    }

    pub fn domain(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }
}

/// Maps `[0, max]` values onto `[range, 0]` pixels, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    max: f64,
    range: f64,
}

impl LinearScale {
    pub fn new(max: f64, range: f64) -> Self {
        Self {
            max: max.max(f64::MIN_POSITIVE),
            range,
        }
    }

    /// Scale sized for a series: domain top is the largest value plus the
    /// headroom constant.
    pub fn for_series(series: &ObservationSeries, range: f64) -> Self {
        Self::new(series.value_max().unwrap_or(0.0) + Y_HEADROOM, range)
    }

    /// Pixel position of a value, clamped to the plot area.
    pub fn position(&self, value: f64) -> f64 {
        let clamped = value.clamp(0.0, self.max);
        self.range - clamped / self.max * self.range
    }

    /// Round-valued ticks from zero to the domain top, stepped on a
    /// 1/2/5 progression.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        if count == 0 {
            return Vec::new();
        }
        let step = nice_step(self.max / count as f64);
        let mut ticks = Vec::new();
        let mut value = 0.0;
        while value <= self.max + step * 1e-9 {
            ticks.push(value);
            value += step;
        }
        ticks
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let factor = if normalized > 5.0 {
        10.0
    } else if normalized > 2.0 {
        5.0
    } else if normalized > 1.0 {
        2.0
    } else {
        1.0
    };
    factor * magnitude
}

/// Project a series into scaled pixel coordinates, input order preserved.
pub fn scaled_points(
    series: &ObservationSeries,
    x_scale: &TimeScale,
    y_scale: &LinearScale,
) -> Vec<(f64, f64)> {
    series
        .data
        .iter()
        .map(|point| (x_scale.position(point.time), y_scale.position(point.value)))
        .collect()
}

/// SVG path through the points using monotone cubic interpolation
/// (Fritsch-Carlson tangents), so the line never overshoots between
/// samples.
pub fn monotone_path(points: &[(f64, f64)]) -> String {
    match points {
        [] => String::new(),
        [(x, y)] => format!("M{},{}", fmt(*x), fmt(*y)),
        [(x0, y0), (x1, y1)] => format!("M{},{}L{},{}", fmt(*x0), fmt(*y0), fmt(*x1), fmt(*y1)),
        _ => {
            let tangents = monotone_tangents(points);
            let mut path = format!("M{},{}", fmt(points[0].0), fmt(points[0].1));
            for i in 0..points.len() - 1 {
                let (x0, y0) = points[i];
                let (x1, y1) = points[i + 1];
                let dx = (x1 - x0) / 3.0;
                path.push_str(&format!(
                    "C{},{},{},{},{},{}",
                    fmt(x0 + dx),
                    fmt(y0 + tangents[i] * dx),
                    fmt(x1 - dx),
                    fmt(y1 - tangents[i + 1] * dx),
                    fmt(x1),
                    fmt(y1),
                ));
            }
            path
        }
    }
}

fn monotone_tangents(points: &[(f64, f64)]) -> Vec<f64> {
    let n = points.len();
    let mut secants = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let dx = points[i + 1].0 - points[i].0;
        let dy = points[i + 1].1 - points[i].1;
        secants.push(if dx.abs() < f64::EPSILON { 0.0 } else { dy / dx });
    }

    let mut tangents = vec![0.0; n];
    tangents[0] = secants[0];
    tangents[n - 1] = secants[n - 2];
    for i in 1..n - 1 {
        let prev = secants[i - 1];
        let next = secants[i];
        if prev * next <= 0.0 {
            tangents[i] = 0.0;
        } else {
            let candidate = (prev + next) / 2.0;
            let limit = 3.0 * prev.abs().min(next.abs());
            tangents[i] = candidate.clamp(-limit, limit);
        }
    }
    tangents
}

fn fmt(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    labtrend_core::format_numeric(rounded)
}

/// Shaded rectangle and boundary lines for a normal range, in plot
/// coordinates. An unbounded side clamps to the plot edge and carries no
/// boundary line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// y of the lower-bound line, when the range has a lower bound.
    pub min_line: Option<f64>,
    /// y of the upper-bound line, when the range has an upper bound.
    pub max_line: Option<f64>,
}

/// Geometry for the shaded normal band, or `None` when the range is open
/// on both sides.
pub fn normal_band(range: NormalRange, y_scale: &LinearScale, area: &PlotArea) -> Option<BandGeometry> {
    if range.is_open() {
        return None;
    }

    let top = range.max.map(|max| y_scale.position(max)).unwrap_or(0.0);
    let bottom = range
        .min
        .map(|min| y_scale.position(min))
        .unwrap_or(area.height);

    Some(BandGeometry {
        x: 0.0,
        y: top.min(bottom),
        width: area.width,
        height: (bottom - top).abs(),
        min_line: range.min.map(|min| y_scale.position(min)),
        max_line: range.max.map(|max| y_scale.position(max)),
    })
}

/// Index of the scaled point nearest to `(x, y)` within `radius`, for
/// tooltip hit-testing. Ties go to the earlier point.
pub fn nearest_point(scaled: &[(f64, f64)], x: f64, y: f64, radius: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, (px, py)) in scaled.iter().enumerate() {
        let distance = (px - x).powi(2) + (py - y).powi(2);
        if distance <= radius.powi(2) {
            match best {
                Some((_, current)) if current <= distance => {}
                _ => best = Some((index, distance)),
            }
        }
    }
    best.map(|(index, _)| index)
}
