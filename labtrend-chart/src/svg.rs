//! Standalone SVG rendering of an observation series.
//!
//! The browser build draws through yew instead; this writer exists for
//! native use, where the chart lands in a file.

use std::fmt::Write;

use labtrend_core::{ChartError, ChartMargins, ObservationSeries};

use crate::{monotone_path, normal_band, scaled_points, LinearScale, PlotArea, TimeScale, DOT_RADIUS};

const X_TICKS: usize = 6;
const Y_TICKS: usize = 8;
const TICK_LENGTH: f64 = 6.0;

const STYLES: &str = "\
  .line { fill: none; stroke: steelblue; stroke-width: 2; }\n\
  .dot { fill: steelblue; stroke: white; }\n\
  .normal_range_rect { fill: lightsteelblue; fill-opacity: 0.35; }\n\
  .normal_range_line { stroke: gray; stroke-width: 1; }\n\
  .axis { stroke: #333; stroke-width: 1; }\n\
  .tick_label { font: 11px sans-serif; fill: #333; }\n\
  .title_text { font: 16px sans-serif; text-anchor: middle; }";

/// Render the series as a self-contained SVG document.
///
/// Fails with [`ChartError::MissingData`] when the series has nothing to
/// plot; callers hide the display location in that case.
pub fn render_svg(
    series: &ObservationSeries,
    viewport_width: f64,
    viewport_height: f64,
) -> Result<String, ChartError> {
    let Some((start, end)) = series.time_extent() else {
        return Err(ChartError::MissingData);
    };

    let area = PlotArea::from_viewport(viewport_width, viewport_height, ChartMargins::default());
    let x_scale = TimeScale::new((start, end), area.width);
    let y_scale = LinearScale::for_series(series, area.height);
    let points = scaled_points(series, &x_scale, &y_scale);

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}">"#,
        area.outer_width(),
        area.outer_height(),
    );
    let _ = writeln!(out, "<style>\n{STYLES}\n</style>");
    let _ = writeln!(
        out,
        r#"<g transform="translate({:.0},{:.0})">"#,
        area.margins.left, area.margins.top,
    );

    write_band(&mut out, series, &y_scale, &area);
    write_axes(&mut out, &x_scale, &y_scale, &area);

    let _ = writeln!(
        out,
        r#"<path class="line" d="{}"/>"#,
        monotone_path(&points)
    );
    for (x, y) in &points {
        let _ = writeln!(
            out,
            r#"<circle class="dot" cx="{x:.2}" cy="{y:.2}" r="{DOT_RADIUS}"/>"#,
        );
    }

    let _ = writeln!(
        out,
        r#"<text class="title_text" x="{:.2}" y="{:.2}">{}</text>"#,
        area.width / 2.0,
        -area.margins.top / 2.0,
        escape_text(&series.title),
    );

    out.push_str("</g>\n</svg>\n");
    Ok(out)
}

fn write_band(out: &mut String, series: &ObservationSeries, y_scale: &LinearScale, area: &PlotArea) {
    let Some(band) = normal_band(series.normal_range, y_scale, area) else {
        return;
    };

    let _ = writeln!(
        out,
        r#"<rect class="normal_range_rect" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/>"#,
        band.x, band.y, band.width, band.height,
    );
    for boundary in [band.min_line, band.max_line].into_iter().flatten() {
        let _ = writeln!(
            out,
            r#"<line class="normal_range_line" x1="0" x2="{:.2}" y1="{boundary:.2}" y2="{boundary:.2}"/>"#,
            area.width,
        );
    }
}

fn write_axes(out: &mut String, x_scale: &TimeScale, y_scale: &LinearScale, area: &PlotArea) {
    let _ = writeln!(
        out,
        r#"<line class="axis" x1="0" x2="{:.2}" y1="{:.2}" y2="{:.2}"/>"#,
        area.width, area.height, area.height,
    );
    for tick in x_scale.ticks(X_TICKS) {
        let x = x_scale.position(tick);
        let _ = writeln!(
            out,
            r#"<line class="axis" x1="{x:.2}" x2="{x:.2}" y1="{:.2}" y2="{:.2}"/>"#,
            area.height,
            area.height + TICK_LENGTH,
        );
        let _ = writeln!(
            out,
            r#"<text class="tick_label" x="{x:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
            area.height + TICK_LENGTH + 12.0,
            tick.format("%e %b %Y"),
        );
    }

    let _ = writeln!(
        out,
        r#"<line class="axis" x1="0" x2="0" y1="0" y2="{:.2}"/>"#,
        area.height,
    );
    for tick in y_scale.ticks(Y_TICKS) {
        let y = y_scale.position(tick);
        let _ = writeln!(
            out,
            r#"<line class="axis" x1="{:.2}" x2="0" y1="{y:.2}" y2="{y:.2}"/>"#,
            -TICK_LENGTH,
        );
        let _ = writeln!(
            out,
            r#"<text class="tick_label" x="{:.2}" y="{y:.2}" text-anchor="end" dominant-baseline="middle">{}</text>"#,
            -(TICK_LENGTH + 4.0),
            labtrend_core::format_numeric(tick),
        );
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
