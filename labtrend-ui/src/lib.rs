//! Browser rendering of the observation charts and the patient banner.

#[cfg(target_arch = "wasm32")]
mod styles;

#[cfg(target_arch = "wasm32")]
mod wasm_ui {
    use crate::styles;
    use labtrend_chart::{
        monotone_path, normal_band, scaled_points, LinearScale, PlotArea, TimeScale, DOT_RADIUS,
    };
    use labtrend_core::{
        format_numeric, round_to, ChartError, ChartMargins, LabPanel, ObservationPoint,
        ObservationSeries, PatientCard, QuantityDisplay,
    };
    use serde_wasm_bindgen::from_value;
    use wasm_bindgen::prelude::*;
    use web_sys::{console, Document, Element, MouseEvent};
    use yew::prelude::*;

    /// Vertical distance between the cursor and the tooltip box.
    const TOOLTIP_OFFSET_Y: i32 = 50;

    const X_TICKS: usize = 6;
    const Y_TICKS: usize = 8;
    const TICK_LENGTH: f64 = 6.0;

    #[derive(Clone, PartialEq)]
    struct TooltipState {
        left: i32,
        top: i32,
        date_label: String,
        value_label: String,
    }

    #[derive(Properties, PartialEq)]
    pub struct ObservationChartProps {
        pub series: ObservationSeries,
        /// Viewport used to size the chart; falls back to the window size.
        #[prop_or_default]
        pub viewport: Option<(f64, f64)>,
    }

    #[function_component(ObservationChart)]
    pub fn observation_chart(props: &ObservationChartProps) -> Html {
        use_effect_with((), |_| {
            if let Some(document) = web_sys::window().and_then(|window| window.document()) {
                if let Err(err) = styles::ensure_styles(&document) {
                    console::error_1(&err);
                }
            }
            || ()
        });

        let tooltip = use_state(|| None::<TooltipState>);

        let series = &props.series;
        let Some(extent) = series.time_extent() else {
            console::log_1(&JsValue::from_str("undefined zero-data parameter passed"));
            return Html::default();
        };

        let (viewport_width, viewport_height) = props.viewport.unwrap_or_else(window_size);
        let area = PlotArea::from_viewport(viewport_width, viewport_height, ChartMargins::default());
        let x_scale = TimeScale::new(extent, area.width);
        let y_scale = LinearScale::for_series(series, area.height);
        let points = scaled_points(series, &x_scale, &y_scale);

        let on_leave = {
            let tooltip = tooltip.clone();
            Callback::from(move |_: MouseEvent| tooltip.set(None))
        };

        html! {
            <div class="observation-chart">
                <svg width={px(area.outer_width())} height={px(area.outer_height())}>
                    <g transform={format!("translate({},{})", area.margins.left, area.margins.top)}>
                        { render_band(series, &y_scale, &area) }
                        { render_x_axis(&x_scale, &area) }
                        { render_y_axis(&y_scale, &area) }
                        <path class="line" d={monotone_path(&points)} />
                        {
                            for series.data.iter().zip(points.iter()).map(|(point, (x, y))| {
                                render_dot(point, *x, *y, tooltip.clone(), on_leave.clone())
                            })
                        }
                        <text class="title_text" x={px(area.width / 2.0)} y={px(-area.margins.top / 2.0)}>
                            { series.title.clone() }
                        </text>
                    </g>
                </svg>
                { render_tooltip(&tooltip) }
            </div>
        }
    }

    fn window_size() -> (f64, f64) {
        let fallback = (1024.0, 768.0);
        let Some(window) = web_sys::window() else {
            return fallback;
        };
        let width = window
            .inner_width()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(fallback.0);
        let height = window
            .inner_height()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(fallback.1);
        (width, height)
    }

    fn render_band(series: &ObservationSeries, y_scale: &LinearScale, area: &PlotArea) -> Html {
        let Some(band) = normal_band(series.normal_range, y_scale, area) else {
            return Html::default();
        };

        html! {
            <>
                <rect
                    class="normal_range_rect"
                    x={px(band.x)}
                    y={px(band.y)}
                    width={px(band.width)}
                    height={px(band.height)}
                />
                {
                    for [band.min_line, band.max_line].into_iter().flatten().map(|boundary| html! {
                        <line
                            class="normal_range_line"
                            x1="0"
                            x2={px(area.width)}
                            y1={px(boundary)}
                            y2={px(boundary)}
                        />
                    })
                }
            </>
        }
    }

    fn render_x_axis(x_scale: &TimeScale, area: &PlotArea) -> Html {
        html! {
            <>
                <line class="axis" x1="0" x2={px(area.width)} y1={px(area.height)} y2={px(area.height)} />
                {
                    for x_scale.ticks(X_TICKS).into_iter().map(|tick| {
                        let x = x_scale.position(tick);
                        html! {
                            <>
                                <line class="axis" x1={px(x)} x2={px(x)} y1={px(area.height)} y2={px(area.height + TICK_LENGTH)} />
                                <text class="tick_label" x={px(x)} y={px(area.height + TICK_LENGTH + 12.0)} text-anchor="middle">
                                    { tick.format("%e %b %Y").to_string() }
                                </text>
                            </>
                        }
                    })
                }
            </>
        }
    }

    fn render_y_axis(y_scale: &LinearScale, area: &PlotArea) -> Html {
        html! {
            <>
                <line class="axis" x1="0" x2="0" y1="0" y2={px(area.height)} />
                {
                    for y_scale.ticks(Y_TICKS).into_iter().map(|tick| {
                        let y = y_scale.position(tick);
                        html! {
                            <>
                                <line class="axis" x1={px(-TICK_LENGTH)} x2="0" y1={px(y)} y2={px(y)} />
                                <text class="tick_label" x={px(-(TICK_LENGTH + 4.0))} y={px(y)} text-anchor="end" dominant-baseline="middle">
                                    { format_numeric(tick) }
                                </text>
                            </>
                        }
                    })
                }
            </>
        }
    }

    fn render_dot(
        point: &ObservationPoint,
        x: f64,
        y: f64,
        tooltip: UseStateHandle<Option<TooltipState>>,
        on_leave: Callback<MouseEvent>,
    ) -> Html {
        let date_label = point.time.format("%e %B %Y").to_string();
        let value_label = format!("{} {}", format_numeric(round_to(point.value, 3)), point.units);

        let onmouseover = Callback::from(move |event: MouseEvent| {
            tooltip.set(Some(TooltipState {
                left: event.page_x(),
                top: event.page_y() - TOOLTIP_OFFSET_Y,
                date_label: date_label.clone(),
                value_label: value_label.clone(),
            }));
        });

        html! {
            <circle
                class="dot"
                cx={px(x)}
                cy={px(y)}
                r={px(DOT_RADIUS)}
                onmouseover={onmouseover}
                onmouseout={on_leave}
            />
        }
    }

    fn render_tooltip(tooltip: &Option<TooltipState>) -> Html {
        match tooltip {
            Some(state) => html! {
                <div
                    class="tooltip is-visible"
                    style={format!("left:{}px;top:{}px", state.left, state.top)}
                >
                    { state.date_label.clone() }
                    <br />
                    { state.value_label.clone() }
                </div>
            },
            None => html! { <div class="tooltip" /> },
        }
    }

    fn px(value: f64) -> String {
        format!("{value:.2}")
    }

    fn to_js(err: ChartError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }

    fn element_by_id(document: &Document, id: &str) -> Result<Element, ChartError> {
        document
            .get_element_by_id(id)
            .ok_or_else(|| ChartError::Dom(id.to_string()))
    }

    /// Write the demographics banner into the fixed host-page elements.
    pub fn render_patient_banner(document: &Document, card: &PatientCard) -> Result<(), ChartError> {
        element_by_id(document, "patient_name")?.set_inner_html(&card.name);
        element_by_id(document, "gender")?.set_inner_html(card.gender.as_deref().unwrap_or(""));
        element_by_id(document, "dob")?.set_inner_html(card.birth_date.as_deref().unwrap_or(""));
        Ok(())
    }

    /// Write the latest lab values into the fixed host-page elements.
    pub fn render_lab_panel(document: &Document, panel: &LabPanel) -> Result<(), ChartError> {
        set_quantity(document, "sys", &panel.systolic)?;
        set_quantity(document, "dia", &panel.diastolic)?;
        set_quantity(document, "hdl", &panel.hdl)?;
        set_quantity(document, "ldl", &panel.ldl)?;
        render_annotation(document, &panel.note)
    }

    fn set_quantity(
        document: &Document,
        id: &str,
        value: &Option<QuantityDisplay>,
    ) -> Result<(), ChartError> {
        let text = value
            .as_ref()
            .map(|quantity| quantity.to_string())
            .unwrap_or_else(|| "--".to_string());
        element_by_id(document, id)?.set_inner_html(&text);
        Ok(())
    }

    /// Append one medication to the host-page list.
    pub fn append_medication(document: &Document, medication: &str) -> Result<(), ChartError> {
        let list = element_by_id(document, "med_list")?;
        let current = list.inner_html();
        list.set_inner_html(&format!("{current}<li> {medication}</li>"));
        Ok(())
    }

    /// Show the annotation text on the host page.
    pub fn render_annotation(document: &Document, annotation: &str) -> Result<(), ChartError> {
        element_by_id(document, "note")?.set_inner_html(annotation);
        Ok(())
    }

    /// Mount a chart into the div carrying the series' display-location
    /// class. An empty series hides the container instead of rendering.
    pub fn mount_series(document: &Document, series: ObservationSeries) -> Result<(), ChartError> {
        let selector = format!("div.{}", series.display_location);
        let target = document
            .query_selector(&selector)
            .map_err(|_| ChartError::Dom(selector.clone()))?
            .ok_or_else(|| ChartError::Dom(selector.clone()))?;

        if series.is_empty() {
            console::log_1(&JsValue::from_str("undefined zero-data parameter passed"));
            target
                .set_attribute("style", "display:none")
                .map_err(|_| ChartError::Dom(selector))?;
            return Ok(());
        }

        yew::Renderer::<ObservationChart>::with_root_and_props(
            target,
            ObservationChartProps {
                series,
                viewport: None,
            },
        )
        .render();
        Ok(())
    }

    #[wasm_bindgen]
    pub fn mount_observation_chart(series: JsValue) -> Result<(), JsValue> {
        let series: ObservationSeries = from_value(series)
            .map_err(|err| JsValue::from_str(&format!("could not read series: {err}")))?;

        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("could not access document"))?;

        mount_series(&document, series).map_err(to_js)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_ui::{
    append_medication, mount_observation_chart, mount_series, render_annotation, render_lab_panel,
    render_patient_banner, ObservationChart, ObservationChartProps,
};

#[cfg(not(target_arch = "wasm32"))]
pub fn mount_observation_chart(_: wasm_bindgen::JsValue) -> Result<(), wasm_bindgen::JsValue> {
    Err(wasm_bindgen::JsValue::from_str(
        "labtrend-ui only renders on the wasm32 target",
    ))
}
