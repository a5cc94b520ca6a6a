#![cfg(target_arch = "wasm32")]

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Node};

const STYLE_TAG_SELECTOR: &str = "style[data-labtrend-ui]";

/// Default CSS for the chart along with easy-to-override design tokens.
pub const DEFAULT_STYLES: &str = r#"
:root {
  --labtrend-font-family: 'Inter', system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
  --labtrend-line: steelblue;
  --labtrend-dot: steelblue;
  --labtrend-dot-ring: #ffffff;
  --labtrend-band: rgba(176, 196, 222, 0.35);
  --labtrend-band-border: gray;
  --labtrend-axis: #333333;
  --labtrend-text: #1f2933;
  --labtrend-tooltip-bg: rgba(255, 255, 224, 0.95);
  --labtrend-tooltip-border: rgba(148, 163, 184, 0.6);
}

.observation-chart {
  position: relative;
  font-family: var(--labtrend-font-family);
  color: var(--labtrend-text);
}

.observation-chart .line {
  fill: none;
  stroke: var(--labtrend-line);
  stroke-width: 2;
}

.observation-chart .dot {
  fill: var(--labtrend-dot);
  stroke: var(--labtrend-dot-ring);
  cursor: pointer;
}

.observation-chart .normal_range_rect {
  fill: var(--labtrend-band);
}

.observation-chart .normal_range_line {
  stroke: var(--labtrend-band-border);
  stroke-width: 1;
}

.observation-chart .axis {
  stroke: var(--labtrend-axis);
  stroke-width: 1;
}

.observation-chart .tick_label {
  font-size: 11px;
  fill: var(--labtrend-axis);
}

.observation-chart .title_text {
  font-size: 16px;
  text-anchor: middle;
  fill: var(--labtrend-text);
}

.observation-chart .tooltip {
  position: fixed;
  pointer-events: none;
  padding: 6px 10px;
  border: 1px solid var(--labtrend-tooltip-border);
  border-radius: 6px;
  background: var(--labtrend-tooltip-bg);
  font-size: 12px;
  line-height: 1.5;
  opacity: 0;
  transition: opacity 0.2s ease;
}

.observation-chart .tooltip.is-visible {
  opacity: 0.9;
}
"#;

pub fn ensure_styles(document: &Document) -> Result<(), JsValue> {
    if document.query_selector(STYLE_TAG_SELECTOR)?.is_some() {
        return Ok(());
    }

    let head = document
        .head()
        .ok_or_else(|| JsValue::from_str("document has no <head> element"))?;

    let style_el = document.create_element("style")?;
    style_el.set_attribute("data-labtrend-ui", "v1")?;
    style_el.set_text_content(Some(DEFAULT_STYLES));
    head.append_child(&style_el.clone().dyn_into::<Node>()?)?;

    Ok(())
}
