use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use labtrend_chart::svg::render_svg;
use labtrend_core::NormalRange;
use labtrend_fhir::{
    collect_observations, lab_panel, loinc, medication_names, patient_card, prepare_series,
    CodeIndex,
};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "labtrend-cli",
    about = "Shape a FHIR JSON bundle into lab-panel values and trend charts."
)]
struct Args {
    /// Path to the bundle JSON file.
    #[arg(short, long)]
    input: PathBuf,

    /// Write the total cholesterol chart to this SVG file.
    #[arg(long)]
    svg_out: Option<PathBuf>,

    /// Viewport the chart is sized against, as WIDTHxHEIGHT.
    #[arg(long, default_value = "1280x800")]
    viewport: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read file {:?}", args.input))?;
    let bundle: Value = serde_json::from_str(&data)
        .with_context(|| format!("{:?} is not valid JSON", args.input))?;

    let resources = collect_observations(&bundle)?;

    if let Some(patient) = resources
        .iter()
        .find(|resource| resource.get("resourceType").and_then(Value::as_str) == Some("Patient"))
    {
        let card = patient_card(patient);
        println!("Patient: {}", card.name);
        if let Some(gender) = &card.gender {
            println!("Gender: {gender}");
        }
        if let Some(birth_date) = &card.birth_date {
            println!("Date of birth: {birth_date}");
        }
        println!();
    }

    let medications = medication_names(&resources);
    if !medications.is_empty() {
        println!("Medications:");
        for medication in &medications {
            println!("  - {medication}");
        }
        println!();
    }

    let index = CodeIndex::from_observations(&resources);
    let panel = lab_panel(&index);

    println!("Lab panel:");
    print_value("Total cholesterol", &panel.total_cholesterol);
    print_value("HDL", &panel.hdl);
    print_value("LDL", &panel.ldl);
    print_value("Systolic BP", &panel.systolic);
    print_value("Diastolic BP", &panel.diastolic);
    println!("  Note: {}", panel.note);
    println!();

    let cholesterol = prepare_series(
        index.by_code(loinc::TOTAL_CHOLESTEROL),
        "total_cholesterol_visualisation",
        NormalRange::bounded(125.0, 200.0),
    );
    let hdl = prepare_series(
        index.by_code(loinc::HDL),
        "hdl_visualisation",
        NormalRange::at_least(40.0),
    );
    for series in [&cholesterol, &hdl] {
        println!("{}: {} observation(s)", series.title, series.data.len());
    }

    if let Some(svg_out) = &args.svg_out {
        anyhow::ensure!(
            !cholesterol.is_empty(),
            "no cholesterol observations to chart"
        );
        let (width, height) = parse_viewport(&args.viewport)?;
        let svg = render_svg(&cholesterol, width, height)?;
        std::fs::write(svg_out, svg)
            .with_context(|| format!("could not write chart to {svg_out:?}"))?;
        println!("Chart written to {svg_out:?}");
    }

    Ok(())
}

fn print_value(label: &str, value: &Option<labtrend_core::QuantityDisplay>) {
    match value {
        Some(quantity) => println!("  {label}: {quantity}"),
        None => println!("  {label}: --"),
    }
}

fn parse_viewport(raw: &str) -> anyhow::Result<(f64, f64)> {
    let (width, height) = raw
        .split_once('x')
        .with_context(|| format!("viewport {raw:?} is not WIDTHxHEIGHT"))?;
    Ok((
        width.parse().with_context(|| format!("bad width in {raw:?}"))?,
        height.parse().with_context(|| format!("bad height in {raw:?}"))?,
    ))
}
