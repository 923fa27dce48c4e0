//! Offline check of a boundary/metric data drop: joins a GeoJSON boundary
//! export with an exported EAI sheet, classifies it and prints breakpoints,
//! the legend and every boundary unit that found no row.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use riskmap_core::{
    boundary::FeatureCollection,
    catalog::ExposureCategory,
    chart::ExceedanceCurve,
    classify::{classify, ColorScale},
    config::{DashboardConfig, JoinKey},
    join::apply_overlay,
    layer::BoundaryLayer,
    legend::{format_value, Legend},
    metrics::{MetricBatch, Record, SummaryBatch},
};
use serde::Serialize;
use std::{fs, path::Path};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "riskmap-inspect", about = "Join boundary GeoJSON with an EAI sheet and report the classification")]
struct Args {
    /// Boundary GeoJSON FeatureCollection.
    boundaries: String,

    /// Metric sheet export: JSON array of row objects, or CSV with a header row.
    metrics: String,

    /// Summary (return period) sheet export, same formats.
    #[arg(short, long)]
    summary: Option<String>,

    /// Administrative level of the boundaries.
    #[arg(short, long, default_value_t = 1)]
    level: u8,

    /// Exposure category: population, built-up or cropland.
    #[arg(short, long, default_value = "population", value_parser = parse_category)]
    category: ExposureCategory,

    /// Join-key convention (ignored when --config is given).
    #[arg(short, long, value_enum, default_value_t = KeyPreset::Name)]
    key: KeyPreset,

    /// Number of natural-breaks classes (ignored when --config is given).
    #[arg(long, default_value_t = 5)]
    classes: usize,

    /// Dashboard config JSON.
    #[arg(long)]
    config: Option<String>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KeyPreset {
    /// `NAM_<level>` administrative names.
    Name,
    /// `HASC_<level>` hierarchical codes.
    Hasc,
}

fn parse_category(s: &str) -> std::result::Result<ExposureCategory, String> {
    s.parse()
        .map_err(|_| format!("unknown exposure category '{s}' (population, built-up, cropland)"))
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report {
    features: usize,
    rows: usize,
    matched: usize,
    no_risk: usize,
    unmatched: Vec<String>,
    breakpoints: Vec<f64>,
    legend: Legend,
    curve: Option<ExceedanceCurve>,
}

impl Report {
    fn print_text(&self) {
        println!(
            "{} features, {} rows: {} matched, {} without risk, {} without a row",
            self.features,
            self.rows,
            self.matched,
            self.no_risk,
            self.unmatched.len()
        );
        let breaks: Vec<String> = self.breakpoints.iter().map(|b| format_value(*b)).collect();
        println!("Breakpoints: {}", if breaks.is_empty() { "-".to_string() } else { breaks.join(", ") });
        println!();
        print!("{}", self.legend.to_text());

        if let Some(curve) = &self.curve {
            println!();
            println!("{:>10} {:>12} {:>14}", "RP (yr)", "Frequency", "Impact");
            println!("{}", "-".repeat(38));
            for p in &curve.points {
                println!("{:>10} {:>12.5} {:>14}", format_value(p.return_period), p.frequency, format_value(p.impact));
            }
            println!("{}", curve.annotation);
        }

        if !self.unmatched.is_empty() {
            println!();
            println!("Features without a metric row:");
            for key in &self.unmatched {
                println!("  {key}");
            }
        }
    }
}

// ── Input ─────────────────────────────────────────────────────────────────────

/// Sheet rows from a JSON array or a CSV file (chosen by extension).
fn read_records(path: &Path) -> Result<Vec<Record>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        return serde_json::from_str(&text).with_context(|| format!("parsing {} as a JSON row array", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("{}: row {}", path.display(), line + 2))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(h, cell)| (h.to_string(), serde_json::Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

fn load_config(args: &Args) -> Result<DashboardConfig> {
    if let Some(path) = &args.config {
        let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        return DashboardConfig::from_json(&text).with_context(|| format!("invalid config {path}"));
    }
    let key = match args.key {
        KeyPreset::Name => JoinKey::name(),
        KeyPreset::Hasc => JoinKey::hasc(),
    };
    let mut config = DashboardConfig::new(key);
    config.class_count = args.classes;
    config.validate().context("invalid --classes")?;
    Ok(config)
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let geojson = fs::read_to_string(&args.boundaries).with_context(|| format!("reading {}", args.boundaries))?;
    let collection = FeatureCollection::from_geojson_str(&geojson)
        .with_context(|| format!("parsing {}", args.boundaries))?;
    let feature_count = collection.features.len();
    let Some(mut layer) = BoundaryLayer::new("-", args.level, collection, &config.outline) else {
        bail!("{} holds no features with coordinates", args.boundaries);
    };
    tracing::info!(features = feature_count, level = args.level, "Boundaries loaded");

    let records = read_records(Path::new(&args.metrics))?;
    let key_column = config.join_key.row_field_for(args.level);
    let mut batch = MetricBatch::from_records(&records, &key_column, args.category)
        .with_context(|| format!("reading metric rows from {}", args.metrics))?;
    if let Some(path) = &args.summary {
        let records = read_records(Path::new(path))?;
        let summary = SummaryBatch::from_records(&records, args.category)
            .with_context(|| format!("reading summary rows from {path}"))?;
        batch = batch.with_summary(summary);
    }
    tracing::info!(rows = batch.rows.len(), key = %key_column, "Metric rows loaded");

    let breakpoints = classify(&batch.values(), config.class_count);
    let scale = ColorScale::with_no_data(breakpoints.clone(), config.palette.clone(), config.no_data_color);
    let join = apply_overlay(&mut layer, &batch.rows, args.category, &scale, &config);
    let curve = batch
        .summary
        .as_ref()
        .map(|s| ExceedanceCurve::from_summary(s, args.category, batch.total_eai()));

    let report = Report {
        features: feature_count,
        rows: batch.rows.len(),
        matched: join.matched,
        no_risk: join.no_risk,
        unmatched: join.unmatched,
        breakpoints,
        legend: Legend::for_category(&scale, args.category),
        curve,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_text();
    }
    Ok(())
}
