use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::{io::Read, path::PathBuf};

use metrics_parser::{FieldStatus, MetricsTextParser};
use models::{MetricField, ReportingPeriod};

#[derive(Debug, Parser)]
#[command(
    name = "parse-metrics",
    author,
    version,
    about = "Parse pasted client metrics text and show what was recognized",
    long_about = None
)]
struct Args {
    /// Text file to parse; reads stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Client identifier the metrics belong to
    #[arg(short, long)]
    client: String,

    /// Reporting period (YYYY-MM); defaults to the current month
    #[arg(short, long)]
    period: Option<ReportingPeriod>,

    /// Path to settings.json (optional)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Print the preview as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    logger::init("metrics_parser=info");
    let args = Args::parse();

    let settings = settings_loader::load_settings_with_fallback(args.settings.as_ref())?
        .unwrap_or_default();

    let mut text = String::new();
    match &args.input {
        Some(path) => {
            text = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Reading stdin")?;
        }
    }

    let today = Local::now().date_naive();
    let period = args
        .period
        .unwrap_or_else(|| ReportingPeriod::from_date(today));

    let parser = MetricsTextParser::new(settings.max_input_chars);
    let preview = parser
        .parse_for_review(&text, &args.client, period, today)
        .context("Input rejected")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("Client {}, {}", args.client, period.label());
    for report in &preview.fields {
        let shown = if report.field.is_ratio() {
            format!("{:.1}%", report.value * 100.0)
        } else {
            format!("{}", report.value)
        };
        let flag = match report.status {
            FieldStatus::Recognized => "",
            FieldStatus::NotRecognized => "  [не распознано]",
            FieldStatus::OutOfRange => "  [вне диапазона]",
        };
        println!("  {:<28} {:>12}{}", report.label, shown, flag);
    }

    let missing = preview.unrecognized();
    if missing.len() == MetricField::ALL.len() {
        println!("No metrics recognized.");
    } else if preview.has_warnings() {
        println!("Review flagged fields before saving.");
    }
    Ok(())
}
