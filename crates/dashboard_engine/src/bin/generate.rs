use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use dashboard_engine::{build_dashboard, load_metrics_file, records_for_client, write_dashboard_json};
use models::{DashboardView, ReportingPeriod};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "summarize-metrics",
    author,
    version,
    about = "Build a client's dashboard snapshot from a metrics JSON file",
    long_about = None
)]
struct Args {
    /// JSON array of metric rows (either schema)
    #[arg(short, long)]
    input: PathBuf,

    /// Only summarize this client's rows
    #[arg(short, long)]
    client: Option<String>,

    /// month, half_year or year; defaults to the configured view
    #[arg(short, long)]
    view: Option<DashboardView>,

    /// Month to show in the month view (YYYY-MM)
    #[arg(short, long)]
    period: Option<ReportingPeriod>,

    /// Month trailing windows end at (YYYY-MM)
    #[arg(short, long)]
    reference: Option<ReportingPeriod>,

    /// Path to settings.json (optional)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Write the snapshot here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    logger::init("dashboard_engine=info");
    let args = Args::parse();

    let settings = settings_loader::load_settings_with_fallback(args.settings.as_ref())?
        .unwrap_or_default();
    let today = Local::now().date_naive();
    let reference = args
        .reference
        .unwrap_or_else(|| settings_loader::reference_period(&settings, today));
    let view = args.view.unwrap_or(settings.default_view);

    eprintln!(
        "Generating dashboard...\n  input    : {}\n  view     : {:?}\n  reference: {}",
        args.input.display(),
        view,
        reference
    );

    let mut records = load_metrics_file(&args.input).context("load metrics")?;
    if let Some(client_id) = &args.client {
        records = records_for_client(&records, client_id);
    }
    tracing::info!(rows = records.len(), "metrics loaded");

    let snapshot = build_dashboard(
        &records,
        view,
        reference,
        args.period,
        &settings.currency_symbol,
    );

    match &args.out {
        Some(out_path) => {
            write_dashboard_json(&snapshot, out_path).context("write dashboard.json")?;
            eprintln!("Done. Generated at {}", snapshot.generated_at.to_rfc3339());
        }
        None => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    if snapshot.summary.is_none() {
        eprintln!("No data for the selected window.");
    } else {
        let missing: Vec<String> = snapshot
            .window
            .periods()
            .into_iter()
            .filter(|p| !records.iter().any(|r| r.period_type == *p))
            .map(|p| p.to_string())
            .collect();
        if !missing.is_empty() {
            eprintln!("[WARN] no rows for {}", missing.join(", "));
        }
    }
    Ok(())
}
