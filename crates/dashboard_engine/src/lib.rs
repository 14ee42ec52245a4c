//! Aggregation and presentation of a client's monthly metrics: reporting
//! windows, the no-data aware aggregator, KPI cards and chart series, and the
//! view-state reducer driving the dashboard screen.

pub mod aggregate;
pub mod presentation;
pub mod state;
pub mod window;

use anyhow::{Context, Result};
use models::{MetricRecord, StoredMetric};
use serde::Serialize;
use std::{fs, path::Path};

pub use aggregate::{aggregate, select_period, AggregationMode};
pub use presentation::{
    build_charts, build_dashboard, format_percent, format_thousands, kpi_cards,
    satisfaction_gauge, ChartPoint, DashboardCharts, DashboardSnapshot, Gauge, GaugeBand, KpiCard,
};
pub use state::{reduce, DashboardAction, DashboardState, Effect, Transition};
pub use window::ReportingWindow;

/// Orders records chronologically: by period, then by entry date.
pub fn sort_chronologically(records: &mut [MetricRecord]) {
    records.sort_by(|a, b| {
        a.period_type
            .cmp(&b.period_type)
            .then_with(|| a.date.cmp(&b.date))
    });
}

/// Reads a JSON array of metric rows of either schema, migrated to the
/// current one and sorted chronologically.
pub fn load_metrics_file(path: &Path) -> Result<Vec<MetricRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading metrics file: {}", path.display()))?;
    let rows: Vec<StoredMetric> = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing metrics JSON in {}", path.display()))?;
    let mut records: Vec<MetricRecord> = rows.into_iter().map(StoredMetric::into_current).collect();
    sort_chronologically(&mut records);
    Ok(records)
}

/// Keeps only `client_id`'s rows, preserving order.
pub fn records_for_client(records: &[MetricRecord], client_id: &str) -> Vec<MetricRecord> {
    records
        .iter()
        .filter(|r| r.client_id == client_id)
        .cloned()
        .collect()
}

pub fn write_dashboard_json<T: Serialize>(output: &T, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(output)?;
    fs::write(out_path, json)?;
    Ok(())
}
