use models::{
    AggregatedSummary, DashboardView, FieldKind, MetricField, MetricRecord, MetricValues,
    ReportingPeriod,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// The latest record of the input, by input order.
    SinglePeriod,
    /// Ratios averaged over the record count, counts summed.
    MultiPeriod,
}

impl From<DashboardView> for AggregationMode {
    fn from(view: DashboardView) -> Self {
        if view.is_multi_period() {
            AggregationMode::MultiPeriod
        } else {
            AggregationMode::SinglePeriod
        }
    }
}

/// Reduces chronologically ordered records to one summary.
///
/// Returns `None` when `records` is empty, in every mode. An all-zero summary
/// is a reported zero, never "no data".
pub fn aggregate(records: &[MetricRecord], mode: AggregationMode) -> Option<AggregatedSummary> {
    match mode {
        AggregationMode::SinglePeriod => records.last().map(|r| AggregatedSummary {
            periods: 1,
            metrics: r.metrics.clone(),
        }),
        AggregationMode::MultiPeriod => summarize(records),
    }
}

/// The record whose `period_type` equals `period`, as a single-period summary.
/// With duplicates the last one wins, as in `aggregate`.
pub fn select_period(
    records: &[MetricRecord],
    period: &ReportingPeriod,
) -> Option<AggregatedSummary> {
    records
        .iter()
        .rev()
        .find(|r| r.period_type == *period)
        .map(|r| AggregatedSummary {
            periods: 1,
            metrics: r.metrics.clone(),
        })
}

fn summarize(records: &[MetricRecord]) -> Option<AggregatedSummary> {
    if records.is_empty() {
        return None;
    }
    let n = records.len() as f64;
    let mut out = MetricValues::default();

    for field in MetricField::ALL {
        match field.kind() {
            FieldKind::Ratio => {
                let sum: f64 = records
                    .iter()
                    .filter_map(|r| r.metrics.ratio(field))
                    .sum();
                if let Some(slot) = out.ratio_mut(field) {
                    *slot = sum / n;
                }
            }
            FieldKind::Count => {
                let sum = records
                    .iter()
                    .filter_map(|r| r.metrics.count(field))
                    .fold(0u64, u64::saturating_add);
                if let Some(slot) = out.count_mut(field) {
                    *slot = sum;
                }
            }
        }
    }

    Some(AggregatedSummary {
        periods: records.len(),
        metrics: out,
    })
}
