use chrono::{DateTime, Utc};
use models::{AggregatedSummary, DashboardView, MetricField, MetricRecord, ReportingPeriod};
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, select_period, AggregationMode};
use crate::window::ReportingWindow;

/// Fields shown as KPI cards, in display order.
pub const KPI_FIELDS: [MetricField; 7] = [
    MetricField::Conversion,
    MetricField::Autonomy,
    MetricField::FinancialEquiv,
    MetricField::RetentionShare,
    MetricField::Satisfaction,
    MetricField::TimeSavedHours,
    MetricField::ConfirmedAppointments,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiCard {
    pub field: MetricField,
    pub title: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

/// Colour band of the satisfaction gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeBand {
    /// 76..=100
    High,
    /// 51..76
    Medium,
    /// 26..51
    Low,
    /// below 26
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    /// Percent, clamped to [0, 100].
    pub value: f64,
    pub band: GaugeBand,
}

/// Satisfaction ratio as a half-circle gauge reading.
pub fn satisfaction_gauge(ratio: f64) -> Gauge {
    let percent = if ratio.is_nan() {
        0.0
    } else {
        (ratio * 100.0).clamp(0.0, 100.0)
    };
    let band = if percent >= 76.0 {
        GaugeBand::High
    } else if percent >= 51.0 {
        GaugeBand::Medium
    } else if percent >= 26.0 {
        GaugeBand::Low
    } else {
        GaugeBand::Critical
    };
    Gauge {
        value: round1(percent),
        band,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardCharts {
    pub conversion: Vec<ChartPoint>,
    pub autonomy: Vec<ChartPoint>,
    pub financial_equiv: Vec<ChartPoint>,
    /// Repeat vs new clients, in percent.
    pub retention: Vec<ChartPoint>,
    pub appointments: Vec<ChartPoint>,
    pub dialogs: Vec<ChartPoint>,
    pub satisfaction: Option<Gauge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub view: DashboardView,
    pub window: ReportingWindow,
    /// `None` when the window holds no records.
    pub summary: Option<AggregatedSummary>,
    pub kpis: Vec<KpiCard>,
    pub charts: DashboardCharts,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Groups digits by three with spaces: 1234567 -> "1 234 567".
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

fn format_field(summary: &AggregatedSummary, field: MetricField, currency_symbol: &str) -> String {
    if let Some(ratio) = summary.metrics.ratio(field) {
        return format_percent(ratio);
    }
    let count = summary.metrics.count(field).unwrap_or_default();
    match field {
        MetricField::FinancialEquiv => format!("{} {}", format_thousands(count), currency_symbol),
        MetricField::TimeSavedHours => format!("{} ч", format_thousands(count)),
        _ => format_thousands(count),
    }
}

pub fn kpi_cards(summary: &AggregatedSummary, currency_symbol: &str) -> Vec<KpiCard> {
    KPI_FIELDS
        .iter()
        .map(|field| KpiCard {
            field: *field,
            title: field.label().to_string(),
            value: format_field(summary, *field, currency_symbol),
        })
        .collect()
}

fn series(records: &[MetricRecord], value: impl Fn(&MetricRecord) -> f64) -> Vec<ChartPoint> {
    records
        .iter()
        .map(|r| ChartPoint {
            name: r.period_type.to_string(),
            value: value(r),
        })
        .collect()
}

fn point(name: &str, value: f64) -> ChartPoint {
    ChartPoint {
        name: name.to_string(),
        value,
    }
}

pub fn build_charts(records: &[MetricRecord], summary: Option<&AggregatedSummary>) -> DashboardCharts {
    let mut charts = DashboardCharts {
        conversion: series(records, |r| round1(r.metrics.conversion * 100.0)),
        autonomy: series(records, |r| round1(r.metrics.autonomy * 100.0)),
        financial_equiv: series(records, |r| r.metrics.financial_equiv as f64),
        ..DashboardCharts::default()
    };
    if let Some(s) = summary {
        let m = &s.metrics;
        charts.retention = vec![
            point("Повторные", round1(m.retention_share * 100.0)),
            point("Новые", round1((1.0 - m.retention_share) * 100.0)),
        ];
        charts.appointments = vec![
            point("Рабочее время", m.business_hours_appointments as f64),
            point("Нерабочее время", m.non_business_hours_appointments as f64),
        ];
        charts.dialogs = vec![
            point("Короткие", m.short_dialogs as f64),
            point("Средние", m.medium_dialogs as f64),
            point("Длинные", m.long_dialogs as f64),
        ];
        charts.satisfaction = Some(satisfaction_gauge(m.satisfaction));
    }
    charts
}

/// Assembles everything a dashboard view renders from the client's records.
///
/// `records` must be in ascending chronological order. Records outside the
/// resolved window are ignored.
pub fn build_dashboard(
    records: &[MetricRecord],
    view: DashboardView,
    reference: ReportingPeriod,
    requested: Option<ReportingPeriod>,
    currency_symbol: &str,
) -> DashboardSnapshot {
    let window = ReportingWindow::resolve(view, reference, requested);
    let in_window: Vec<MetricRecord> = records
        .iter()
        .filter(|r| window.contains(&r.period_type))
        .cloned()
        .collect();

    let summary = match (view, requested) {
        (DashboardView::Month, Some(period)) => select_period(&in_window, &period),
        _ => aggregate(&in_window, AggregationMode::from(view)),
    };

    let kpis = summary
        .as_ref()
        .map(|s| kpi_cards(s, currency_symbol))
        .unwrap_or_default();
    let charts = build_charts(&in_window, summary.as_ref());

    DashboardSnapshot {
        generated_at: Utc::now(),
        view,
        window,
        summary,
        kpis,
        charts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::MetricValues;

    fn record(period: &str, conversion: f64, savings: u64) -> MetricRecord {
        let p: ReportingPeriod = period.parse().unwrap();
        let mut r = MetricRecord::empty("c1", p.first_day(), p);
        r.metrics.conversion = conversion;
        r.metrics.financial_equiv = savings;
        r.metrics.retention_share = 0.45;
        r
    }

    fn p(s: &str) -> ReportingPeriod {
        s.parse().unwrap()
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(50000), "50 000");
        assert_eq!(format_thousands(1234567), "1 234 567");
    }

    #[test]
    fn test_kpi_cards_formatting() {
        let summary = AggregatedSummary {
            periods: 1,
            metrics: MetricValues {
                conversion: 0.75,
                autonomy: 0.855,
                financial_equiv: 50000,
                retention_share: 0.45,
                time_saved_hours: 1200,
                ..MetricValues::default()
            },
        };
        let cards = kpi_cards(&summary, "₽");
        assert_eq!(cards.len(), KPI_FIELDS.len());
        assert_eq!(cards[0].value, "75.0%");
        assert_eq!(cards[0].title, "Конверсия в запись");
        assert_eq!(cards[2].value, "50 000 ₽");
        assert_eq!(cards[3].value, "45.0%");
        assert_eq!(cards[5].value, "1 200 ч");
    }

    #[test]
    fn test_month_view_without_data_has_no_summary() {
        let records = vec![record("2025-08", 0.5, 100)];
        let snap = build_dashboard(&records, DashboardView::Month, p("2025-10"), None, "₽");
        assert!(snap.summary.is_none());
        assert!(snap.kpis.is_empty());
        assert!(snap.charts.conversion.is_empty());
        assert!(snap.charts.retention.is_empty());
        assert!(snap.charts.satisfaction.is_none());
    }

    #[test]
    fn test_month_view_selects_requested_period() {
        let records = vec![record("2025-08", 0.5, 100), record("2025-09", 0.6, 200)];
        let snap = build_dashboard(&records, DashboardView::Month, p("2025-10"), Some(p("2025-08")), "₽");
        let s = snap.summary.unwrap();
        assert_eq!(s.metrics.financial_equiv, 100);
        assert_eq!(snap.window, ReportingWindow::Month { period: p("2025-08") });
    }

    #[test]
    fn test_half_year_view_aggregates_window_only() {
        let records = vec![
            record("2025-01", 0.9, 9999),
            record("2025-08", 0.5, 10),
            record("2025-09", 0.6, 20),
            record("2025-10", 0.7, 30),
        ];
        let snap = build_dashboard(&records, DashboardView::HalfYear, p("2025-10"), None, "₽");
        let s = snap.summary.unwrap();
        assert_eq!(s.periods, 3);
        assert_eq!(s.metrics.financial_equiv, 60);
        assert!((s.metrics.conversion - 0.6).abs() < 1e-9);

        assert_eq!(snap.charts.conversion.len(), 3);
        assert_eq!(snap.charts.conversion[0], ChartPoint { name: "2025-08".into(), value: 50.0 });
        assert_eq!(snap.charts.financial_equiv[2].value, 30.0);
        assert_eq!(snap.charts.retention[0].value, 45.0);
        assert_eq!(snap.charts.retention[1].value, 55.0);
        assert_eq!(snap.charts.satisfaction.map(|g| g.band), Some(GaugeBand::Critical));
    }

    #[test]
    fn test_duplicate_month_shows_the_same_row_with_or_without_request() {
        let mut first = record("2025-10", 0.1, 0);
        first.metrics.confirmed_appointments = 1;
        let mut second = record("2025-10", 0.2, 0);
        second.metrics.confirmed_appointments = 2;
        let records = vec![first, second];

        let implicit = build_dashboard(&records, DashboardView::Month, p("2025-10"), None, "₽");
        let explicit =
            build_dashboard(&records, DashboardView::Month, p("2025-10"), Some(p("2025-10")), "₽");
        assert_eq!(implicit.summary.unwrap().metrics.confirmed_appointments, 2);
        assert_eq!(explicit.summary.unwrap().metrics.confirmed_appointments, 2);
    }

    #[test]
    fn test_satisfaction_gauge_bands() {
        let band = |ratio: f64| satisfaction_gauge(ratio).band;
        assert_eq!(band(1.0), GaugeBand::High);
        assert_eq!(band(0.76), GaugeBand::High);
        assert_eq!(band(0.759), GaugeBand::Medium);
        assert_eq!(band(0.51), GaugeBand::Medium);
        assert_eq!(band(0.509), GaugeBand::Low);
        assert_eq!(band(0.26), GaugeBand::Low);
        assert_eq!(band(0.259), GaugeBand::Critical);
        assert_eq!(band(0.0), GaugeBand::Critical);
    }

    #[test]
    fn test_satisfaction_gauge_clamps() {
        assert_eq!(satisfaction_gauge(-0.05), Gauge { value: 0.0, band: GaugeBand::Critical });
        assert_eq!(satisfaction_gauge(1.5), Gauge { value: 100.0, band: GaugeBand::High });
        assert_eq!(satisfaction_gauge(0.873).value, 87.3);
    }
}
