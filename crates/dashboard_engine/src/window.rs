use models::{DashboardView, ReportingPeriod};
use serde::{Deserialize, Serialize};

/// The set of reporting periods a dashboard view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportingWindow {
    Month {
        period: ReportingPeriod,
    },
    /// Inclusive on both ends.
    Range {
        from: ReportingPeriod,
        to: ReportingPeriod,
    },
}

impl ReportingWindow {
    /// `Month` shows the requested month, or the reference month. Trailing views
    /// end at the reference month and reach back 6 or 12 months including it.
    pub fn resolve(
        view: DashboardView,
        reference: ReportingPeriod,
        requested: Option<ReportingPeriod>,
    ) -> Self {
        match view {
            DashboardView::Month => ReportingWindow::Month {
                period: requested.unwrap_or(reference),
            },
            DashboardView::HalfYear | DashboardView::Year => ReportingWindow::Range {
                from: reference.minus_months(view.months() - 1),
                to: reference,
            },
        }
    }

    pub fn contains(&self, period: &ReportingPeriod) -> bool {
        match self {
            ReportingWindow::Month { period: p } => p == period,
            ReportingWindow::Range { from, to } => from <= period && period <= to,
        }
    }

    /// Every period of the window, ascending.
    pub fn periods(&self) -> Vec<ReportingPeriod> {
        match self {
            ReportingWindow::Month { period } => vec![*period],
            ReportingWindow::Range { from, to } => {
                let mut out = Vec::new();
                let mut p = *from;
                while p <= *to {
                    out.push(p);
                    // next() saturates at the last representable month
                    if p == *to {
                        break;
                    }
                    p = p.next();
                }
                out
            }
        }
    }
}
