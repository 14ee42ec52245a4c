mod client;
mod metric;
mod period;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use client::{Client, ClientPatch, ClientStatus, Manager, NewClient, Role};
pub use metric::{
	AggregatedSummary, FieldKind, LegacyMetricRecord, MetricField, MetricRecord, MetricValues,
	StoredMetric, MAX_COUNT_VALUE,
};
pub use period::ReportingPeriod;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
	#[error("invalid reporting period '{0}', expected YYYY-MM")]
	InvalidPeriod(String),

	#[error("{field} must be within [0, 1], got {value}")]
	RatioOutOfRange { field: &'static str, value: f64 },

	#[error("{field} must be at most {max}, got {value}", max = crate::MAX_COUNT_VALUE)]
	CountOutOfRange { field: &'static str, value: u64 },

	#[error("client_id is required")]
	MissingClientId,
}

/// What the dashboard shows: one month, or an aggregate over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardView {
	#[default]
	Month,
	HalfYear,
	Year,
}

impl DashboardView {
	/// Number of reporting periods covered by the view.
	pub fn months(self) -> u32 {
		match self {
			DashboardView::Month => 1,
			DashboardView::HalfYear => 6,
			DashboardView::Year => 12,
		}
	}

	pub fn is_multi_period(self) -> bool {
		self.months() > 1
	}
}

impl std::str::FromStr for DashboardView {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"month" => Ok(DashboardView::Month),
			"half_year" | "half-year" | "halfyear" => Ok(DashboardView::HalfYear),
			"year" => Ok(DashboardView::Year),
			other => Err(format!("unknown view '{}', expected month, half_year or year", other)),
		}
	}
}

// Settings models
fn default_max_input_chars() -> usize {
	5000
}

fn default_currency_symbol() -> String {
	"₽".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
	pub settings_version: u32,
	/// Fixed month the trailing windows are computed from. Falls back to the
	/// current month when absent.
	#[serde(default)]
	pub reference_period: Option<ReportingPeriod>,
	#[serde(default = "default_max_input_chars")]
	pub max_input_chars: usize,
	#[serde(default = "default_currency_symbol")]
	pub currency_symbol: String,
	#[serde(default)]
	pub default_view: DashboardView,
	/// JSON document database; in-memory only when absent.
	#[serde(default)]
	pub database_path: Option<PathBuf>,
	/// Lets a freshly signed-up account pick the admin role for itself.
	#[serde(default)]
	pub allow_admin_self_select: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			settings_version: 1,
			reference_period: None,
			max_input_chars: default_max_input_chars(),
			currency_symbol: default_currency_symbol(),
			default_view: DashboardView::default(),
			database_path: None,
			allow_admin_self_select: false,
		}
	}
}
