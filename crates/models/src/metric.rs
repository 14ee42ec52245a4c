use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::{ReportingPeriod, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
	/// Fraction in [0,1], entered and displayed as a percentage.
	Ratio,
	/// Non-negative integer (currency units, hours, appointments, dialogs).
	Count,
}

/// Every measurable field of the current metric schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
	Conversion,
	Autonomy,
	Satisfaction,
	RetentionShare,
	FinancialEquiv,
	TimeSavedHours,
	ConfirmedAppointments,
	BusinessHoursAppointments,
	NonBusinessHoursAppointments,
	ShortDialogs,
	MediumDialogs,
	LongDialogs,
}

impl MetricField {
	pub const ALL: [MetricField; 12] = [
		MetricField::Conversion,
		MetricField::Autonomy,
		MetricField::Satisfaction,
		MetricField::RetentionShare,
		MetricField::FinancialEquiv,
		MetricField::TimeSavedHours,
		MetricField::ConfirmedAppointments,
		MetricField::BusinessHoursAppointments,
		MetricField::NonBusinessHoursAppointments,
		MetricField::ShortDialogs,
		MetricField::MediumDialogs,
		MetricField::LongDialogs,
	];

	pub fn kind(self) -> FieldKind {
		match self {
			MetricField::Conversion
			| MetricField::Autonomy
			| MetricField::Satisfaction
			| MetricField::RetentionShare => FieldKind::Ratio,
			_ => FieldKind::Count,
		}
	}

	pub fn is_ratio(self) -> bool {
		self.kind() == FieldKind::Ratio
	}

	/// Storage key, identical to the serialized field name.
	pub fn key(self) -> &'static str {
		match self {
			MetricField::Conversion => "conversion",
			MetricField::Autonomy => "autonomy",
			MetricField::Satisfaction => "satisfaction",
			MetricField::RetentionShare => "retention_share",
			MetricField::FinancialEquiv => "financial_equiv",
			MetricField::TimeSavedHours => "time_saved_hours",
			MetricField::ConfirmedAppointments => "confirmed_appointments",
			MetricField::BusinessHoursAppointments => "business_hours_appointments",
			MetricField::NonBusinessHoursAppointments => "non_business_hours_appointments",
			MetricField::ShortDialogs => "short_dialogs",
			MetricField::MediumDialogs => "medium_dialogs",
			MetricField::LongDialogs => "long_dialogs",
		}
	}

	/// Human-facing label used by the preview and the KPI cards.
	pub fn label(self) -> &'static str {
		match self {
			MetricField::Conversion => "Конверсия в запись",
			MetricField::Autonomy => "Автономность",
			MetricField::Satisfaction => "Удовлетворенность",
			MetricField::RetentionShare => "Повторные клиенты",
			MetricField::FinancialEquiv => "Экономия",
			MetricField::TimeSavedHours => "Сэкономлено часов",
			MetricField::ConfirmedAppointments => "Подтвержденные записи",
			MetricField::BusinessHoursAppointments => "Записи в рабочее время",
			MetricField::NonBusinessHoursAppointments => "Записи в нерабочее время",
			MetricField::ShortDialogs => "Короткие диалоги",
			MetricField::MediumDialogs => "Средние диалоги",
			MetricField::LongDialogs => "Длинные диалоги",
		}
	}
}

/// Largest count a record may carry. Anything above is a parse accident.
pub const MAX_COUNT_VALUE: u64 = 1_000_000_000;

/// Counts accept whole or fractional non-negative numbers; fractions round.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Number {
		Whole(u64),
		Fractional(f64),
	}

	match Number::deserialize(deserializer)? {
		Number::Whole(n) => Ok(n),
		Number::Fractional(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u64),
		Number::Fractional(f) => Err(de::Error::custom(format!(
			"count must be a non-negative number, got {}",
			f
		))),
	}
}

/// The measured values of one reporting period (or of an aggregate).
///
/// Every field defaults to zero on deserialization so that rows written under
/// an older schema load with the newer fields zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
	#[serde(default)]
	pub conversion: f64,
	#[serde(default)]
	pub autonomy: f64,
	#[serde(default)]
	pub satisfaction: f64,
	#[serde(default)]
	pub retention_share: f64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub financial_equiv: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub time_saved_hours: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub confirmed_appointments: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub business_hours_appointments: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub non_business_hours_appointments: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub short_dialogs: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub medium_dialogs: u64,
	#[serde(default, deserialize_with = "deserialize_count")]
	pub long_dialogs: u64,
}

impl MetricValues {
	pub fn ratio(&self, field: MetricField) -> Option<f64> {
		match field {
			MetricField::Conversion => Some(self.conversion),
			MetricField::Autonomy => Some(self.autonomy),
			MetricField::Satisfaction => Some(self.satisfaction),
			MetricField::RetentionShare => Some(self.retention_share),
			_ => None,
		}
	}

	pub fn ratio_mut(&mut self, field: MetricField) -> Option<&mut f64> {
		match field {
			MetricField::Conversion => Some(&mut self.conversion),
			MetricField::Autonomy => Some(&mut self.autonomy),
			MetricField::Satisfaction => Some(&mut self.satisfaction),
			MetricField::RetentionShare => Some(&mut self.retention_share),
			_ => None,
		}
	}

	pub fn count(&self, field: MetricField) -> Option<u64> {
		match field {
			MetricField::FinancialEquiv => Some(self.financial_equiv),
			MetricField::TimeSavedHours => Some(self.time_saved_hours),
			MetricField::ConfirmedAppointments => Some(self.confirmed_appointments),
			MetricField::BusinessHoursAppointments => Some(self.business_hours_appointments),
			MetricField::NonBusinessHoursAppointments => Some(self.non_business_hours_appointments),
			MetricField::ShortDialogs => Some(self.short_dialogs),
			MetricField::MediumDialogs => Some(self.medium_dialogs),
			MetricField::LongDialogs => Some(self.long_dialogs),
			_ => None,
		}
	}

	pub fn count_mut(&mut self, field: MetricField) -> Option<&mut u64> {
		match field {
			MetricField::FinancialEquiv => Some(&mut self.financial_equiv),
			MetricField::TimeSavedHours => Some(&mut self.time_saved_hours),
			MetricField::ConfirmedAppointments => Some(&mut self.confirmed_appointments),
			MetricField::BusinessHoursAppointments => Some(&mut self.business_hours_appointments),
			MetricField::NonBusinessHoursAppointments => Some(&mut self.non_business_hours_appointments),
			MetricField::ShortDialogs => Some(&mut self.short_dialogs),
			MetricField::MediumDialogs => Some(&mut self.medium_dialogs),
			MetricField::LongDialogs => Some(&mut self.long_dialogs),
			_ => None,
		}
	}

	/// Field value widened to `f64` regardless of kind.
	pub fn value(&self, field: MetricField) -> f64 {
		match field.kind() {
			FieldKind::Ratio => self.ratio(field).unwrap_or_default(),
			FieldKind::Count => self.count(field).unwrap_or_default() as f64,
		}
	}

	pub fn is_all_zero(&self) -> bool {
		MetricField::ALL.iter().all(|f| self.value(*f) == 0.0)
	}

	/// Ratio fields must be finite and within [0,1]; counts at most `MAX_COUNT_VALUE`.
	pub fn validate(&self) -> Result<(), ValidationError> {
		for field in MetricField::ALL {
			if let Some(v) = self.ratio(field) {
				if !v.is_finite() || !(0.0..=1.0).contains(&v) {
					return Err(ValidationError::RatioOutOfRange {
						field: field.key(),
						value: v,
					});
				}
			}
			if let Some(n) = self.count(field) {
				if n > MAX_COUNT_VALUE {
					return Err(ValidationError::CountOutOfRange {
						field: field.key(),
						value: n,
					});
				}
			}
		}
		Ok(())
	}
}

/// One reporting period's measurements for one client (current schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub client_id: String,
	pub date: NaiveDate,
	pub period_type: ReportingPeriod,
	#[serde(flatten)]
	pub metrics: MetricValues,
}

impl MetricRecord {
	/// A record with every metric at zero.
	pub fn empty(client_id: impl Into<String>, date: NaiveDate, period_type: ReportingPeriod) -> Self {
		Self {
			id: None,
			client_id: client_id.into(),
			date,
			period_type,
			metrics: MetricValues::default(),
		}
	}

	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.client_id.trim().is_empty() {
			return Err(ValidationError::MissingClientId);
		}
		self.metrics.validate()
	}
}

/// First metric schema: four headline values, savings in currency units and
/// an optional period key. Rows with any other key are not legacy rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyMetricRecord {
	#[serde(default)]
	pub id: Option<String>,
	pub client_id: String,
	pub date: NaiveDate,
	#[serde(default)]
	pub conversion: f64,
	#[serde(default)]
	pub autonomy: f64,
	#[serde(default)]
	pub financial_equiv: f64,
	#[serde(default)]
	pub retention_share: f64,
	#[serde(default)]
	pub period_type: Option<String>,
}

impl From<LegacyMetricRecord> for MetricRecord {
	fn from(legacy: LegacyMetricRecord) -> Self {
		let period_type = legacy
			.period_type
			.as_deref()
			.and_then(|p| p.parse().ok())
			.unwrap_or_else(|| ReportingPeriod::from_date(legacy.date));
		MetricRecord {
			id: legacy.id,
			client_id: legacy.client_id,
			date: legacy.date,
			period_type,
			metrics: MetricValues {
				conversion: legacy.conversion,
				autonomy: legacy.autonomy,
				retention_share: legacy.retention_share,
				financial_equiv: legacy.financial_equiv.max(0.0).round() as u64,
				..MetricValues::default()
			},
		}
	}
}

/// A persisted metric row of either schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredMetric {
	Current(MetricRecord),
	Legacy(LegacyMetricRecord),
}

impl StoredMetric {
	pub fn into_current(self) -> MetricRecord {
		match self {
			StoredMetric::Current(r) => r,
			StoredMetric::Legacy(r) => r.into(),
		}
	}
}

/// Summary of a set of records: ratio fields averaged, count fields summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSummary {
	/// Number of records the summary was derived from.
	pub periods: usize,
	#[serde(flatten)]
	pub metrics: MetricValues,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn period(s: &str) -> ReportingPeriod {
		s.parse().unwrap()
	}

	#[test]
	fn test_field_kinds() {
		let ratios: Vec<_> = MetricField::ALL.iter().filter(|f| f.is_ratio()).collect();
		assert_eq!(ratios.len(), 4);
		assert_eq!(MetricField::FinancialEquiv.kind(), FieldKind::Count);
		assert_eq!(MetricField::RetentionShare.key(), "retention_share");
	}

	#[test]
	fn test_accessors_reject_wrong_kind() {
		let mut v = MetricValues::default();
		assert!(v.ratio_mut(MetricField::ShortDialogs).is_none());
		assert!(v.count_mut(MetricField::Conversion).is_none());
		*v.count_mut(MetricField::ShortDialogs).unwrap() = 7;
		assert_eq!(v.value(MetricField::ShortDialogs), 7.0);
	}

	#[test]
	fn test_validate_ratio_range() {
		let mut v = MetricValues::default();
		assert!(v.validate().is_ok());
		v.autonomy = 1.2;
		assert!(matches!(
			v.validate(),
			Err(ValidationError::RatioOutOfRange { field: "autonomy", .. })
		));
		v.autonomy = f64::NAN;
		assert!(v.validate().is_err());
	}

	#[test]
	fn test_record_missing_fields_default_to_zero() {
		let raw = json!({
			"client_id": "c1",
			"date": "2025-10-01",
			"period_type": "2025-10",
			"conversion": 0.4
		});
		let record: MetricRecord = serde_json::from_value(raw).unwrap();
		assert_eq!(record.metrics.conversion, 0.4);
		assert_eq!(record.metrics.long_dialogs, 0);
		assert_eq!(record.period_type, period("2025-10"));
	}

	#[test]
	fn test_legacy_row_migrates() {
		let raw = json!({
			"id": "m1",
			"client_id": "c1",
			"date": "2024-11-15",
			"conversion": 0.3,
			"autonomy": 0.8,
			"financial_equiv": 12000.0,
			"retention_share": 0.5,
			"period_type": null
		});
		let stored: StoredMetric = serde_json::from_value(raw).unwrap();
		assert!(matches!(stored, StoredMetric::Legacy(_)));
		let record = stored.into_current();
		assert_eq!(record.period_type, period("2024-11"));
		assert_eq!(record.metrics.financial_equiv, 12000);
		assert_eq!(record.metrics.time_saved_hours, 0);
		assert_eq!(record.id.as_deref(), Some("m1"));
	}

	#[test]
	fn test_current_row_with_fractional_savings_stays_current() {
		let raw = json!({
			"client_id": "c1",
			"date": "2025-10-31",
			"period_type": "2025-10",
			"conversion": 0.5,
			"satisfaction": 0.9,
			"financial_equiv": 50000.0,
			"time_saved_hours": 120,
			"short_dialogs": 40.4
		});
		let stored: StoredMetric = serde_json::from_value(raw).unwrap();
		assert!(matches!(stored, StoredMetric::Current(_)));
		let record = stored.into_current();
		assert_eq!(record.metrics.financial_equiv, 50000);
		assert_eq!(record.metrics.satisfaction, 0.9);
		assert_eq!(record.metrics.time_saved_hours, 120);
		assert_eq!(record.metrics.short_dialogs, 40);
	}

	#[test]
	fn test_row_with_current_keys_never_falls_back_to_legacy() {
		// period_type is malformed, so only the legacy shape could still match
		let raw = json!({
			"client_id": "c1",
			"date": "2025-10-31",
			"period_type": "октябрь",
			"financial_equiv": 50000.5,
			"time_saved_hours": 120
		});
		assert!(serde_json::from_value::<StoredMetric>(raw).is_err());
	}

	#[test]
	fn test_negative_count_is_rejected() {
		let raw = json!({
			"client_id": "c1",
			"date": "2025-10-31",
			"period_type": "2025-10",
			"long_dialogs": -3
		});
		assert!(serde_json::from_value::<MetricRecord>(raw).is_err());
	}

	#[test]
	fn test_validate_count_bound() {
		let mut v = MetricValues::default();
		v.confirmed_appointments = MAX_COUNT_VALUE;
		assert!(v.validate().is_ok());
		v.confirmed_appointments = MAX_COUNT_VALUE + 1;
		assert!(matches!(
			v.validate(),
			Err(ValidationError::CountOutOfRange { field: "confirmed_appointments", .. })
		));
	}

	#[test]
	fn test_current_row_round_trips_flat() {
		let mut record = MetricRecord::empty("c1", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), period("2025-01"));
		record.metrics.short_dialogs = 3;
		let value = serde_json::to_value(&record).unwrap();
		assert_eq!(value["short_dialogs"], 3);
		assert!(value.get("metrics").is_none());
		assert!(value.get("id").is_none());
	}

	#[test]
	fn test_record_validate_requires_client() {
		let record = MetricRecord::empty(" ", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), period("2025-01"));
		assert!(matches!(record.validate(), Err(ValidationError::MissingClientId)));
	}
}
