use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A calendar month identified by a `YYYY-MM` key.
///
/// This is the unit of metric granularity: one record per client per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportingPeriod {
	year: i32,
	month: u32,
}

const MONTH_NAMES_RU: [&str; 12] = [
	"Январь",
	"Февраль",
	"Март",
	"Апрель",
	"Май",
	"Июнь",
	"Июль",
	"Август",
	"Сентябрь",
	"Октябрь",
	"Ноябрь",
	"Декабрь",
];

impl ReportingPeriod {
	pub const MIN: Self = Self { year: 1900, month: 1 };
	pub const MAX: Self = Self { year: 9999, month: 12 };

	pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
		if !(1..=12).contains(&month) || !(Self::MIN.year..=Self::MAX.year).contains(&year) {
			return Err(ValidationError::InvalidPeriod(format!("{}-{:02}", year, month)));
		}
		Ok(Self { year, month })
	}

	/// Month of `date`, saturated to `MIN..=MAX`.
	pub fn from_date(date: NaiveDate) -> Self {
		Self::from_index(date.year() as i64 * 12 + date.month0() as i64)
	}

	pub fn year(&self) -> i32 {
		self.year
	}

	pub fn month(&self) -> u32 {
		self.month
	}

	/// First day of the month.
	pub fn first_day(&self) -> NaiveDate {
		// month and year are range-checked on construction
		NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
	}

	pub fn previous(&self) -> Self {
		self.minus_months(1)
	}

	/// Following month; `MAX` stays `MAX`.
	pub fn next(&self) -> Self {
		Self::from_index(self.index() + 1)
	}

	/// Month `months` before this one; saturates at `MIN`.
	pub fn minus_months(&self, months: u32) -> Self {
		Self::from_index(self.index() - months as i64)
	}

	fn index(&self) -> i64 {
		self.year as i64 * 12 + (self.month as i64 - 1)
	}

	fn from_index(index: i64) -> Self {
		let index = index.clamp(Self::MIN.index(), Self::MAX.index());
		Self {
			year: index.div_euclid(12) as i32,
			month: index.rem_euclid(12) as u32 + 1,
		}
	}

	/// Display label such as "Октябрь 2025".
	pub fn label(&self) -> String {
		format!("{} {}", MONTH_NAMES_RU[(self.month - 1) as usize], self.year)
	}
}

impl fmt::Display for ReportingPeriod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:04}-{:02}", self.year, self.month)
	}
}

impl FromStr for ReportingPeriod {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = || ValidationError::InvalidPeriod(s.to_string());
		let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
		if y.len() != 4 || m.len() != 2 {
			return Err(invalid());
		}
		let year: i32 = y.parse().map_err(|_| invalid())?;
		let month: u32 = m.parse().map_err(|_| invalid())?;
		Self::new(year, month).map_err(|_| invalid())
	}
}

impl TryFrom<String> for ReportingPeriod {
	type Error = ValidationError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<ReportingPeriod> for String {
	fn from(value: ReportingPeriod) -> Self {
		value.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_and_display() {
		let p: ReportingPeriod = "2025-10".parse().unwrap();
		assert_eq!(p.year(), 2025);
		assert_eq!(p.month(), 10);
		assert_eq!(p.to_string(), "2025-10");
	}

	#[test]
	fn test_parse_rejects_malformed_keys() {
		assert!("2025-13".parse::<ReportingPeriod>().is_err());
		assert!("2025-1".parse::<ReportingPeriod>().is_err());
		assert!("2025/10".parse::<ReportingPeriod>().is_err());
		assert!("".parse::<ReportingPeriod>().is_err());
	}

	#[test]
	fn test_minus_months_crosses_year_boundary() {
		let p: ReportingPeriod = "2025-03".parse().unwrap();
		assert_eq!(p.minus_months(5).to_string(), "2024-10");
		assert_eq!(p.minus_months(11).to_string(), "2024-04");
		assert_eq!(p.previous().to_string(), "2025-02");
		assert_eq!("2024-12".parse::<ReportingPeriod>().unwrap().next().to_string(), "2025-01");
	}

	#[test]
	fn test_arithmetic_saturates_at_bounds() {
		let last: ReportingPeriod = "9999-12".parse().unwrap();
		assert_eq!(last.next(), ReportingPeriod::MAX);
		let first: ReportingPeriod = "1900-03".parse().unwrap();
		assert_eq!(first.minus_months(5), ReportingPeriod::MIN);
		assert_eq!(ReportingPeriod::MIN.previous().to_string(), "1900-01");
		// saturated values still round-trip through the key format
		let key = last.next().to_string();
		assert_eq!(key.parse::<ReportingPeriod>().unwrap(), last);
		let d = NaiveDate::from_ymd_opt(1850, 6, 1).unwrap();
		assert_eq!(ReportingPeriod::from_date(d), ReportingPeriod::MIN);
	}

	#[test]
	fn test_serde_as_string() {
		let p: ReportingPeriod = serde_json::from_str("\"2024-07\"").unwrap();
		assert_eq!(serde_json::to_string(&p).unwrap(), "\"2024-07\"");
		assert!(serde_json::from_str::<ReportingPeriod>("\"July\"").is_err());
	}

	#[test]
	fn test_label_is_russian_month_name() {
		let p: ReportingPeriod = "2025-10".parse().unwrap();
		assert_eq!(p.label(), "Октябрь 2025");
	}

	#[test]
	fn test_from_date() {
		let d = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
		assert_eq!(ReportingPeriod::from_date(d).to_string(), "2025-01");
	}
}
