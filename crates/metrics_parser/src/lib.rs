//! Extraction of metric values from free text pasted by an administrator.
//!
//! Each field is located by its own Russian keyword stem followed by optional
//! separators and a number. Fields are matched independently against the whole
//! text, so they may appear in any order and between unrelated content. Only
//! the first occurrence of a keyword is used; a field whose keyword is absent
//! stays at zero.

pub mod preview;

use chrono::NaiveDate;
use models::{FieldKind, MetricField, MetricRecord, MetricValues, ReportingPeriod};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub use preview::{FieldReport, FieldStatus, MetricsPreview, preview};

pub const PARSER_NAME: &str = "metrics_text";

/// Upper bound on the pasted text, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 5000;

// Separators allowed between a keyword and its number.
const SEP: &str = r"[\s:=\-–—]*";
// Digits with at most one decimal separator, comma or dot.
const NUMBER: &str = r"(?P<value>\d+(?:[.,]\d+)?)";

fn keyword(field: MetricField) -> &'static str {
    match field {
        MetricField::Conversion => r"\bконверси[яи]",
        MetricField::Autonomy => r"\bавтономност[ьи]",
        MetricField::Satisfaction => r"\bудовлетвор[её]нност[ьи]",
        MetricField::RetentionShare => r"\bповторн\w*(?:\s+клиент\w*)?",
        MetricField::FinancialEquiv => r"\bэкономи[яи]",
        MetricField::TimeSavedHours => r"\bсэкономлен\w*\s+час\w*",
        MetricField::ConfirmedAppointments => r"\bподтвержд[её]нн\w*\s+запис\w*",
        // \b keeps "нерабочее время" from matching here
        MetricField::BusinessHoursAppointments => r"\bрабоч[иеа]+\s+врем[яи]+",
        MetricField::NonBusinessHoursAppointments => {
            r"(?:\bнерабоч[иеа]+|\bвне\s+рабоч\w*)\s+врем\w*"
        }
        MetricField::ShortDialogs => r"\bкоротк\w*\s+диалог\w*",
        MetricField::MediumDialogs => r"\bсредн\w*\s+диалог\w*",
        MetricField::LongDialogs => r"\b(?:длинн|долг)\w*\s+диалог\w*",
    }
}

static PATTERNS: Lazy<Vec<(MetricField, Regex)>> = Lazy::new(|| {
    MetricField::ALL
        .iter()
        .map(|field| {
            let pattern = format!("(?i){}{}{}", keyword(*field), SEP, NUMBER);
            let re = Regex::new(&pattern).expect("metric keyword patterns are valid");
            (*field, re)
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("text is empty")]
    Empty,

    #[error("text is {actual} characters long, the limit is {max}")]
    TooLong { max: usize, actual: usize },
}

/// Checks the caller-side preconditions: non-blank and at most `max_chars`
/// characters.
pub fn validate_input(text: &str, max_chars: usize) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    let actual = text.chars().count();
    if actual > max_chars {
        return Err(InputError::TooLong {
            max: max_chars,
            actual,
        });
    }
    Ok(())
}

/// Converts a numeric token to `f64`, accepting a decimal comma.
fn parse_number(token: &str) -> Option<f64> {
    token.replace(',', ".").parse::<f64>().ok()
}

/// The raw number written after `field`'s keyword, before any scaling.
pub fn extract_raw(text: &str, field: MetricField) -> Option<f64> {
    let (_, re) = PATTERNS.iter().find(|(f, _)| *f == field)?;
    let caps = re.captures(text)?;
    parse_number(caps.name("value")?.as_str())
}

/// Extracts every field from `text`. Ratios are read as percentages and
/// divided by 100; counts keep their integer part, saturating at `u64::MAX`.
pub fn extract_values(text: &str) -> MetricValues {
    let mut values = MetricValues::default();
    for (field, re) in PATTERNS.iter() {
        let Some(number) = re
            .captures(text)
            .and_then(|c| c.name("value"))
            .and_then(|m| parse_number(m.as_str()))
        else {
            continue;
        };
        match field.kind() {
            FieldKind::Ratio => {
                if let Some(slot) = values.ratio_mut(*field) {
                    *slot = number / 100.0;
                }
            }
            FieldKind::Count => {
                if let Some(slot) = values.count_mut(*field) {
                    *slot = number.trunc() as u64;
                }
            }
        }
    }
    values
}

/// Builds a candidate record for `client_id` and `period` from pasted text.
///
/// Never fails: unrecognized input yields a record with every metric at zero.
pub fn parse_metrics(
    text: &str,
    client_id: &str,
    period: ReportingPeriod,
    date: NaiveDate,
) -> MetricRecord {
    MetricRecord {
        metrics: extract_values(text),
        ..MetricRecord::empty(client_id, date, period)
    }
}

pub struct MetricsTextParser {
    pub max_input_chars: usize,
}

impl Default for MetricsTextParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_CHARS)
    }
}

impl MetricsTextParser {
    pub fn new(max_input_chars: usize) -> Self {
        Self { max_input_chars }
    }

    /// Validates the text, then parses it and prepares the review preview.
    pub fn parse_for_review(
        &self,
        text: &str,
        client_id: &str,
        period: ReportingPeriod,
        date: NaiveDate,
    ) -> Result<MetricsPreview, InputError> {
        validate_input(text, self.max_input_chars)?;
        tracing::debug!(parser = PARSER_NAME, client_id, %period, "parsing pasted metrics");
        Ok(preview(parse_metrics(text, client_id, period, date)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn period() -> ReportingPeriod {
        "2025-10".parse().unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()
    }

    #[test]
    fn test_percentage_conversion() {
        let v = extract_values("конверсия 75%");
        assert!(approx(v.conversion, 0.75));
    }

    #[test]
    fn test_decimal_comma() {
        let v = extract_values("автономность 85,5");
        assert!(approx(v.autonomy, 0.855));
    }

    #[test]
    fn test_decimal_point() {
        let v = extract_values("Автономность: 85.5 %");
        assert!(approx(v.autonomy, 0.855));
    }

    #[test]
    fn test_irrelevant_text_yields_zero_record() {
        let v = extract_values("Добрый день! Отчет пришлем завтра, 2025 год.");
        assert!(v.is_all_zero());
        assert_eq!(v, MetricValues::default());
    }

    #[test]
    fn test_empty_text_yields_zero_record() {
        assert!(extract_values("").is_all_zero());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let v = extract_values("конверсия 40%\nещё раз конверсия 90%");
        assert!(approx(v.conversion, 0.40));
    }

    #[test]
    fn test_case_insensitive() {
        let v = extract_values("КОНВЕРСИЯ 12 ЭКОНОМИЯ 300");
        assert!(approx(v.conversion, 0.12));
        assert_eq!(v.financial_equiv, 300);
    }

    #[test]
    fn test_end_to_end_headline_fields() {
        let text = "конверсия 75, автономность 85.5, экономия 50000, повторные 45%";
        let record = parse_metrics(text, "client-1", period(), date());

        assert_eq!(record.client_id, "client-1");
        assert_eq!(record.period_type, period());
        assert_eq!(record.date, date());
        assert!(approx(record.metrics.conversion, 0.75));
        assert!(approx(record.metrics.autonomy, 0.855));
        assert_eq!(record.metrics.financial_equiv, 50000);
        assert!(approx(record.metrics.retention_share, 0.45));

        assert_eq!(record.metrics.satisfaction, 0.0);
        assert_eq!(record.metrics.time_saved_hours, 0);
        assert_eq!(record.metrics.confirmed_appointments, 0);
        assert_eq!(record.metrics.business_hours_appointments, 0);
        assert_eq!(record.metrics.non_business_hours_appointments, 0);
        assert_eq!(record.metrics.short_dialogs, 0);
        assert_eq!(record.metrics.medium_dialogs, 0);
        assert_eq!(record.metrics.long_dialogs, 0);
    }

    #[test]
    fn test_order_insensitive_and_interleaved() {
        let text = "Итоги месяца.\n\
                    Длинные диалоги: 4\n\
                    Записи в нерабочее время - 12\n\
                    Удовлетворенность 92%\n\
                    Записи в рабочее время 30\n\
                    Подтвержденные записи: 41\n\
                    Сэкономлено часов 118,7\n\
                    Короткие диалоги 150, средние диалоги 60";
        let v = extract_values(text);
        assert_eq!(v.long_dialogs, 4);
        assert_eq!(v.non_business_hours_appointments, 12);
        assert_eq!(v.business_hours_appointments, 30);
        assert!(approx(v.satisfaction, 0.92));
        assert_eq!(v.confirmed_appointments, 41);
        assert_eq!(v.time_saved_hours, 118);
        assert_eq!(v.short_dialogs, 150);
        assert_eq!(v.medium_dialogs, 60);
    }

    #[test]
    fn test_non_business_hours_does_not_feed_business_hours() {
        let v = extract_values("нерабочее время 7");
        assert_eq!(v.non_business_hours_appointments, 7);
        assert_eq!(v.business_hours_appointments, 0);

        let v = extract_values("вне рабочего времени 3; рабочее время 9");
        assert_eq!(v.non_business_hours_appointments, 3);
        assert_eq!(v.business_hours_appointments, 9);
    }

    #[test]
    fn test_savings_keyword_skips_non_numeric_neighbour() {
        let v = extract_values("экономия времени заметна, экономия 1200");
        assert_eq!(v.financial_equiv, 1200);
    }

    #[test]
    fn test_retention_with_clients_word() {
        let v = extract_values("Повторные клиенты: 33%");
        assert!(approx(v.retention_share, 0.33));
    }

    #[test]
    fn test_count_truncates_fraction() {
        let v = extract_values("экономия 999,9");
        assert_eq!(v.financial_equiv, 999);
    }

    #[test]
    fn test_out_of_range_percentage_is_kept_for_review() {
        let v = extract_values("конверсия 150%");
        assert!(approx(v.conversion, 1.5));
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_extract_raw_is_unscaled() {
        assert_eq!(extract_raw("конверсия 75%", MetricField::Conversion), Some(75.0));
        assert_eq!(extract_raw("конверсия", MetricField::Conversion), None);
    }

    #[test]
    fn test_validate_input() {
        assert_eq!(validate_input("   \n", 10), Err(InputError::Empty));
        assert_eq!(
            validate_input("конверсия", 5),
            Err(InputError::TooLong { max: 5, actual: 9 })
        );
        // limit counts characters, not UTF-8 bytes
        assert!(validate_input("конверсия", 9).is_ok());
    }

    #[test]
    fn test_parse_for_review_checks_length() {
        let parser = MetricsTextParser::new(10);
        let long = "конверсия 75% автономность 80%";
        assert!(matches!(
            parser.parse_for_review(long, "c1", period(), date()),
            Err(InputError::TooLong { .. })
        ));

        let parser = MetricsTextParser::default();
        let preview = parser.parse_for_review(long, "c1", period(), date()).unwrap();
        assert!(approx(preview.record.metrics.autonomy, 0.80));
    }
}
