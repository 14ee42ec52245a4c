use models::{MetricField, MetricRecord, MAX_COUNT_VALUE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Recognized,
    /// Value is zero: keyword missing from the text, or genuinely zero.
    NotRecognized,
    /// Ratio above 100% or count above `MAX_COUNT_VALUE`; the record will not
    /// pass validation as is.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub field: MetricField,
    pub label: String,
    pub value: f64,
    pub status: FieldStatus,
}

/// A parsed candidate plus per-field review flags, shown to a human before
/// the record is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPreview {
    pub record: MetricRecord,
    pub fields: Vec<FieldReport>,
}

impl MetricsPreview {
    pub fn unrecognized(&self) -> Vec<MetricField> {
        self.with_status(FieldStatus::NotRecognized)
    }

    pub fn out_of_range(&self) -> Vec<MetricField> {
        self.with_status(FieldStatus::OutOfRange)
    }

    pub fn has_warnings(&self) -> bool {
        self.fields.iter().any(|f| f.status != FieldStatus::Recognized)
    }

    fn with_status(&self, status: FieldStatus) -> Vec<MetricField> {
        self.fields
            .iter()
            .filter(|f| f.status == status)
            .map(|f| f.field)
            .collect()
    }
}

pub fn preview(record: MetricRecord) -> MetricsPreview {
    let fields = MetricField::ALL
        .iter()
        .map(|field| {
            let value = record.metrics.value(*field);
            let status = if value == 0.0 {
                tracing::debug!(field = field.key(), client_id = %record.client_id, "metric not recognized");
                FieldStatus::NotRecognized
            } else if field.is_ratio() && value > 1.0 {
                FieldStatus::OutOfRange
            } else if record.metrics.count(*field).is_some_and(|n| n > MAX_COUNT_VALUE) {
                FieldStatus::OutOfRange
            } else {
                FieldStatus::Recognized
            };
            FieldReport {
                field: *field,
                label: field.label().to_string(),
                value,
                status,
            }
        })
        .collect();
    MetricsPreview { record, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_metrics;
    use chrono::NaiveDate;

    fn parse(text: &str) -> MetricRecord {
        parse_metrics(
            text,
            "c1",
            "2025-10".parse().unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        )
    }

    #[test]
    fn test_zero_fields_are_flagged() {
        let p = preview(parse("конверсия 75%, экономия 50000"));
        assert_eq!(p.fields.len(), MetricField::ALL.len());
        let missing = p.unrecognized();
        assert!(!missing.contains(&MetricField::Conversion));
        assert!(!missing.contains(&MetricField::FinancialEquiv));
        assert!(missing.contains(&MetricField::Autonomy));
        assert_eq!(missing.len(), MetricField::ALL.len() - 2);
        assert!(p.has_warnings());
    }

    #[test]
    fn test_out_of_range_ratio_is_flagged() {
        let p = preview(parse("автономность 120"));
        assert_eq!(p.out_of_range(), vec![MetricField::Autonomy]);
    }

    #[test]
    fn test_implausible_count_is_flagged() {
        let p = preview(parse("короткие диалоги 99999999999999999999999 экономия 1000000000"));
        assert_eq!(p.out_of_range(), vec![MetricField::ShortDialogs]);
        assert!(p.record.validate().is_err());
    }

    #[test]
    fn test_fully_recognized_text_has_no_warnings() {
        let text = "конверсия 10 автономность 20 удовлетворенность 30 повторные 40 \
                    экономия 5 сэкономлено часов 6 подтвержденные записи 7 \
                    рабочее время 8 нерабочее время 9 короткие диалоги 10 \
                    средние диалоги 11 длинные диалоги 12";
        let p = preview(parse(text));
        assert!(!p.has_warnings(), "{:?}", p.unrecognized());
    }
}
