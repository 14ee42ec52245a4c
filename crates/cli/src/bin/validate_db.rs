use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use models::{FieldKind, MetricField, ReportingPeriod, MAX_COUNT_VALUE};
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::PathBuf,
};

#[derive(Parser, Debug)]
#[command(
    name = "validate-db",
    about = "Check the metrics document database for rows the dashboard would reject or misread."
)]
struct Args {
    /// Database file; defaults to database_path from settings.json
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Path to settings.json (optional)
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

#[derive(Default)]
struct Report {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Report {
    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }
    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
    fn print(&self, file: &str) {
        for w in &self.warnings {
            println!("[WARN] {}: {}", file, w);
        }
        for e in &self.errors {
            println!("[ERROR] {}: {}", file, e);
        }
    }
    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn validate_clients(val: &Value, rep: &mut Report) -> HashSet<String> {
    let mut ids = HashSet::new();
    let Some(clients) = val.get("clients").and_then(|v| v.as_array()) else {
        rep.warn("missing or non-array 'clients'");
        return ids;
    };
    for (i, c) in clients.iter().enumerate() {
        let id = c.get("id").and_then(|v| v.as_str()).unwrap_or("");
        if id.is_empty() {
            rep.error(format!("clients[{}] missing 'id'", i));
        } else if !ids.insert(id.to_string()) {
            rep.error(format!("clients[{}] duplicate id '{}'", i, id));
        }
        let company = c.get("company_name").and_then(|v| v.as_str()).unwrap_or("");
        if company.trim().is_empty() {
            rep.error(format!("clients[{}] missing 'company_name'", i));
        }
    }
    ids
}

fn validate_metric_row(i: usize, row: &Value, known_clients: &HashSet<String>, rep: &mut Report) {
    let client_id = row.get("client_id").and_then(|v| v.as_str()).unwrap_or("");
    if client_id.trim().is_empty() {
        rep.error(format!("metrics[{}] missing 'client_id'", i));
    } else if !known_clients.contains(client_id) {
        rep.warn(format!("metrics[{}] references unknown client '{}'", i, client_id));
    }

    let date = row.get("date").and_then(|v| v.as_str()).unwrap_or("");
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        rep.error(format!("metrics[{}] invalid date '{}', expected YYYY-MM-DD", i, date));
    }

    match row.get("period_type").and_then(|v| v.as_str()) {
        None => rep.warn(format!(
            "metrics[{}] has no 'period_type' (legacy row, period taken from date)",
            i
        )),
        Some(p) => {
            if let Err(e) = p.parse::<ReportingPeriod>() {
                rep.error(format!("metrics[{}] {}", i, e));
            }
        }
    }

    for field in MetricField::ALL {
        let Some(v) = row.get(field.key()) else {
            continue;
        };
        let Some(n) = v.as_f64() else {
            rep.error(format!("metrics[{}] '{}' is not a number", i, field.key()));
            continue;
        };
        match field.kind() {
            FieldKind::Ratio => {
                if !(0.0..=1.0).contains(&n) {
                    rep.error(format!(
                        "metrics[{}] '{}' = {} is outside [0, 1]",
                        i,
                        field.key(),
                        n
                    ));
                }
            }
            FieldKind::Count => {
                if n < 0.0 {
                    rep.error(format!("metrics[{}] '{}' is negative", i, field.key()));
                } else if n > MAX_COUNT_VALUE as f64 {
                    rep.error(format!(
                        "metrics[{}] '{}' = {} is above {}",
                        i,
                        field.key(),
                        n,
                        MAX_COUNT_VALUE
                    ));
                } else if n.fract() != 0.0 {
                    rep.warn(format!(
                        "metrics[{}] '{}' = {} is fractional (will be rounded)",
                        i,
                        field.key(),
                        n
                    ));
                }
            }
        }
    }
}

fn validate_database(val: &Value) -> Report {
    let mut rep = Report::default();
    let known_clients = validate_clients(val, &mut rep);

    let Some(metrics) = val.get("metrics").and_then(|v| v.as_array()) else {
        rep.warn("missing or non-array 'metrics'");
        return rep;
    };

    // only the last row of a (client, period) pair is ever shown
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    for (i, row) in metrics.iter().enumerate() {
        validate_metric_row(i, row, &known_clients, &mut rep);
        let client_id = row.get("client_id").and_then(|v| v.as_str()).unwrap_or("");
        if let Some(period) = row.get("period_type").and_then(|v| v.as_str()) {
            let key = (client_id.to_string(), period.to_string());
            if let Some(first) = seen.get(&key) {
                rep.warn(format!(
                    "metrics[{}] duplicates metrics[{}] for client '{}' period {}",
                    i, first, client_id, period
                ));
            } else {
                seen.insert(key, i);
            }
        }
    }
    rep
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = settings_loader::load_settings_with_fallback(args.settings.as_ref())?
        .unwrap_or_default();

    let db_path = args
        .database
        .or(settings.database_path)
        .ok_or_else(|| anyhow!("no database file: pass --database or set database_path"))?;

    let txt = fs::read_to_string(&db_path)
        .with_context(|| format!("reading {}", db_path.display()))?;
    let val: Value =
        serde_json::from_str(&txt).with_context(|| format!("parsing {}", db_path.display()))?;

    let report = validate_database(&val);
    let file_name = db_path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    report.print(file_name);

    if report.has_errors() {
        Err(anyhow!("Validation failed"))
    } else {
        println!("Database passed basic validation.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db(metrics: Value) -> Value {
        json!({
            "clients": [{"id": "c1", "company_name": "Клиника"}],
            "metrics": metrics
        })
    }

    #[test]
    fn test_clean_database_passes() {
        let rep = validate_database(&db(json!([
            {"client_id": "c1", "date": "2025-10-31", "period_type": "2025-10",
             "conversion": 0.75, "confirmed_appointments": 12}
        ])));
        assert!(!rep.has_errors());
        assert!(rep.warnings.is_empty());
    }

    #[test]
    fn test_out_of_range_ratio_is_error() {
        let rep = validate_database(&db(json!([
            {"client_id": "c1", "date": "2025-10-31", "period_type": "2025-10", "autonomy": 85.5}
        ])));
        assert!(rep.has_errors());
        assert!(rep.errors[0].contains("autonomy"));
    }

    #[test]
    fn test_implausible_count_is_error() {
        let rep = validate_database(&db(json!([
            {"client_id": "c1", "date": "2025-10-31", "period_type": "2025-10",
             "short_dialogs": 99999999999999999999.0}
        ])));
        assert!(rep.has_errors());
        assert!(rep.errors[0].contains("short_dialogs"));
    }

    #[test]
    fn test_bad_period_and_date_are_errors() {
        let rep = validate_database(&db(json!([
            {"client_id": "c1", "date": "31.10.2025", "period_type": "2025-13"}
        ])));
        assert_eq!(rep.errors.len(), 2);
    }

    #[test]
    fn test_legacy_row_and_duplicates_are_warnings() {
        let rep = validate_database(&db(json!([
            {"client_id": "c1", "date": "2025-09-30", "financial_equiv": 1200.5},
            {"client_id": "c1", "date": "2025-10-01", "period_type": "2025-10"},
            {"client_id": "c1", "date": "2025-10-31", "period_type": "2025-10"},
            {"client_id": "ghost", "date": "2025-10-31", "period_type": "2025-10"}
        ])));
        assert!(!rep.has_errors());
        assert_eq!(rep.warnings.len(), 4);
        assert!(rep.warnings.iter().any(|w| w.contains("duplicates metrics[1]")));
        assert!(rep.warnings.iter().any(|w| w.contains("unknown client 'ghost'")));
    }

    #[test]
    fn test_duplicate_client_ids() {
        let rep = validate_database(&json!({
            "clients": [
                {"id": "c1", "company_name": "A"},
                {"id": "c1", "company_name": ""}
            ],
            "metrics": []
        }));
        assert_eq!(rep.errors.len(), 2);
    }
}
