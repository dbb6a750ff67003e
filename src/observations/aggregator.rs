use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Observation count per calendar month; always holds months 1 through 12
pub type MonthlyCounts = BTreeMap<u32, u64>;

/// Buckets observation records by the month of their `observed_on` date.
///
/// Records without a parseable date are skipped.
pub fn aggregate_by_month(records: &[Value]) -> MonthlyCounts {
    let mut counts: MonthlyCounts = (1..=12).map(|month| (month, 0)).collect();
    let mut skipped = 0;

    for record in records {
        let Some(observed_on) = record.get("observed_on").and_then(Value::as_str) else {
            skipped += 1;
            continue;
        };

        match parse_observed_month(observed_on) {
            Some(month) => *counts.entry(month).or_insert(0) += 1,
            None => {
                debug!("Error parsing observation date '{}'", observed_on);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} observations without a usable date", skipped);
    }

    counts
}

fn parse_observed_month(observed_on: &str) -> Option<u32> {
    let trimmed = observed_on.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.month());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.month());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|datetime| datetime.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_records_yield_twelve_zero_months() {
        let counts = aggregate_by_month(&[]);
        assert_eq!(counts.len(), 12);
        assert!(counts.values().all(|count| *count == 0));
        assert_eq!(counts.keys().copied().collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_counts_by_month() {
        let records = vec![
            json!({"observed_on": "2021-01-15"}),
            json!({"observed_on": "2019-01-02"}),
            json!({"observed_on": "2020-07-30"}),
        ];

        let counts = aggregate_by_month(&records);
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&7], 1);
        assert_eq!(counts[&12], 0);
    }

    #[test]
    fn test_unparseable_dates_are_skipped() {
        let records = vec![
            json!({"observed_on": "2021-03-15"}),
            json!({"observed_on": "not a date"}),
            json!({"observed_on": null}),
            json!({"species_guess": "no date at all"}),
            json!({"observed_on": "2021-13-40"}),
        ];

        let counts = aggregate_by_month(&records);
        assert_eq!(counts[&3], 1);
        assert_eq!(counts.values().sum::<u64>(), 1);
    }

    #[test]
    fn test_accepts_timestamp_forms() {
        let records = vec![
            json!({"observed_on": "2022-08-01T10:15:00+08:00"}),
            json!({"observed_on": "2022-09-01 06:00:00"}),
        ];

        let counts = aggregate_by_month(&records);
        assert_eq!(counts[&8], 1);
        assert_eq!(counts[&9], 1);
    }
}
