// Spending analytics
//
// Pure aggregations over listed records. These read whatever `list`
// returned; they never talk to the store themselves.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::expense::{Category, ExpenseRecord};

pub fn total_amount(records: &[ExpenseRecord]) -> f64 {
    records.iter().map(|r| r.amount).sum()
}

/// One bucket per variant, in display order, zeros included. The closed
/// category set makes this total: nothing ever falls outside the report.
pub fn totals_by_category(records: &[ExpenseRecord]) -> Vec<(Category, f64)> {
    Category::ALL
        .iter()
        .map(|&category| {
            let total = records
                .iter()
                .filter(|r| r.category == category)
                .map(|r| r.amount)
                .sum();
            (category, total)
        })
        .collect()
}

/// Per-person totals, biggest spender first. Records with no attribution
/// group under an empty key.
pub fn totals_by_person(records: &[ExpenseRecord]) -> Vec<(String, f64)> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        *buckets.entry(record.person.clone()).or_insert(0.0) += record.amount;
    }
    let mut totals: Vec<(String, f64)> = buckets.into_iter().collect();
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals
}

/// Chronological per-day series.
pub fn daily_totals(records: &[ExpenseRecord]) -> Vec<(NaiveDate, f64)> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        *buckets.entry(record.date).or_insert(0.0) += record.amount;
    }
    buckets.into_iter().collect()
}

/// Chronological per-month ("YYYY-MM") series.
pub fn monthly_totals(records: &[ExpenseRecord]) -> Vec<(String, f64)> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        let month = format!("{:04}-{:02}", record.date.year(), record.date.month());
        *buckets.entry(month).or_insert(0.0) += record.amount;
    }
    buckets.into_iter().collect()
}

/// Spend in the calendar month containing `today`.
pub fn current_month_total(records: &[ExpenseRecord], today: NaiveDate) -> f64 {
    records
        .iter()
        .filter(|r| r.date.year() == today.year() && r.date.month() == today.month())
        .map(|r| r.amount)
        .sum()
}

/// Keep only records from the last `days` days, inclusive of `today`.
pub fn within_last_days(
    records: &[ExpenseRecord],
    days: u32,
    today: NaiveDate,
) -> Vec<ExpenseRecord> {
    let cutoff = today - chrono::Duration::days(days as i64);
    records
        .iter()
        .filter(|r| r.date > cutoff && r.date <= today)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(item: &str, amount: f64, category: Category, person: &str, date: (i32, u32, u32)) -> ExpenseRecord {
        ExpenseRecord {
            id: 0,
            item: item.to_string(),
            quantity: "1 piece".to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            amount,
            category,
            person: person.to_string(),
            created_at: Utc::now(),
        }
    }

    fn sample() -> Vec<ExpenseRecord> {
        vec![
            record("Milk", 3.5, Category::Groceries, "Harsha", (2024, 3, 1)),
            record("Rice", 8.0, Category::Groceries, "Mathew", (2024, 3, 2)),
            record("Chips", 1.5, Category::Snacks, "Harsha", (2024, 2, 20)),
            record("Soap", 2.0, Category::PersonalCare, "", (2024, 3, 2)),
        ]
    }

    #[test]
    fn test_total_amount() {
        assert_eq!(total_amount(&sample()), 15.0);
        assert_eq!(total_amount(&[]), 0.0);
    }

    #[test]
    fn test_totals_by_category_has_every_bucket() {
        let totals = totals_by_category(&sample());
        assert_eq!(totals.len(), Category::ALL.len());

        let lookup = |c: Category| totals.iter().find(|(cat, _)| *cat == c).unwrap().1;
        assert_eq!(lookup(Category::Groceries), 11.5);
        assert_eq!(lookup(Category::Snacks), 1.5);
        assert_eq!(lookup(Category::Medicine), 0.0);
    }

    #[test]
    fn test_totals_by_person_sorted_desc() {
        let totals = totals_by_person(&sample());
        assert_eq!(totals[0], ("Mathew".to_string(), 8.0));
        assert_eq!(totals[1], ("Harsha".to_string(), 5.0));
        // Unattributed spend keeps its own bucket.
        assert_eq!(totals[2], (String::new(), 2.0));
    }

    #[test]
    fn test_daily_totals_merge_same_day() {
        let totals = daily_totals(&sample());
        let march_2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(
            totals.iter().find(|(d, _)| *d == march_2).unwrap().1,
            10.0
        );
        // Chronological order.
        assert!(totals.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_monthly_totals() {
        let totals = monthly_totals(&sample());
        assert_eq!(totals, vec![("2024-02".to_string(), 1.5), ("2024-03".to_string(), 13.5)]);
    }

    #[test]
    fn test_current_month_total() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(current_month_total(&sample(), today), 13.5);
    }

    #[test]
    fn test_within_last_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let recent = within_last_days(&sample(), 7, today);
        assert_eq!(recent.len(), 3);
        assert!(recent.iter().all(|r| r.item != "Chips"));
    }
}
