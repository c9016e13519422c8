//! Dense reporting over a month range.
//!
//! Buckets are materialized for every day (single-month range) or every
//! month (multi-month range) and every taxonomy category, zero-filled,
//! in strictly ascending order. Clients never have to fill gaps.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::{EngineError, ResultEngine, categories};

/// Inclusive `YYYY-MM` .. `YYYY-MM` range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthRange {
    start: (i32, u32),
    end: (i32, u32),
}

impl MonthRange {
    pub fn parse(start: &str, end: &str) -> ResultEngine<Self> {
        let start = parse_month(start)?;
        let end = parse_month(end)?;
        if start > end {
            return Err(EngineError::InvalidDate(
                "start month is after end month".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn granularity(&self) -> Granularity {
        if self.start == self.end {
            Granularity::Daily
        } else {
            Granularity::Monthly
        }
    }

    /// First calendar day covered by the range.
    pub fn first_day(&self) -> NaiveDate {
        // Month components were validated in `parse`.
        #[allow(clippy::unwrap_used)]
        let day = NaiveDate::from_ymd_opt(self.start.0, self.start.1, 1).unwrap();
        day
    }

    /// Last calendar day covered by the range.
    pub fn last_day(&self) -> NaiveDate {
        let (year, month) = next_month(self.end.0, self.end.1);
        let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)
            .unwrap_or(NaiveDate::MAX);
        first_of_next.pred_opt().unwrap_or(first_of_next)
    }

    fn months(&self) -> Vec<(i32, u32)> {
        let mut months = Vec::new();
        let (mut year, mut month) = self.start;
        loop {
            months.push((year, month));
            if (year, month) == self.end {
                break;
            }
            (year, month) = next_month(year, month);
        }
        months
    }
}

fn parse_month(value: &str) -> ResultEngine<(i32, u32)> {
    let invalid = || EngineError::InvalidDate(format!("invalid month: {value}"));
    let (year, month) = value.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Monthly,
}

/// Which member attribution a report covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemberFilter {
    #[default]
    All,
    /// Records attributed to nobody.
    Unattributed,
    Member(i32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: &'static str,
    pub total_cents: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// `YYYY-MM-DD` for daily buckets, `YYYY-MM` for monthly ones.
    pub label: String,
    pub total_cents: i64,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub granularity: Granularity,
    pub buckets: Vec<Bucket>,
}

/// Fold dated rows into the dense bucket grid.
///
/// A bucket slot holds the sum of every row with that category in the
/// bucket period, expense and income alike: the taxonomy keeps the two
/// kinds disjoint except by deliberate sharing of a label, and downstream
/// views render the column as a single figure.
pub fn aggregate<'a, I>(range: MonthRange, rows: I) -> Report
where
    I: IntoIterator<Item = (NaiveDate, &'a str, i64)>,
{
    let labels: Vec<&'static str> = categories::all().collect();
    let slot_of: HashMap<&'static str, usize> = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (*label, idx))
        .collect();

    let granularity = range.granularity();
    let keys: Vec<String> = match granularity {
        Granularity::Daily => {
            let mut days = Vec::new();
            let mut day = range.first_day();
            let last = range.last_day();
            while day <= last {
                days.push(day.format("%Y-%m-%d").to_string());
                let Some(next) = day.succ_opt() else { break };
                day = next;
            }
            days
        }
        Granularity::Monthly => range
            .months()
            .into_iter()
            .map(|(year, month)| format!("{year:04}-{month:02}"))
            .collect(),
    };

    let mut grid: Vec<Vec<i64>> = vec![vec![0; labels.len()]; keys.len()];
    let bucket_index: HashMap<&str, usize> = keys
        .iter()
        .enumerate()
        .map(|(idx, key)| (key.as_str(), idx))
        .collect();

    for (date, category, amount_cents) in rows {
        let key = match granularity {
            Granularity::Daily => date.format("%Y-%m-%d").to_string(),
            Granularity::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
        };
        let Some(&bucket) = bucket_index.get(key.as_str()) else {
            continue;
        };
        let Some(&slot) = slot_of.get(category) else {
            tracing::warn!(category, "record with unknown category skipped in report");
            continue;
        };
        grid[bucket][slot] += amount_cents;
    }

    let buckets = keys
        .into_iter()
        .zip(grid)
        .map(|(label, totals)| {
            let total_cents = totals.iter().sum();
            let categories = labels
                .iter()
                .zip(totals)
                .map(|(category, total_cents)| CategoryTotal {
                    category,
                    total_cents,
                })
                .collect();
            Bucket {
                label,
                total_cents,
                categories,
            }
        })
        .collect();

    Report {
        granularity,
        buckets,
    }
}
