//! Time-bucketed status counts over already fetched rows.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::attendance::AttendanceRecord;
use crate::model::leave_request::LeaveRequest;
use crate::model::task::Task;

/// Status enums that can be counted per bucket.
pub trait StatusSet: Copy + Ord + IntoEnumIterator + AsRef<str> + Serialize {}

impl<T> StatusSet for T where T: Copy + Ord + IntoEnumIterator + AsRef<str> + Serialize {}

/// A row that carries a date and a status.
pub trait Bucketed {
    type Status: StatusSet;

    /// `None` when the row has no usable date; such rows are skipped.
    fn bucket_date(&self) -> Option<NaiveDate>;
    fn status(&self) -> Self::Status;
}

impl Bucketed for Task {
    type Status = crate::model::task::TaskStatus;

    fn bucket_date(&self) -> Option<NaiveDate> {
        self.created_at.map(|ts| ts.date_naive())
    }

    fn status(&self) -> Self::Status {
        self.status
    }
}

impl Bucketed for LeaveRequest {
    type Status = crate::model::leave_request::LeaveStatus;

    fn bucket_date(&self) -> Option<NaiveDate> {
        Some(self.start_date)
    }

    fn status(&self) -> Self::Status {
        self.status
    }
}

impl Bucketed for AttendanceRecord {
    type Status = crate::model::attendance::AttendanceStatus;

    fn bucket_date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn status(&self) -> Self::Status {
        self.status
    }
}

#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Week,
    Month,
}

impl Granularity {
    /// Truncates `date` to the first day of its bucket. Weeks start on Sunday.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_sunday() as i64)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day | Granularity::Week => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%b %Y").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<S: StatusSet> {
    pub key: String,
    pub start: NaiveDate,
    pub counts: BTreeMap<S, u32>,
    pub total: u32,
}

impl<S: StatusSet> Bucket<S> {
    fn empty(granularity: Granularity, start: NaiveDate) -> Self {
        Bucket {
            key: granularity.label(start),
            start,
            counts: zeroed(),
            total: 0,
        }
    }

    pub fn count(&self, status: S) -> u32 {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

/// Buckets keyed by their start date, so months sort chronologically.
pub type Aggregation<S> = BTreeMap<NaiveDate, Bucket<S>>;

fn zeroed<S: StatusSet>() -> BTreeMap<S, u32> {
    S::iter().map(|s| (s, 0)).collect()
}

pub fn aggregate<R: Bucketed>(rows: &[R], granularity: Granularity) -> Aggregation<R::Status> {
    let mut buckets: Aggregation<R::Status> = BTreeMap::new();

    for row in rows {
        let Some(date) = row.bucket_date() else {
            continue;
        };
        let start = granularity.bucket_start(date);
        let bucket = buckets
            .entry(start)
            .or_insert_with(|| Bucket::empty(granularity, start));
        *bucket.counts.entry(row.status()).or_insert(0) += 1;
        bucket.total += 1;
    }

    buckets
}

/// Per-status totals over all rows, every status present.
pub fn count_by_status<R: Bucketed>(rows: &[R]) -> BTreeMap<R::Status, u32> {
    let mut counts = zeroed();
    for row in rows {
        *counts.entry(row.status()).or_insert(0) += 1;
    }
    counts
}

/// `round(count / total * 100)`, or 0 when there is nothing to divide by.
pub fn percentage(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskStatus;
    use chrono::{TimeZone, Utc};

    fn task(id: u64, status: TaskStatus, created: Option<(i32, u32, u32)>) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: None,
            status,
            assigned_to: 1,
            assigned_by: None,
            due_date: None,
            created_at: created
                .map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_buckets_split_by_week() {
        let rows = vec![
            task(1, TaskStatus::Completed, Some((2024, 5, 2))),
            task(2, TaskStatus::Pending, Some((2024, 5, 9))),
        ];
        let agg = aggregate(&rows, Granularity::Week);
        assert_eq!(agg.len(), 2);

        let buckets: Vec<_> = agg.values().collect();
        assert_eq!(buckets[0].key, "2024-04-28");
        assert_eq!(buckets[0].count(TaskStatus::Completed), 1);
        assert_eq!(buckets[0].count(TaskStatus::Pending), 0);
        assert_eq!(buckets[1].key, "2024-05-05");
        assert_eq!(buckets[1].count(TaskStatus::Completed), 0);
        assert_eq!(buckets[1].count(TaskStatus::Pending), 1);
    }

    #[test]
    fn status_counts_sum_to_bucket_total() {
        let statuses = [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ];
        let rows: Vec<Task> = (0..37)
            .map(|i| {
                task(
                    i,
                    statuses[(i % 4) as usize],
                    Some((2024, 1 + (i % 3) as u32, 1 + (i % 28) as u32)),
                )
            })
            .collect();

        let agg = aggregate(&rows, Granularity::Month);
        let mut grand_total = 0;
        for bucket in agg.values() {
            assert_eq!(bucket.counts.values().sum::<u32>(), bucket.total);
            assert_eq!(bucket.counts.len(), 4);
            grand_total += bucket.total;
        }
        assert_eq!(grand_total, 37);
    }

    #[test]
    fn rows_without_date_are_skipped() {
        let rows = vec![
            task(1, TaskStatus::Pending, None),
            task(2, TaskStatus::Pending, Some((2024, 5, 9))),
        ];
        let agg = aggregate(&rows, Granularity::Day);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[&date(2024, 5, 9)].total, 1);
    }

    #[test]
    fn empty_input_has_no_buckets() {
        let agg = aggregate::<Task>(&[], Granularity::Week);
        assert!(agg.is_empty());
    }

    #[test]
    fn month_buckets_sort_chronologically() {
        let rows = vec![
            task(1, TaskStatus::Completed, Some((2024, 12, 3))),
            task(2, TaskStatus::Completed, Some((2024, 4, 20))),
            task(3, TaskStatus::Completed, Some((2024, 8, 1))),
        ];
        let keys: Vec<_> = aggregate(&rows, Granularity::Month)
            .into_values()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["Apr 2024", "Aug 2024", "Dec 2024"]);
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2024-05-05 is a Sunday
        assert_eq!(Granularity::Week.bucket_start(date(2024, 5, 5)), date(2024, 5, 5));
        assert_eq!(Granularity::Week.bucket_start(date(2024, 5, 11)), date(2024, 5, 5));
        assert_eq!(Granularity::Month.bucket_start(date(2024, 5, 11)), date(2024, 5, 1));
    }

    #[test]
    fn percentage_rounds_and_guards_zero() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(0, 10), 0);
    }

    #[test]
    fn status_totals_are_zero_filled() {
        let rows = vec![task(1, TaskStatus::Completed, None)];
        let counts = count_by_status(&rows);
        assert_eq!(counts[&TaskStatus::Completed], 1);
        assert_eq!(counts[&TaskStatus::Cancelled], 0);
    }
}
