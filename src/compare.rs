//! Primary window against a comparison window.
//!
//! The comparison side is intentionally coarse: it is reduced to a flat
//! average per bucket rather than aligned bucket by bucket.

use serde::Serialize;

use crate::aggregate::{Bucket, Bucketed, Granularity, StatusSet, aggregate};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum Trend {
    Change(f64),
    NoTrend,
}

/// `(primary - comparison) / comparison * 100`; no trend without a baseline.
pub fn trend(primary_total: u32, comparison_total: u32) -> Trend {
    if comparison_total == 0 {
        return Trend::NoTrend;
    }
    let (cur, cmp) = (primary_total as f64, comparison_total as f64);
    Trend::Change((cur - cmp) / cmp * 100.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparedBucket<S: StatusSet> {
    #[serde(flatten)]
    pub bucket: Bucket<S>,
    pub comparison_average: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison<S: StatusSet> {
    pub buckets: Vec<ComparedBucket<S>>,
    pub primary_total: u32,
    pub comparison_total: u32,
    pub comparison_buckets: usize,
    pub comparison_average: f64,
    pub trend: Trend,
}

pub fn compare<R: Bucketed>(
    primary: &[R],
    comparison: &[R],
    granularity: Granularity,
) -> Comparison<R::Status> {
    let primary = aggregate(primary, granularity);
    let comparison = aggregate(comparison, granularity);

    let primary_total: u32 = primary.values().map(|b| b.total).sum();
    let comparison_total: u32 = comparison.values().map(|b| b.total).sum();
    let comparison_average = if comparison.is_empty() {
        0.0
    } else {
        comparison_total as f64 / comparison.len() as f64
    };

    Comparison {
        buckets: primary
            .into_values()
            .map(|bucket| ComparedBucket {
                bucket,
                comparison_average,
            })
            .collect(),
        primary_total,
        comparison_total,
        comparison_buckets: comparison.len(),
        comparison_average,
        trend: trend(primary_total, comparison_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::{LeaveRequest, LeaveStatus};
    use chrono::NaiveDate;

    fn leave(status: LeaveStatus, y: i32, m: u32, d: u32) -> LeaveRequest {
        let day = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        LeaveRequest {
            id: 0,
            employee_id: 1,
            leave_type: "annual".into(),
            start_date: day,
            end_date: day,
            reason: None,
            status,
            created_at: None,
        }
    }

    #[test]
    fn no_trend_only_without_comparison_rows() {
        assert_eq!(trend(10, 0), Trend::NoTrend);
        assert_eq!(trend(0, 0), Trend::NoTrend);
        assert_eq!(trend(0, 4), Trend::Change(-100.0));
        assert_eq!(trend(15, 10), Trend::Change(50.0));
    }

    #[test]
    fn trend_matches_formula() {
        match trend(7, 3) {
            Trend::Change(p) => assert!((p - (7.0 - 3.0) / 3.0 * 100.0).abs() < 1e-9),
            Trend::NoTrend => panic!("expected a trend"),
        }
    }

    #[test]
    fn comparison_average_is_flat_across_primary_buckets() {
        let primary = vec![
            leave(LeaveStatus::Approved, 2024, 5, 1),
            leave(LeaveStatus::Pending, 2024, 5, 2),
            leave(LeaveStatus::Rejected, 2024, 5, 3),
        ];
        // two comparison buckets holding 3 and 1 rows
        let comparison = vec![
            leave(LeaveStatus::Approved, 2024, 4, 1),
            leave(LeaveStatus::Approved, 2024, 4, 1),
            leave(LeaveStatus::Approved, 2024, 4, 1),
            leave(LeaveStatus::Pending, 2024, 4, 2),
        ];

        let result = compare(&primary, &comparison, Granularity::Day);
        assert_eq!(result.buckets.len(), 3);
        assert_eq!(result.comparison_buckets, 2);
        assert!(result.buckets.iter().all(|b| b.comparison_average == 2.0));
        assert_eq!(result.primary_total, 3);
        assert_eq!(result.comparison_total, 4);
        assert_eq!(result.trend, Trend::Change(-25.0));
    }

    #[test]
    fn empty_comparison_window_has_no_trend() {
        let primary = vec![leave(LeaveStatus::Approved, 2024, 5, 1)];
        let result = compare(&primary, &[], Granularity::Month);
        assert_eq!(result.trend, Trend::NoTrend);
        assert_eq!(result.comparison_average, 0.0);
        assert_eq!(result.buckets[0].bucket.key, "May 2024");
    }

    #[test]
    fn trend_serializes_with_kind_tag() {
        let json = serde_json::to_value(Trend::NoTrend).unwrap();
        assert_eq!(json["kind"], "no_trend");
        let json = serde_json::to_value(Trend::Change(12.5)).unwrap();
        assert_eq!(json["kind"], "change");
        assert_eq!(json["percent"], 12.5);
    }
}
