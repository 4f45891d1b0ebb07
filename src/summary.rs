//! Monthly attendance roll-up for one employee.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyAttendance {
    pub employee_id: u64,
    pub year: i32,
    pub month: u32,
    pub working_days: u32,
    pub present_days: u32,
    pub late_days: u32,
    pub half_days: u32,
    pub leave_days: u32,
    pub absent_days: u32,
    pub total_hours: f64,
    pub attendance_rate: u32,
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("Invalid period {year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::validation(format!("Invalid period {year}-{month}")))?;
    Ok((first, next.pred_opt().unwrap_or(first)))
}

/// Monday to Friday days in the month.
pub fn working_days(first: NaiveDate, last: NaiveDate) -> u32 {
    first
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as u32
}

/// Rolls up one employee's month.
///
/// Absent days are `working - present - leave`, floored at zero. When an
/// approved leave overlaps a day that also has an attendance record the
/// day is counted twice and the floor hides it; that case is logged.
pub fn summarize_month(
    employee_id: u64,
    year: i32,
    month: u32,
    records: &[AttendanceRecord],
    leaves: &[LeaveRequest],
) -> AppResult<MonthlyAttendance> {
    let (first, last) = month_bounds(year, month)?;
    let in_month = |d: NaiveDate| d >= first && d <= last;

    let mine = records
        .iter()
        .filter(|r| r.user_id == employee_id && in_month(r.date));

    let (mut present, mut late, mut half, mut hours) = (0u32, 0u32, 0u32, 0.0f64);
    for record in mine {
        if record.status.counts_as_present() {
            present += 1;
        }
        match record.status {
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::HalfDay => half += 1,
            _ => {}
        }
        hours += record.effective_hours.unwrap_or(0.0);
    }

    let leave_days: u32 = leaves
        .iter()
        .filter(|l| l.employee_id == employee_id && l.status == LeaveStatus::Approved)
        .map(|l| l.weekdays_within(first, last))
        .sum();

    let working = working_days(first, last);
    let raw_absent = working as i64 - present as i64 - leave_days as i64;
    if raw_absent < 0 {
        tracing::warn!(
            employee_id,
            year,
            month,
            working,
            present,
            leave_days,
            "Present and leave days exceed working days; absent days floored at zero"
        );
    }

    Ok(MonthlyAttendance {
        employee_id,
        year,
        month,
        working_days: working,
        present_days: present,
        late_days: late,
        half_days: half,
        leave_days,
        absent_days: raw_absent.max(0) as u32,
        total_hours: (hours * 100.0).round() / 100.0,
        attendance_rate: crate::aggregate::percentage(present, working),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(user_id: u64, day: NaiveDate, status: AttendanceStatus, hours: Option<f64>) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            user_id,
            date: day,
            check_in_time: NaiveTime::from_hms_opt(9, 0, 0),
            check_out_time: None,
            status,
            effective_hours: hours,
        }
    }

    fn leave(employee_id: u64, start: NaiveDate, end: NaiveDate, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 0,
            employee_id,
            leave_type: "annual".into(),
            start_date: start,
            end_date: end,
            reason: None,
            status,
            created_at: None,
        }
    }

    #[test]
    fn may_2024_has_23_working_days() {
        let (first, last) = month_bounds(2024, 5).unwrap();
        assert_eq!(last, date(2024, 5, 31));
        assert_eq!(working_days(first, last), 23);
    }

    #[test]
    fn december_bounds_roll_over_year() {
        let (_, last) = month_bounds(2024, 12).unwrap();
        assert_eq!(last, date(2024, 12, 31));
        assert!(month_bounds(2024, 13).is_err());
    }

    #[test]
    fn summarizes_present_leave_and_absent_days() {
        let records = vec![
            record(1, date(2024, 5, 1), AttendanceStatus::Present, Some(8.0)),
            record(1, date(2024, 5, 2), AttendanceStatus::Late, Some(7.5)),
            record(1, date(2024, 5, 3), AttendanceStatus::HalfDay, Some(3.25)),
            record(1, date(2024, 5, 6), AttendanceStatus::Absent, None),
            // other employee and other month are ignored
            record(2, date(2024, 5, 1), AttendanceStatus::Present, Some(8.0)),
            record(1, date(2024, 4, 30), AttendanceStatus::Present, Some(8.0)),
        ];
        let leaves = vec![
            leave(1, date(2024, 5, 13), date(2024, 5, 14), LeaveStatus::Approved),
            leave(1, date(2024, 5, 20), date(2024, 5, 24), LeaveStatus::Rejected),
        ];

        let s = summarize_month(1, 2024, 5, &records, &leaves).unwrap();
        assert_eq!(s.working_days, 23);
        assert_eq!(s.present_days, 3);
        assert_eq!(s.late_days, 1);
        assert_eq!(s.half_days, 1);
        assert_eq!(s.leave_days, 2);
        assert_eq!(s.absent_days, 18);
        assert_eq!(s.total_hours, 18.75);
        assert_eq!(s.attendance_rate, 13);
    }

    #[test]
    fn overlapping_leave_floors_absent_days_at_zero() {
        let (first, last) = month_bounds(2024, 5).unwrap();
        let records: Vec<_> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .map(|d| record(1, d, AttendanceStatus::Present, Some(8.0)))
            .collect();
        let leaves = vec![leave(1, date(2024, 5, 6), date(2024, 5, 10), LeaveStatus::Approved)];

        let s = summarize_month(1, 2024, 5, &records, &leaves).unwrap();
        assert_eq!(s.present_days, 23);
        assert_eq!(s.leave_days, 5);
        assert_eq!(s.absent_days, 0);
    }
}
