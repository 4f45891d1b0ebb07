use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

pub const ATTENDANCE_COLUMNS: &str = "id, user_id, date, check_in_time, check_out_time, status";

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Late,
}

impl AttendanceStatus {
    /// Whether the employee was at work on the day (fully or partially).
    pub fn counts_as_present(self) -> bool {
        !matches!(self, AttendanceStatus::Absent)
    }
}

#[derive(Debug, FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:02:11")]
    pub check_in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:45:00")]
    pub check_out_time: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub effective_hours: Option<f64>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            status: parse_column("attendance", "status", &row.status)?,
            effective_hours: effective_hours(row.check_in_time, row.check_out_time),
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
        })
    }
}

/// Hours between check-in and check-out, rounded to two decimals.
/// `None` while either side is missing or when check-out precedes check-in.
pub fn effective_hours(check_in: Option<NaiveTime>, check_out: Option<NaiveTime>) -> Option<f64> {
    let (check_in, check_out) = (check_in?, check_out?);
    let seconds = (check_out - check_in).num_seconds();
    if seconds < 0 {
        return None;
    }
    Some((seconds as f64 / 3600.0 * 100.0).round() / 100.0)
}

/// Status recorded at check-in time.
pub fn check_in_status(at: NaiveTime, late_after: NaiveTime) -> AttendanceStatus {
    if at > late_after {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// A short day downgrades the check-in status to half day.
pub fn check_out_status(
    current: AttendanceStatus,
    hours: Option<f64>,
    half_day_hours: f64,
) -> AttendanceStatus {
    match hours {
        Some(h) if h < half_day_hours => AttendanceStatus::HalfDay,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn effective_hours_is_checkout_minus_checkin() {
        assert_eq!(effective_hours(Some(t(9, 0)), Some(t(17, 30))), Some(8.5));
        assert_eq!(effective_hours(Some(t(9, 0)), None), None);
        assert_eq!(effective_hours(None, Some(t(17, 0))), None);
    }

    #[test]
    fn checkout_before_checkin_has_no_hours() {
        assert_eq!(effective_hours(Some(t(18, 0)), Some(t(9, 0))), None);
    }

    #[test]
    fn late_after_threshold() {
        let threshold = t(9, 30);
        assert_eq!(check_in_status(t(9, 30), threshold), AttendanceStatus::Present);
        assert_eq!(check_in_status(t(9, 31), threshold), AttendanceStatus::Late);
    }

    #[test]
    fn short_day_becomes_half_day() {
        assert_eq!(
            check_out_status(AttendanceStatus::Late, Some(3.5), 4.0),
            AttendanceStatus::HalfDay
        );
        assert_eq!(
            check_out_status(AttendanceStatus::Late, Some(8.0), 4.0),
            AttendanceStatus::Late
        );
        assert_eq!(
            check_out_status(AttendanceStatus::Present, None, 4.0),
            AttendanceStatus::Present
        );
    }
}
