use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

pub const LEAVE_COLUMNS: &str =
    "id, employee_id, leave_type, start_date, end_date, reason, status, created_at";

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, FromRow)]
pub struct LeaveRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 1000,
    "leave_type": "sick",
    "start_date": "2026-01-01",
    "end_date": "2026-01-03",
    "reason": "Flu",
    "status": "pending",
    "created_at": "2026-01-01T00:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    /// profile id of the employee the leave is for
    pub employee_id: u64,
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        if row.start_date > row.end_date {
            return Err(AppError::row_shape(
                "leave_requests",
                format!("start_date {} after end_date {}", row.start_date, row.end_date),
            ));
        }
        Ok(LeaveRequest {
            status: parse_column("leave_requests", "status", &row.status)?,
            id: row.id,
            employee_id: row.employee_id,
            leave_type: row.leave_type,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

impl LeaveRequest {
    /// Weekdays covered by this leave that fall inside `[from, to]`.
    pub fn weekdays_within(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        let start = self.start_date.max(from);
        let end = self.end_date.min(to);
        if start > end {
            return 0;
        }
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as u32
    }
}
