//! Record fetcher: filtered reads against the six backend collections.
//!
//! Every call goes to the database; nothing is cached between requests.
//! Raw rows are mapped into typed records here, so anything past this
//! module only ever sees validated shapes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySqlPool};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::{debug, error, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};
use crate::model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceRow, AttendanceStatus};
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveRow, LeaveStatus};
use crate::model::payslip::{PAYSLIP_COLUMNS, Payslip, PayslipRow};
use crate::model::profile::{PROFILE_COLUMNS, Profile, ProfileRow};
use crate::model::role::Role;
use crate::model::salary::{SALARY_COLUMNS, SalaryInformation};
use crate::model::task::{TASK_COLUMNS, Task, TaskRow, TaskStatus};

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
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
pub enum Collection {
    Profiles,
    Tasks,
    LeaveRequests,
    Attendance,
    Payslips,
    SalaryInformation,
}

/// How a date window applies to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateColumn {
    None,
    /// A single date (or timestamp) column inside the window.
    Single(&'static str),
    /// A `[start, end]` span that overlaps the window.
    Span(&'static str, &'static str),
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Tasks => "tasks",
            Collection::LeaveRequests => "leave_requests",
            Collection::Attendance => "attendance",
            Collection::Payslips => "payslips",
            Collection::SalaryInformation => "salary_information",
        }
    }

    fn columns(self) -> &'static str {
        match self {
            Collection::Profiles => PROFILE_COLUMNS,
            Collection::Tasks => TASK_COLUMNS,
            Collection::LeaveRequests => LEAVE_COLUMNS,
            Collection::Attendance => ATTENDANCE_COLUMNS,
            Collection::Payslips => PAYSLIP_COLUMNS,
            Collection::SalaryInformation => SALARY_COLUMNS,
        }
    }

    /// Column holding the profile id a row belongs to.
    pub fn owner_column(self) -> &'static str {
        match self {
            Collection::Profiles => "id",
            Collection::Tasks => "assigned_to",
            Collection::Attendance => "user_id",
            Collection::LeaveRequests | Collection::Payslips | Collection::SalaryInformation => {
                "employee_id"
            }
        }
    }

    fn date_column(self) -> DateColumn {
        match self {
            Collection::Profiles => DateColumn::Single("join_date"),
            Collection::Tasks => DateColumn::Single("created_at"),
            Collection::LeaveRequests => DateColumn::Span("start_date", "end_date"),
            Collection::Attendance => DateColumn::Single("date"),
            Collection::Payslips | Collection::SalaryInformation => DateColumn::None,
        }
    }

    /// Accepted values for the `status` filter; profiles filter on role.
    fn status_filter(self) -> Option<(&'static str, Vec<String>)> {
        use strum::IntoEnumIterator;

        fn names<T: AsRef<str>>(it: impl Iterator<Item = T>) -> Vec<String> {
            it.map(|v| v.as_ref().to_string()).collect()
        }

        match self {
            Collection::Profiles => Some(("role", names(Role::iter()))),
            Collection::Tasks => Some(("status", names(TaskStatus::iter()))),
            Collection::LeaveRequests => Some(("status", names(LeaveStatus::iter()))),
            Collection::Attendance => Some(("status", names(AttendanceStatus::iter()))),
            Collection::Payslips | Collection::SalaryInformation => None,
        }
    }

    fn order_keys(self) -> &'static [&'static str] {
        match self {
            Collection::Profiles => &["id", "name", "employee_id", "join_date", "department"],
            Collection::Tasks => &["id", "created_at", "updated_at", "due_date", "status"],
            Collection::LeaveRequests => &["id", "created_at", "start_date", "end_date", "status"],
            Collection::Attendance => &["id", "date", "check_in_time"],
            Collection::Payslips => &["id", "year", "month", "net_salary"],
            Collection::SalaryInformation => &["id", "employee_id", "gross_salary"],
        }
    }

    fn default_order(self) -> &'static str {
        match self {
            Collection::Profiles => "name",
            Collection::Tasks | Collection::LeaveRequests => "created_at",
            Collection::Attendance => "date",
            Collection::Payslips | Collection::SalaryInformation => "id",
        }
    }
}

/// Equality and range filters plus an ordering key.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FetchQuery {
    /// Exact row id
    pub id: Option<u64>,
    /// Profile id the rows belong to
    pub employee_id: Option<u64>,
    /// Inclusive window start
    #[param(value_type = Option<String>, format = "date", example = "2024-05-01")]
    pub from: Option<NaiveDate>,
    /// Inclusive window end
    #[param(value_type = Option<String>, format = "date", example = "2024-05-31")]
    pub to: Option<NaiveDate>,
    /// Status (role for profiles)
    pub status: Option<String>,
    /// Payslip period
    pub year: Option<u16>,
    pub month: Option<u8>,
    pub order_by: Option<String>,
    #[serde(default)]
    pub descending: bool,
}

impl FetchQuery {
    pub fn for_employee(employee_id: u64) -> Self {
        FetchQuery {
            employee_id: Some(employee_id),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

// Helper enum for typed SQLx binding
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    U16(u16),
    U8(u8),
    Date(NaiveDate),
    Str(String),
}

/// Builds the SELECT for `collection` and the values to bind, in order.
pub fn build_select(
    collection: Collection,
    query: &FetchQuery,
) -> AppResult<(String, Vec<FilterValue>)> {
    let mut conditions: Vec<String> = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(id) = query.id {
        conditions.push("id = ?".to_string());
        args.push(FilterValue::U64(id));
    }

    if let Some(employee_id) = query.employee_id {
        conditions.push(format!("{} = ?", collection.owner_column()));
        args.push(FilterValue::U64(employee_id));
    }

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::validation("from must not be after to"));
        }
    }

    match collection.date_column() {
        DateColumn::Single(col) => {
            if let Some(from) = query.from {
                conditions.push(format!("DATE({col}) >= ?"));
                args.push(FilterValue::Date(from));
            }
            if let Some(to) = query.to {
                conditions.push(format!("DATE({col}) <= ?"));
                args.push(FilterValue::Date(to));
            }
        }
        DateColumn::Span(start, end) => {
            if let Some(from) = query.from {
                conditions.push(format!("{end} >= ?"));
                args.push(FilterValue::Date(from));
            }
            if let Some(to) = query.to {
                conditions.push(format!("{start} <= ?"));
                args.push(FilterValue::Date(to));
            }
        }
        DateColumn::None => {
            if query.from.is_some() || query.to.is_some() {
                return Err(AppError::validation(format!(
                    "{} cannot be filtered by date",
                    collection.table()
                )));
            }
        }
    }

    if let Some(status) = query.status.as_deref() {
        let (column, allowed) = collection.status_filter().ok_or_else(|| {
            AppError::validation(format!("{} has no status", collection.table()))
        })?;
        if !allowed.iter().any(|s| s == status) {
            return Err(AppError::validation(format!(
                "Invalid {column} '{status}'. Allowed: {}",
                allowed.join(", ")
            )));
        }
        conditions.push(format!("{column} = ?"));
        args.push(FilterValue::Str(status.to_string()));
    }

    if query.year.is_some() || query.month.is_some() {
        if collection != Collection::Payslips {
            return Err(AppError::validation(
                "year/month filters only apply to payslips",
            ));
        }
        if let Some(year) = query.year {
            conditions.push("year = ?".to_string());
            args.push(FilterValue::U16(year));
        }
        if let Some(month) = query.month {
            if !(1..=12).contains(&month) {
                return Err(AppError::validation("month must be between 1 and 12"));
            }
            conditions.push("month = ?".to_string());
            args.push(FilterValue::U8(month));
        }
    }

    let order_key = query
        .order_by
        .as_deref()
        .unwrap_or_else(|| collection.default_order());
    if !collection.order_keys().contains(&order_key) {
        return Err(AppError::validation(format!(
            "Cannot order {} by '{order_key}'",
            collection.table()
        )));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} {}",
        collection.columns(),
        collection.table(),
        where_clause,
        order_key,
        if query.descending { "DESC" } else { "ASC" }
    );

    Ok((sql, args))
}

/// A typed record living in one backend collection.
pub trait Record: Sized {
    type Row: for<'r> FromRow<'r, MySqlRow> + Send + Unpin;
    const COLLECTION: Collection;

    fn from_row(row: Self::Row) -> AppResult<Self>;
}

impl Record for Profile {
    type Row = ProfileRow;
    const COLLECTION: Collection = Collection::Profiles;

    fn from_row(row: ProfileRow) -> AppResult<Self> {
        Profile::try_from(row)
    }
}

impl Record for Task {
    type Row = TaskRow;
    const COLLECTION: Collection = Collection::Tasks;

    fn from_row(row: TaskRow) -> AppResult<Self> {
        Task::try_from(row)
    }
}

impl Record for LeaveRequest {
    type Row = LeaveRow;
    const COLLECTION: Collection = Collection::LeaveRequests;

    fn from_row(row: LeaveRow) -> AppResult<Self> {
        LeaveRequest::try_from(row)
    }
}

impl Record for AttendanceRecord {
    type Row = AttendanceRow;
    const COLLECTION: Collection = Collection::Attendance;

    fn from_row(row: AttendanceRow) -> AppResult<Self> {
        AttendanceRecord::try_from(row)
    }
}

impl Record for Payslip {
    type Row = PayslipRow;
    const COLLECTION: Collection = Collection::Payslips;

    fn from_row(row: PayslipRow) -> AppResult<Self> {
        Payslip::try_from(row)
    }
}

impl Record for SalaryInformation {
    type Row = SalaryInformation;
    const COLLECTION: Collection = Collection::SalaryInformation;

    fn from_row(row: SalaryInformation) -> AppResult<Self> {
        Ok(row)
    }
}

/// Returns every well-formed row of `T`'s collection matching `query`.
///
/// Rows that do not map onto `T` are logged and left out; backend
/// failures abort the whole fetch.
pub async fn fetch<T: Record>(pool: &MySqlPool, query: &FetchQuery) -> AppResult<Vec<T>> {
    let rows = fetch_rows::<T>(pool, query).await?;
    Ok(keep_well_formed(rows))
}

/// Maps raw rows into records, dropping the ones that fail to map.
pub fn keep_well_formed<T: Record>(rows: Vec<T::Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match T::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = %T::COLLECTION, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect()
}

async fn fetch_rows<T: Record>(pool: &MySqlPool, query: &FetchQuery) -> AppResult<Vec<T::Row>> {
    let collection = T::COLLECTION;
    let (sql, args) = build_select(collection, query)?;
    debug!(sql = %sql, args = ?args, "Fetching rows");

    let mut q = sqlx::query_as::<_, T::Row>(&sql);
    for arg in args {
        q = match arg {
            FilterValue::U64(v) => q.bind(v),
            FilterValue::U16(v) => q.bind(v),
            FilterValue::U8(v) => q.bind(v),
            FilterValue::Date(v) => q.bind(v),
            FilterValue::Str(v) => q.bind(v),
        };
    }

    let rows = q.fetch_all(pool).await.map_err(|e| {
        error!(error = %e, collection = %collection, "Failed to fetch rows");
        AppError::from(e)
    })?;

    Ok(rows)
}

/// Fetches a single row by id. A malformed row is reported, not skipped.
pub async fn fetch_by_id<T: Record>(pool: &MySqlPool, id: u64) -> AppResult<T> {
    let query = FetchQuery {
        id: Some(id),
        ..Default::default()
    };
    let row = fetch_rows::<T>(pool, &query)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound {
            entity: T::COLLECTION.table(),
        })?;
    T::from_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unfiltered_select_uses_default_order() {
        let (sql, args) = build_select(Collection::Tasks, &FetchQuery::default()).unwrap();
        assert_eq!(
            sql,
            format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at ASC")
        );
        assert!(args.is_empty());
    }

    #[test]
    fn employee_filter_targets_owner_column() {
        let (sql, args) =
            build_select(Collection::Attendance, &FetchQuery::for_employee(9)).unwrap();
        assert!(sql.contains("WHERE user_id = ?"));
        assert_eq!(args, vec![FilterValue::U64(9)]);
    }

    #[test]
    fn date_window_binds_in_order() {
        let query = FetchQuery::for_employee(3)
            .between(date(2024, 5, 1), date(2024, 5, 31))
            .with_status("completed");
        let (sql, args) = build_select(Collection::Tasks, &query).unwrap();
        assert!(sql.contains(
            "WHERE assigned_to = ? AND DATE(created_at) >= ? AND DATE(created_at) <= ? AND status = ?"
        ));
        assert_eq!(
            args,
            vec![
                FilterValue::U64(3),
                FilterValue::Date(date(2024, 5, 1)),
                FilterValue::Date(date(2024, 5, 31)),
                FilterValue::Str("completed".into()),
            ]
        );
    }

    #[test]
    fn leave_window_matches_overlapping_spans() {
        let query = FetchQuery::default().between(date(2024, 5, 1), date(2024, 5, 31));
        let (sql, _) = build_select(Collection::LeaveRequests, &query).unwrap();
        assert!(sql.contains("end_date >= ? AND start_date <= ?"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let query = FetchQuery::default().with_status("archived");
        let err = build_select(Collection::Tasks, &query).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn profiles_filter_status_on_role() {
        let query = FetchQuery::default().with_status("manager");
        let (sql, _) = build_select(Collection::Profiles, &query).unwrap();
        assert!(sql.contains("role = ?"));
    }

    #[test]
    fn order_key_must_be_whitelisted() {
        let query = FetchQuery {
            order_by: Some("name; DROP TABLE tasks".into()),
            ..Default::default()
        };
        assert!(build_select(Collection::Tasks, &query).is_err());

        let query = FetchQuery {
            order_by: Some("due_date".into()),
            descending: true,
            ..Default::default()
        };
        let (sql, _) = build_select(Collection::Tasks, &query).unwrap();
        assert!(sql.ends_with("ORDER BY due_date DESC"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let query = FetchQuery::default().between(date(2024, 6, 1), date(2024, 5, 1));
        assert!(build_select(Collection::Attendance, &query).is_err());
    }

    #[test]
    fn payslip_period_filters() {
        let query = FetchQuery {
            employee_id: Some(4),
            year: Some(2024),
            month: Some(5),
            ..Default::default()
        };
        let (sql, args) = build_select(Collection::Payslips, &query).unwrap();
        assert!(sql.contains("employee_id = ? AND year = ? AND month = ?"));
        assert_eq!(
            args,
            vec![FilterValue::U64(4), FilterValue::U16(2024), FilterValue::U8(5)]
        );

        let bad = FetchQuery {
            month: Some(13),
            ..Default::default()
        };
        assert!(build_select(Collection::Payslips, &bad).is_err());
        let misplaced = FetchQuery {
            year: Some(2024),
            ..Default::default()
        };
        assert!(build_select(Collection::Tasks, &misplaced).is_err());
    }

    #[test]
    fn salary_has_no_date_window() {
        let query = FetchQuery::default().between(date(2024, 1, 1), date(2024, 12, 31));
        assert!(build_select(Collection::SalaryInformation, &query).is_err());
    }

    fn task_row(id: u64, status: &str) -> TaskRow {
        TaskRow {
            id,
            title: format!("Task {id}"),
            description: None,
            status: status.to_string(),
            assigned_to: 3,
            assigned_by: Some(1),
            due_date: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn malformed_rows_are_dropped_from_the_result() {
        let rows = vec![task_row(1, "completed"), task_row(2, "archived"), task_row(3, "pending")];
        let tasks: Vec<Task> = keep_well_formed(rows);
        let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
    }
}
