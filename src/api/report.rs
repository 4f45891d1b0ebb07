//! Dashboard counts and bucketed status reports with optional comparison.

use std::collections::BTreeMap;

use crate::{
    aggregate::{Bucket, Bucketed, Granularity, StatusSet, aggregate, count_by_status, percentage},
    api::profile::employee_code,
    auth::auth::AuthUser,
    compare::{Comparison, compare},
    error::{AppError, AppResult},
    export::{
        ExportFormat, Table, attachment,
        csv_report::render_csv,
        export_filename,
        pdf_report::{HeaderColor, PdfReport, TableSection, render_pdf},
    },
    fetch::{self, FetchQuery, Record},
    model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        leave_request::{LeaveRequest, LeaveStatus},
        profile::Profile,
        task::{Task, TaskStatus},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

/// Window used when a report request names none.
const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportKind {
    Tasks,
    Leave,
    Attendance,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Primary window start; defaults to 30 days before `to`
    #[param(value_type = Option<String>, format = "date", example = "2024-05-01")]
    pub from: Option<NaiveDate>,
    /// Primary window end; defaults to today
    #[param(value_type = Option<String>, format = "date", example = "2024-05-31")]
    pub to: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "week")]
    pub granularity: Option<Granularity>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date", example = "2024-04-01")]
    pub compare_from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date", example = "2024-04-30")]
    pub compare_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    #[param(value_type = Option<String>, format = "date", example = "2024-05-01")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date", example = "2024-05-31")]
    pub to: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "month")]
    pub granularity: Option<Granularity>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub compare_from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub compare_to: Option<NaiveDate>,
    #[param(value_type = String, example = "csv")]
    pub format: ExportFormat,
}

impl ExportQuery {
    fn report(&self) -> ReportQuery {
        ReportQuery {
            from: self.from,
            to: self.to,
            granularity: self.granularity,
            employee_id: self.employee_id,
            compare_from: self.compare_from,
            compare_to: self.compare_to,
        }
    }
}

/// Resolved windows of a report request.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Windows {
    from: NaiveDate,
    to: NaiveDate,
    comparison: Option<(NaiveDate, NaiveDate)>,
}

impl ReportQuery {
    fn windows(&self, today: NaiveDate) -> AppResult<Windows> {
        let to = self.to.unwrap_or(today);
        let from = self
            .from
            .unwrap_or(to - Duration::days(DEFAULT_WINDOW_DAYS - 1));
        if from > to {
            return Err(AppError::validation("from must not be after to"));
        }
        let comparison = match (self.compare_from, self.compare_to) {
            (Some(f), Some(t)) if f <= t => Some((f, t)),
            (Some(_), Some(_)) => {
                return Err(AppError::validation("compare_from must not be after compare_to"));
            }
            (None, None) => None,
            _ => {
                return Err(AppError::validation(
                    "compare_from and compare_to must be given together",
                ));
            }
        };
        Ok(Windows { from, to, comparison })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    /// Head count, reported to managers and admins only
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 42)]
    pub total_employees: Option<usize>,
    #[schema(value_type = Object)]
    pub tasks: BTreeMap<TaskStatus, u32>,
    #[schema(example = 64)]
    pub task_completion_rate: u32,
    #[schema(value_type = Object)]
    pub leave_requests: BTreeMap<LeaveStatus, u32>,
    #[schema(value_type = Object)]
    pub attendance_today: BTreeMap<AttendanceStatus, u32>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport<S: StatusSet> {
    pub granularity: Granularity,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub buckets: Vec<Bucket<S>>,
    pub totals: BTreeMap<S, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison<S>>,
}

/// Primary rows and, when requested, comparison rows, fetched together.
struct Loaded<R> {
    windows: Windows,
    primary: Vec<R>,
    comparison: Option<Vec<R>>,
}

async fn load<R: Record>(
    pool: &MySqlPool,
    auth: &AuthUser,
    query: &ReportQuery,
) -> AppResult<Loaded<R>> {
    auth.require_manager_or_admin()?;
    let windows = query.windows(Local::now().date_naive())?;

    let base = FetchQuery {
        employee_id: query.employee_id,
        ..Default::default()
    };
    let primary_q = base.clone().between(windows.from, windows.to);

    let (primary, comparison) = match windows.comparison {
        Some((f, t)) => {
            let comparison_q = base.between(f, t);
            let (p, c) = futures::try_join!(
                fetch::fetch::<R>(pool, &primary_q),
                fetch::fetch::<R>(pool, &comparison_q),
            )?;
            (p, Some(c))
        }
        None => (fetch::fetch::<R>(pool, &primary_q).await?, None),
    };

    Ok(Loaded {
        windows,
        primary,
        comparison,
    })
}

fn status_report<R: Bucketed>(loaded: &Loaded<R>, granularity: Granularity) -> StatusReport<R::Status> {
    StatusReport {
        granularity,
        from: loaded.windows.from,
        to: loaded.windows.to,
        buckets: aggregate(&loaded.primary, granularity).into_values().collect(),
        totals: count_by_status(&loaded.primary),
        comparison: loaded
            .comparison
            .as_ref()
            .map(|c| compare(&loaded.primary, c, granularity)),
    }
}

/// One row per bucket: period, each status count, total.
fn bucket_table<R: Bucketed>(rows: &[R], granularity: Granularity) -> Table {
    let mut columns = vec!["period".to_string()];
    columns.extend(R::Status::iter().map(|s| s.as_ref().to_string()));
    columns.push("total".into());

    let rows = aggregate(rows, granularity)
        .into_values()
        .map(|b| {
            let mut row = vec![b.key.clone()];
            row.extend(R::Status::iter().map(|s| b.count(s).to_string()));
            row.push(b.total.to_string());
            row
        })
        .collect();

    Table { columns, rows }
}

/// CSV keeps both windows in one sheet, told apart by a leading column.
fn csv_table<R: Bucketed>(loaded: &Loaded<R>, granularity: Granularity) -> Table {
    let current = bucket_table(&loaded.primary, granularity);
    let mut columns = vec!["window".to_string()];
    columns.extend(current.columns);

    let mut rows: Vec<Vec<String>> = current
        .rows
        .into_iter()
        .map(|r| std::iter::once("current".to_string()).chain(r).collect())
        .collect();
    if let Some(cmp) = &loaded.comparison {
        rows.extend(
            bucket_table(cmp, granularity)
                .rows
                .into_iter()
                .map(|r| std::iter::once("comparison".to_string()).chain(r).collect()),
        );
    }

    Table { columns, rows }
}

fn report_document<R: Bucketed>(kind: ReportKind, loaded: &Loaded<R>, granularity: Granularity) -> PdfReport {
    let w = loaded.windows;
    let mut subtitle = vec![format!("Period: {} to {}", w.from, w.to)];
    let mut sections = vec![TableSection::new(
        "Current period",
        bucket_table(&loaded.primary, granularity),
        HeaderColor::Blue,
    )];

    if let (Some(cmp), Some((f, t))) = (&loaded.comparison, w.comparison) {
        let summary = compare(&loaded.primary, cmp, granularity);
        subtitle.push(format!("Comparison: {f} to {t}"));
        subtitle.push(match summary.trend {
            crate::compare::Trend::Change(p) => format!("Trend: {p:+.1}%"),
            crate::compare::Trend::NoTrend => "Trend: no trend".to_string(),
        });
        sections.push(TableSection::new(
            "Comparison period",
            bucket_table(cmp, granularity),
            HeaderColor::Purple,
        ));
    }

    PdfReport {
        title: format!("{} report", capitalize(kind.as_ref())),
        generated_at: Utc::now().naive_utc(),
        subtitle,
        sections,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn export<R: Bucketed>(
    kind: ReportKind,
    loaded: &Loaded<R>,
    granularity: Granularity,
    format: ExportFormat,
) -> AppResult<Vec<u8>> {
    if loaded.primary.is_empty() {
        return Err(AppError::NoData);
    }
    match format {
        ExportFormat::Csv => render_csv(&csv_table(loaded, granularity)),
        ExportFormat::Pdf => render_pdf(&report_document(kind, loaded, granularity)),
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/dashboard",
    responses(
        (status = 200, description = "Headline counts", body = DashboardStats),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let scope = FetchQuery {
        employee_id: auth.scope_employee(None),
        ..Default::default()
    };
    let today = Local::now().date_naive();
    let today_q = scope.clone().between(today, today);
    let can_manage = auth.role.can_manage();

    let head_count = async {
        if can_manage {
            let profiles = fetch::fetch::<Profile>(pool, &FetchQuery::default()).await?;
            Ok::<_, AppError>(Some(profiles.len()))
        } else {
            Ok(None)
        }
    };

    // all four fail together
    let (total_employees, tasks, leaves, attendance) = futures::try_join!(
        head_count,
        fetch::fetch::<Task>(pool, &scope),
        fetch::fetch::<LeaveRequest>(pool, &scope),
        fetch::fetch::<AttendanceRecord>(pool, &today_q),
    )?;

    Ok(HttpResponse::Ok().json(dashboard_stats(total_employees, &tasks, &leaves, &attendance)))
}

fn dashboard_stats(
    total_employees: Option<usize>,
    tasks: &[Task],
    leaves: &[LeaveRequest],
    attendance: &[AttendanceRecord],
) -> DashboardStats {
    let tasks_by_status = count_by_status(tasks);
    let completed = tasks_by_status
        .get(&TaskStatus::Completed)
        .copied()
        .unwrap_or(0);

    DashboardStats {
        total_employees,
        task_completion_rate: percentage(completed, tasks.len() as u32),
        tasks: tasks_by_status,
        leave_requests: count_by_status(leaves),
        attendance_today: count_by_status(attendance),
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/tasks",
    params(ReportQuery),
    responses(
        (status = 200, description = "Tasks per status per bucket", body = Object),
        (status = 400, description = "Invalid window"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn task_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<impl Responder> {
    let loaded = load::<Task>(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(status_report(&loaded, query.granularity.unwrap_or_default())))
}

#[utoipa::path(
    get,
    path = "/api/reports/leave",
    params(ReportQuery),
    responses(
        (status = 200, description = "Leave requests per status per bucket", body = Object),
        (status = 400, description = "Invalid window"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn leave_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<impl Responder> {
    let loaded = load::<LeaveRequest>(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(status_report(&loaded, query.granularity.unwrap_or_default())))
}

#[utoipa::path(
    get,
    path = "/api/reports/attendance",
    params(ReportQuery),
    responses(
        (status = 200, description = "Attendance per status per bucket", body = Object),
        (status = 400, description = "Invalid window"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn attendance_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<impl Responder> {
    let loaded = load::<AttendanceRecord>(pool.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(status_report(&loaded, query.granularity.unwrap_or_default())))
}

#[utoipa::path(
    get,
    path = "/api/reports/{kind}/export",
    params(
        ("kind" = ReportKind, Path, description = "tasks, leave or attendance"),
        ExportQuery
    ),
    responses(
        (status = 200, description = "Report file", content_type = "application/octet-stream"),
        (status = 404, description = "No rows in the window")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn export_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<ReportKind>,
    query: web::Query<ExportQuery>,
) -> actix_web::Result<impl Responder> {
    let kind = path.into_inner();
    let pool = pool.get_ref();
    let report = query.report();
    let granularity = report.granularity.unwrap_or_default();
    let format = query.format;

    let (bytes, windows) = match kind {
        ReportKind::Tasks => {
            let loaded = load::<Task>(pool, &auth, &report).await?;
            (export(kind, &loaded, granularity, format)?, loaded.windows)
        }
        ReportKind::Leave => {
            let loaded = load::<LeaveRequest>(pool, &auth, &report).await?;
            (export(kind, &loaded, granularity, format)?, loaded.windows)
        }
        ReportKind::Attendance => {
            let loaded = load::<AttendanceRecord>(pool, &auth, &report).await?;
            (export(kind, &loaded, granularity, format)?, loaded.windows)
        }
    };

    let code = match report.employee_id {
        Some(id) => Some(employee_code(pool, id).await?),
        None => None,
    };
    let filename = report_filename(kind, code.as_deref(), &windows, format);
    info!(kind = %kind, filename = %filename, "Exported report");
    Ok(attachment(bytes, filename, format))
}

/// `<kind>[_<employee code>]_<from>_<to>.<ext>`
fn report_filename(
    kind: ReportKind,
    employee_code: Option<&str>,
    windows: &Windows,
    format: ExportFormat,
) -> String {
    let period = format!("{}_{}", windows.from, windows.to);
    export_filename(kind.as_ref(), employee_code, &period, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: u64, status: TaskStatus, day: NaiveDate) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: None,
            status,
            assigned_to: 1,
            assigned_by: None,
            due_date: None,
            created_at: day.and_hms_opt(10, 0, 0).map(|t| t.and_utc()),
            updated_at: None,
        }
    }

    fn loaded(primary: Vec<Task>, comparison: Option<Vec<Task>>) -> Loaded<Task> {
        Loaded {
            windows: Windows {
                from: date(2024, 5, 1),
                to: date(2024, 5, 31),
                comparison: comparison.as_ref().map(|_| (date(2024, 4, 1), date(2024, 4, 30))),
            },
            primary,
            comparison,
        }
    }

    #[test]
    fn window_defaults_to_last_thirty_days() {
        let w = ReportQuery::default().windows(date(2024, 5, 31)).unwrap();
        assert_eq!(w.from, date(2024, 5, 2));
        assert_eq!(w.to, date(2024, 5, 31));
        assert!(w.comparison.is_none());
    }

    #[test]
    fn half_a_comparison_window_is_rejected() {
        let q = ReportQuery {
            compare_from: Some(date(2024, 4, 1)),
            ..Default::default()
        };
        assert!(q.windows(date(2024, 5, 31)).is_err());
    }

    #[test]
    fn inverted_comparison_window_is_rejected() {
        let q = ReportQuery {
            compare_from: Some(date(2024, 4, 30)),
            compare_to: Some(date(2024, 4, 1)),
            ..Default::default()
        };
        assert!(q.windows(date(2024, 5, 31)).is_err());
    }

    #[test]
    fn bucket_table_has_one_column_per_status() {
        let rows = vec![
            task(1, TaskStatus::Completed, date(2024, 5, 2)),
            task(2, TaskStatus::Pending, date(2024, 5, 9)),
        ];
        let table = bucket_table(&rows, Granularity::Week);
        assert_eq!(
            table.columns,
            vec!["period", "pending", "in_progress", "completed", "cancelled", "total"]
        );
        assert_eq!(table.rows[0], vec!["2024-04-28", "0", "0", "1", "0", "1"]);
        assert_eq!(table.rows[1], vec!["2024-05-05", "1", "0", "0", "0", "1"]);
    }

    #[test]
    fn csv_table_tags_rows_by_window() {
        let l = loaded(
            vec![task(1, TaskStatus::Completed, date(2024, 5, 2))],
            Some(vec![task(2, TaskStatus::Pending, date(2024, 4, 3))]),
        );
        let table = csv_table(&l, Granularity::Month);
        assert_eq!(table.columns[0], "window");
        assert_eq!(table.rows[0][0], "current");
        assert_eq!(table.rows[0][1], "May 2024");
        assert_eq!(table.rows[1][0], "comparison");
        assert_eq!(table.rows[1][1], "Apr 2024");
    }

    #[test]
    fn pdf_has_purple_comparison_section_and_trend() {
        let l = loaded(
            vec![
                task(1, TaskStatus::Completed, date(2024, 5, 2)),
                task(2, TaskStatus::Completed, date(2024, 5, 3)),
            ],
            Some(vec![task(3, TaskStatus::Pending, date(2024, 4, 3))]),
        );
        let report = report_document(ReportKind::Tasks, &l, Granularity::Week);
        assert_eq!(report.title, "Tasks report");
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].color, HeaderColor::Blue);
        assert_eq!(report.sections[1].color, HeaderColor::Purple);
        assert!(report.subtitle.contains(&"Trend: +100.0%".to_string()));
    }

    #[test]
    fn empty_window_exports_nothing() {
        let l = loaded(Vec::new(), None);
        assert!(matches!(
            export(ReportKind::Tasks, &l, Granularity::Week, ExportFormat::Csv),
            Err(AppError::NoData)
        ));
    }

    #[test]
    fn status_report_without_comparison_omits_it() {
        let l = loaded(vec![task(1, TaskStatus::Completed, date(2024, 5, 2))], None);
        let report = status_report(&l, Granularity::Week);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("comparison").is_none());
        assert_eq!(json["totals"]["completed"], 1);
        assert_eq!(json["buckets"][0]["key"], "2024-04-28");
    }

    #[test]
    fn report_filename_uses_employee_code() {
        let windows = loaded(vec![], None).windows;
        assert_eq!(
            report_filename(ReportKind::Leave, Some("EMP-001"), &windows, ExportFormat::Csv),
            "leave_EMP-001_2024-05-01_2024-05-31.csv"
        );
        assert_eq!(
            report_filename(ReportKind::Tasks, None, &windows, ExportFormat::Pdf),
            "tasks_2024-05-01_2024-05-31.pdf"
        );
    }

    #[test]
    fn employee_dashboard_omits_head_count() {
        let tasks = vec![
            task(1, TaskStatus::Completed, date(2024, 5, 2)),
            task(2, TaskStatus::Pending, date(2024, 5, 3)),
        ];
        let stats = dashboard_stats(None, &tasks, &[], &[]);
        assert_eq!(stats.task_completion_rate, 50);
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("total_employees").is_none());

        let stats = dashboard_stats(Some(12), &tasks, &[], &[]);
        assert_eq!(serde_json::to_value(&stats).unwrap()["total_employees"], 12);
    }
}
