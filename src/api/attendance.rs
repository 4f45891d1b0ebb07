use crate::{
    api::profile::employee_code,
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult, on_constraint},
    events::{ChangeFeed, ChangeKind},
    export::{
        ExportFormat, Table, attachment,
        csv_report::render_csv,
        export_filename,
        pdf_report::{HeaderColor, PdfReport, TableSection, render_pdf},
    },
    fetch::{self, Collection, FetchQuery},
    model::{
        attendance::{AttendanceRecord, check_in_status, check_out_status, effective_hours},
        leave_request::{LeaveRequest, LeaveStatus},
    },
    summary::{MonthlyAttendance, month_bounds, summarize_month},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 20)]
    pub total: usize,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Defaults to the caller
    pub employee_id: Option<u64>,
    #[param(example = 2024)]
    pub year: i32,
    #[param(example = 5)]
    pub month: u32,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryExportQuery {
    pub employee_id: Option<u64>,
    #[param(example = 2024)]
    pub year: i32,
    #[param(example = 5)]
    pub month: u32,
    #[param(value_type = String, example = "csv")]
    pub format: ExportFormat,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 201, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "status": "late"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let user_id = auth.profile_id;
    let now = Local::now().naive_local();
    let status = check_in_status(now.time(), config.late_after);

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, check_in_time, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(now.date())
    .bind(now.time())
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, user_id, "Check-in failed");
        // unique (user_id, date)
        on_constraint(e, "Already checked in today")
    })?;

    let id = result.last_insert_id();
    info!(attendance_id = id, user_id, status = %status, "Checked in");
    feed.publish(Collection::Attendance, ChangeKind::Insert, Some(id));

    Ok(HttpResponse::Created().json(json!({
        "message": "Checked in successfully",
        "status": status
    })))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "effective_hours": 8.25,
            "status": "present"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    feed: web::Data<ChangeFeed>,
) -> actix_web::Result<impl Responder> {
    let user_id = auth.profile_id;
    let now = Local::now().naive_local();
    let today = now.date();

    let open = fetch::fetch::<AttendanceRecord>(
        pool.get_ref(),
        &FetchQuery::for_employee(user_id).between(today, today),
    )
    .await?
    .into_iter()
    .find(|r| r.check_out_time.is_none())
    .ok_or_else(|| AppError::validation("No active check-in found for today"))?;

    let hours = effective_hours(open.check_in_time, Some(now.time()));
    let status = check_out_status(open.status, hours, config.half_day_hours);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out_time = ?, status = ?
        WHERE id = ?
        AND check_out_time IS NULL
        "#,
    )
    .bind(now.time())
    .bind(status.as_ref())
    .bind(open.id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, user_id, "Check-out failed");
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::validation("No active check-in found for today").into());
    }

    info!(attendance_id = open.id, user_id, hours = ?hours, status = %status, "Checked out");
    feed.publish(Collection::Attendance, ChangeKind::Update, Some(open.id));

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "effective_hours": hours,
        "status": status
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(FetchQuery),
    responses((status = 200, description = "Attendance records", body = AttendanceListResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FetchQuery>,
) -> actix_web::Result<impl Responder> {
    let mut query = query.into_inner();
    query.employee_id = auth.scope_employee(query.employee_id);

    let data = fetch::fetch::<AttendanceRecord>(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        total: data.len(),
        data,
    }))
}

struct Month {
    summary: MonthlyAttendance,
    records: Vec<AttendanceRecord>,
    leaves: Vec<LeaveRequest>,
}

/// Attendance rows and approved leave for one employee's month, fetched together.
async fn month_of(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
    month: u32,
) -> Result<Month, AppError> {
    let (first, last) = month_bounds(year, month)?;
    let window = FetchQuery::for_employee(employee_id).between(first, last);
    let approved = window.clone().with_status(LeaveStatus::Approved.as_ref());

    let (records, leaves) = futures::try_join!(
        fetch::fetch::<AttendanceRecord>(pool, &window),
        fetch::fetch::<LeaveRequest>(pool, &approved),
    )?;

    let summary = summarize_month(employee_id, year, month, &records, &leaves)?;
    Ok(Month {
        summary,
        records,
        leaves,
    })
}

/// A month with neither attendance nor approved leave has nothing to export.
fn ensure_exportable(records: &[AttendanceRecord], leaves: &[LeaveRequest]) -> AppResult<()> {
    if records.is_empty() && leaves.is_empty() {
        return Err(AppError::NoData);
    }
    Ok(())
}

/// Two-column Metric/Value layout of a monthly summary.
fn summary_metrics(summary: &MonthlyAttendance) -> Table {
    let rows = [
        ("Working days", summary.working_days.to_string()),
        ("Present days", summary.present_days.to_string()),
        ("Late days", summary.late_days.to_string()),
        ("Half days", summary.half_days.to_string()),
        ("Leave days", summary.leave_days.to_string()),
        ("Absent days", summary.absent_days.to_string()),
        ("Total hours", format!("{:.2}", summary.total_hours)),
        ("Attendance rate", format!("{}%", summary.attendance_rate)),
    ];
    Table {
        columns: vec!["Metric".into(), "Value".into()],
        rows: rows
            .into_iter()
            .map(|(metric, value)| vec![metric.to_string(), value])
            .collect(),
    }
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Monthly attendance summary", body = MonthlyAttendance),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = query.employee_id.unwrap_or(auth.profile_id);
    auth.require_self_or_manager(employee_id)?;

    let month = month_of(pool.get_ref(), employee_id, query.year, query.month).await?;
    Ok(HttpResponse::Ok().json(month.summary))
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary/export",
    params(SummaryExportQuery),
    responses(
        (status = 200, description = "Summary file", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid period"),
        (status = 404, description = "Nothing recorded in the month"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn export_attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryExportQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = query.employee_id.unwrap_or(auth.profile_id);
    auth.require_self_or_manager(employee_id)?;

    let Month {
        summary,
        records,
        leaves,
    } = month_of(pool.get_ref(), employee_id, query.year, query.month).await?;
    ensure_exportable(&records, &leaves)?;
    let code = employee_code(pool.get_ref(), employee_id).await?;
    let period = format!("{}-{:02}", query.year, query.month);

    let bytes = match query.format {
        ExportFormat::Csv => {
            render_csv(&Table::from_records(std::slice::from_ref(&summary), None)?)?
        }
        ExportFormat::Pdf => {
            let mut sections = vec![TableSection::new(
                "Summary",
                summary_metrics(&summary),
                HeaderColor::Blue,
            )];
            if !records.is_empty() {
                let daily = Table::from_records(
                    &records,
                    Some(&["date", "check_in_time", "check_out_time", "status", "effective_hours"]),
                )?;
                sections.push(TableSection::new("Daily records", daily, HeaderColor::Slate));
            }
            render_pdf(&PdfReport {
                title: "Monthly attendance".into(),
                generated_at: Utc::now().naive_utc(),
                subtitle: vec![format!("Employee: {code}"), format!("Period: {period}")],
                sections,
            })?
        }
    };

    let filename = export_filename("attendance", Some(&code), &period, query.format);
    info!(employee_id, filename = %filename, "Exported attendance summary");
    Ok(attachment(bytes, filename, query.format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pdf_report::{fit_cell, page_column_widths};

    #[test]
    fn export_query_parses_format() {
        let q: SummaryExportQuery =
            serde_json::from_str(r#"{"year":2024,"month":5,"format":"pdf"}"#).unwrap();
        assert_eq!(q.format, ExportFormat::Pdf);
        assert!(q.employee_id.is_none());
    }

    fn sample_summary() -> MonthlyAttendance {
        MonthlyAttendance {
            employee_id: 7,
            year: 2024,
            month: 5,
            working_days: 23,
            present_days: 18,
            late_days: 2,
            half_days: 1,
            leave_days: 2,
            absent_days: 3,
            total_hours: 152.5,
            attendance_rate: 78,
        }
    }

    #[test]
    fn empty_month_has_nothing_to_export() {
        assert!(matches!(ensure_exportable(&[], &[]), Err(AppError::NoData)));
    }

    #[test]
    fn summary_metrics_list_one_figure_per_row() {
        let table = summary_metrics(&sample_summary());
        assert_eq!(table.columns, vec!["Metric", "Value"]);
        assert_eq!(table.rows.len(), 8);
        assert_eq!(table.rows[5], vec!["Absent days".to_string(), "3".to_string()]);
        assert_eq!(table.rows[7], vec!["Attendance rate".to_string(), "78%".to_string()]);
    }

    #[test]
    fn summary_metrics_fit_the_page_untruncated() {
        let table = summary_metrics(&sample_summary());
        let widths = page_column_widths(&table);
        for (header, width) in table.columns.iter().zip(&widths) {
            assert_eq!(&fit_cell(header, *width), header);
        }
        for row in &table.rows {
            for (cell, width) in row.iter().zip(&widths) {
                assert_eq!(&fit_cell(cell, *width), cell);
            }
        }
    }

    #[test]
    fn export_query_rejects_unknown_format() {
        let q = serde_json::from_str::<SummaryExportQuery>(r#"{"year":2024,"month":5,"format":"xls"}"#);
        assert!(q.is_err());
    }
}
