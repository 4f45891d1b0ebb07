use crate::{
    auth::auth::AuthUser,
    error::AppError,
    events::{ChangeFeed, ChangeKind},
    fetch::{self, Collection, FetchQuery},
    model::leave_request::{LeaveRequest, LeaveStatus},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use strum_macros::AsRefStr;
use tracing::{error, info};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Serialize, Deserialize, ToSchema, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    #[schema(example = "Flu")]
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub total: usize,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "message": "Leave request submitted",
            "id": 4,
            "status": "pending"
        })),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.profile_id;

    if payload.start_date > payload.end_date {
        return Err(AppError::validation("start_date cannot be after end_date").into());
    }
    payload.validate().map_err(AppError::from)?;

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(&payload.reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to create leave request");
        AppError::from(e)
    })?;

    let id = result.last_insert_id();
    info!(leave_id = id, employee_id, "Leave request submitted");
    feed.publish(Collection::LeaveRequests, ChangeKind::Insert, Some(id));

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": id,
        "status": LeaveStatus::Pending
    })))
}

/// Moves a pending request to `target`. Anything not pending is left alone.
async fn decide(
    pool: &MySqlPool,
    feed: &ChangeFeed,
    leave_id: u64,
    target: LeaveStatus,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ? AND status = ?")
        .bind(target.as_ref())
        .bind(leave_id)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(pool)
        .await
        .map_err(|e| {
            error!(error = %e, leave_id, status = %target, "Leave decision failed");
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::validation("Leave request not found or already processed"));
    }

    info!(leave_id, status = %target, "Leave request decided");
    feed.publish(Collection::LeaveRequests, ChangeKind::Update, Some(leave_id));
    Ok(())
}

/* =========================
Approve leave (Manager/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "message": "Leave approved"
        })),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    decide(pool.get_ref(), feed.get_ref(), path.into_inner(), LeaveStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave approved" })))
}

/* =========================
Reject leave (Manager/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    decide(pool.get_ref(), feed.get_ref(), path.into_inner(), LeaveStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected" })))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = fetch::fetch_by_id::<LeaveRequest>(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_manager(leave.employee_id)?;
    Ok(HttpResponse::Ok().json(leave))
}

/// Leave requests overlapping `from..=to`, optionally by status.
#[utoipa::path(
    get,
    path = "/api/leave",
    params(FetchQuery),
    responses(
        (status = 200, description = "Leave list", body = LeaveListResponse),
        (status = 400, description = "Invalid filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FetchQuery>,
) -> actix_web::Result<impl Responder> {
    let mut query = query.into_inner();
    query.employee_id = auth.scope_employee(query.employee_id);

    let data = fetch::fetch::<LeaveRequest>(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(LeaveListResponse {
        total: data.len(),
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(reason: &str) -> CreateLeave {
        CreateLeave {
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 3).unwrap(),
            leave_type: LeaveType::Sick,
            reason: reason.into(),
        }
    }

    #[test]
    fn reason_is_required() {
        assert!(payload("Flu").validate().is_ok());
        assert!(payload("").validate().is_err());
    }

    #[test]
    fn leave_type_is_stored_lowercase() {
        assert_eq!(LeaveType::Annual.as_ref(), "annual");
        assert_eq!(LeaveType::Unpaid.as_ref(), "unpaid");
    }

    #[test]
    fn leave_type_rejects_unknown_values() {
        let parsed: Result<LeaveType, _> = serde_json::from_str("\"sabbatical\"");
        assert!(parsed.is_err());
    }
}
