use crate::{
    auth::auth::AuthUser,
    error::{AppError, on_constraint},
    events::{ChangeFeed, ChangeKind},
    fetch::{self, Collection, FetchQuery},
    model::salary::{SalaryInformation, net_pay, validate_salary},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct UpsertSalary {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = 80000.0)]
    pub gross_salary: f64,
    #[schema(example = 12.0)]
    #[serde(default)]
    pub epf_percentage: f64,
    #[schema(example = 9600.0)]
    #[serde(default)]
    pub total_deduction: f64,
    /// Replaces `gross_salary - total_deduction` when set
    pub net_pay: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/salary/{employee_id}",
    params(("employee_id" = u64, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Salary information", body = SalaryInformation),
        (status = 404, description = "No salary information for this employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn get_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_manager(employee_id)?;

    let salary = fetch::fetch::<SalaryInformation>(pool.get_ref(), &FetchQuery::for_employee(employee_id))
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound {
            entity: "salary information",
        })?;
    Ok(HttpResponse::Ok().json(salary))
}

/// One record per employee: insert, or replace the existing one.
#[utoipa::path(
    put,
    path = "/api/salary",
    request_body = UpsertSalary,
    responses(
        (status = 200, description = "Salary saved", body = Object, example = json!({
            "message": "Salary saved", "net_pay": 70400.0
        })),
        (status = 400, description = "Invalid amount or unknown employee"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn upsert_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<UpsertSalary>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    validate_salary(payload.gross_salary, payload.epf_percentage, payload.total_deduction)?;
    let net = net_pay(payload.gross_salary, payload.total_deduction, payload.net_pay);

    let existing: Option<u64> =
        sqlx::query_scalar("SELECT id FROM salary_information WHERE employee_id = ?")
            .bind(payload.employee_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, employee_id = payload.employee_id, "Failed to look up salary");
                AppError::from(e)
            })?;

    let (id, kind) = match existing {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE salary_information
                SET gross_salary = ?, epf_percentage = ?, total_deduction = ?, net_pay = ?
                WHERE id = ?
                "#,
            )
            .bind(payload.gross_salary)
            .bind(payload.epf_percentage)
            .bind(payload.total_deduction)
            .bind(net)
            .bind(id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, salary_id = id, "Failed to update salary");
                AppError::from(e)
            })?;
            (id, ChangeKind::Update)
        }
        None => {
            let result = sqlx::query(
                r#"
                INSERT INTO salary_information
                (employee_id, gross_salary, epf_percentage, total_deduction, net_pay)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(payload.employee_id)
            .bind(payload.gross_salary)
            .bind(payload.epf_percentage)
            .bind(payload.total_deduction)
            .bind(net)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, employee_id = payload.employee_id, "Failed to insert salary");
                on_constraint(e, "Salary already exists or employee is unknown")
            })?;
            (result.last_insert_id(), ChangeKind::Insert)
        }
    };

    info!(salary_id = id, employee_id = payload.employee_id, net_pay = net, "Salary saved");
    feed.publish(Collection::SalaryInformation, kind, Some(id));

    Ok(HttpResponse::Ok().json(json!({
        "message": "Salary saved",
        "id": id,
        "net_pay": net
    })))
}
