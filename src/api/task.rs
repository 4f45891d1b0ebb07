use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, on_constraint},
    events::{ChangeFeed, ChangeKind},
    fetch::{self, Collection, FetchQuery},
    model::task::{Task, TaskStatus},
    utils::db_utils::{SqlUpdate, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;
use validator::Validate;

/// Fields a manager may rewrite on an existing task.
const TASK_EDITABLE: &[&str] = &["title", "description", "status", "assigned_to", "due_date"];

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateTask {
    #[schema(example = "Prepare Q2 report")]
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = 7)]
    pub assigned_to: u64,
    #[schema(example = "2026-02-01", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    /// Defaults to pending
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskStatus {
    pub status: TaskStatus,
}

#[derive(Serialize, ToSchema)]
pub struct TaskListResponse {
    pub data: Vec<Task>,
    #[schema(example = 3)]
    pub total: usize,
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created", body = Object, example = json!({
            "message": "Task created", "id": 31
        })),
        (status = 400, description = "Validation failed or unknown assignee"),
        (status = 403, description = "Manager/Admin only")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateTask>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    payload.validate().map_err(AppError::from)?;

    let status = payload.status.unwrap_or(TaskStatus::Pending);
    let result = sqlx::query(
        r#"
        INSERT INTO tasks (title, description, status, assigned_to, assigned_by, due_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(status.as_ref())
    .bind(payload.assigned_to)
    .bind(auth.profile_id)
    .bind(payload.due_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, assigned_to = payload.assigned_to, "Failed to create task");
        on_constraint(e, "Assignee does not exist")
    })?;

    let id = result.last_insert_id();
    info!(task_id = id, assigned_to = payload.assigned_to, "Task created");
    feed.publish(Collection::Tasks, ChangeKind::Insert, Some(id));

    Ok(HttpResponse::Created().json(json!({ "message": "Task created", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    params(FetchQuery),
    responses((status = 200, description = "Matching tasks", body = TaskListResponse)),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FetchQuery>,
) -> actix_web::Result<impl Responder> {
    let mut query = query.into_inner();
    query.employee_id = auth.scope_employee(query.employee_id);

    let data = fetch::fetch::<Task>(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(TaskListResponse {
        total: data.len(),
        data,
    }))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let task = fetch::fetch_by_id::<Task>(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_manager(task.assigned_to)?;
    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Task updated"),
        (status = 400, description = "Field not editable or invalid value"),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let task_id = path.into_inner();

    if let Some(status) = body.get("status") {
        let valid = status
            .as_str()
            .map(|s| s.parse::<TaskStatus>().is_ok())
            .unwrap_or(false);
        if !valid {
            return Err(AppError::validation(
                "status must be pending, in_progress, completed or cancelled",
            )
            .into());
        }
    }

    let update = task_update(&body, task_id)?;
    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, task_id, "Failed to update task");
        on_constraint(e, "Assignee does not exist")
    })?;

    if affected == 0 {
        return Err(AppError::NotFound { entity: "task" }.into());
    }

    feed.publish(Collection::Tasks, ChangeKind::Update, Some(task_id));
    Ok(HttpResponse::Ok().json(json!({ "message": "Task updated" })))
}

fn task_update(body: &Value, task_id: u64) -> AppResult<SqlUpdate> {
    Ok(build_update_sql("tasks", body, TASK_EDITABLE, "id", task_id)?.stamped("updated_at"))
}

/// Sets any status from any status; there is no workflow.
#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}/status",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = UpdateTaskStatus,
    responses(
        (status = 200, description = "Status updated", body = Object, example = json!({
            "message": "Status updated", "status": "completed"
        })),
        (status = 403, description = "Not the assignee"),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTaskStatus>,
) -> actix_web::Result<impl Responder> {
    let task_id = path.into_inner();
    let task = fetch::fetch_by_id::<Task>(pool.get_ref(), task_id).await?;
    auth.require_self_or_manager(task.assigned_to)?;

    sqlx::query("UPDATE tasks SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(payload.status.as_ref())
        .bind(task_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, task_id, "Failed to update task status");
            AppError::from(e)
        })?;

    info!(task_id, from = %task.status, to = %payload.status, "Task status changed");
    feed.publish(Collection::Tasks, ChangeKind::Update, Some(task_id));

    Ok(HttpResponse::Ok().json(json!({
        "message": "Status updated",
        "status": payload.status
    })))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let task_id = path.into_inner();

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, task_id, "Failed to delete task");
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound { entity: "task" }.into());
    }

    feed.publish(Collection::Tasks, ChangeKind::Delete, Some(task_id));
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
