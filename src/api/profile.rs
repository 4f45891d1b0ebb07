use crate::{
    auth::auth::AuthUser,
    error::{AppError, on_constraint},
    events::{ChangeFeed, ChangeKind},
    fetch::{self, Collection, FetchQuery},
    model::{profile::Profile, role::Role},
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;
use validator::Validate;

/// Fields an employee may change on their own profile.
const SELF_EDITABLE: &[&str] = &["name", "phone", "photo_url"];
/// Fields an admin may change on any profile.
const ADMIN_EDITABLE: &[&str] = &[
    "name",
    "email",
    "employee_id",
    "designation",
    "department",
    "role",
    "join_date",
    "phone",
    "photo_url",
];

#[derive(Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateProfile {
    #[schema(example = "John Doe")]
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[schema(example = "john@company.com", format = "email")]
    #[validate(email)]
    pub email: String,
    #[schema(example = "EMP-001")]
    #[validate(length(min = 1, max = 32))]
    pub employee_id: String,
    #[schema(example = "Software Engineer")]
    pub designation: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    pub role: Role,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub join_date: Option<NaiveDate>,
    pub phone: Option<String>,
}

#[derive(Validate)]
struct EmailCheck {
    #[validate(email)]
    email: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileListResponse {
    pub data: Vec<Profile>,
    #[schema(example = 10)]
    pub total: usize,
}

/// Create Profile
#[utoipa::path(
    post,
    path = "/api/profiles",
    request_body = CreateProfile,
    responses(
        (status = 201, description = "Profile created", body = Object, example = json!({
            "message": "Profile created", "id": 12
        })),
        (status = 400, description = "Validation failed or duplicate employee id / email"),
        (status = 403, description = "Admin only")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn create_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateProfile>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    payload.validate().map_err(AppError::from)?;

    let result = sqlx::query(
        r#"
        INSERT INTO profiles
        (name, email, employee_id, designation, department, role, join_date, phone)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&payload.employee_id)
    .bind(&payload.designation)
    .bind(&payload.department)
    .bind(payload.role.as_ref())
    .bind(payload.join_date)
    .bind(&payload.phone)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id = %payload.employee_id, "Failed to create profile");
        on_constraint(e, "A profile with this email or employee id already exists")
    })?;

    let id = result.last_insert_id();
    info!(profile_id = id, "Profile created");
    feed.publish(Collection::Profiles, ChangeKind::Insert, Some(id));

    Ok(HttpResponse::Created().json(json!({
        "message": "Profile created",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/profiles",
    params(FetchQuery),
    responses(
        (status = 200, description = "Matching profiles", body = ProfileListResponse)
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn list_profiles(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FetchQuery>,
) -> actix_web::Result<impl Responder> {
    let mut query = query.into_inner();
    query.employee_id = auth.scope_employee(query.employee_id);

    let data = fetch::fetch::<Profile>(pool.get_ref(), &query).await?;

    Ok(HttpResponse::Ok().json(ProfileListResponse {
        total: data.len(),
        data,
    }))
}

#[utoipa::path(
    get,
    path = "/api/profiles/{profile_id}",
    params(("profile_id" = u64, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile found", body = Profile),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let profile_id = path.into_inner();
    auth.require_self_or_manager(profile_id)?;

    let profile = fetch::fetch_by_id::<Profile>(pool.get_ref(), profile_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Update Profile
#[utoipa::path(
    put,
    path = "/api/profiles/{profile_id}",
    params(("profile_id" = u64, Path, description = "Profile ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Field not editable or invalid value"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let profile_id = path.into_inner();
    let allowed = if auth.role.is_admin() {
        ADMIN_EDITABLE
    } else if auth.profile_id == profile_id {
        SELF_EDITABLE
    } else {
        return Err(AppError::Forbidden("Admin only".into()).into());
    };

    if let Some(role) = body.get("role") {
        let valid = role.as_str().map(|r| r.parse::<Role>().is_ok()).unwrap_or(false);
        if !valid {
            return Err(AppError::validation("role must be admin, manager or employee").into());
        }
    }
    if let Some(email) = body.get("email") {
        let valid = email
            .as_str()
            .map(|e| EmailCheck { email: e.to_string() }.validate().is_ok())
            .unwrap_or(false);
        if !valid {
            return Err(AppError::validation("email is malformed").into());
        }
    }

    let update = build_update_sql("profiles", &body, allowed, "id", profile_id)?;
    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, profile_id, "Failed to update profile");
        on_constraint(e, "A profile with this email or employee id already exists")
    })?;

    if affected == 0 {
        return Err(AppError::NotFound { entity: "profile" }.into());
    }

    feed.publish(Collection::Profiles, ChangeKind::Update, Some(profile_id));
    Ok(HttpResponse::Ok().json(json!({ "message": "Profile updated" })))
}

/// Delete Profile
#[utoipa::path(
    delete,
    path = "/api/profiles/{profile_id}",
    params(("profile_id" = u64, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn delete_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let profile_id = path.into_inner();

    let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(profile_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, profile_id, "Failed to delete profile");
            on_constraint(e, "Profile still has dependent records")
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound { entity: "profile" }.into());
    }

    feed.publish(Collection::Profiles, ChangeKind::Delete, Some(profile_id));
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Looks up the human employee code used in export file names.
pub(crate) async fn employee_code(pool: &MySqlPool, profile_id: u64) -> Result<String, AppError> {
    let profile = fetch::fetch_by_id::<Profile>(pool, profile_id).await?;
    Ok(profile.employee_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(email: &str, name: &str) -> CreateProfile {
        CreateProfile {
            name: name.into(),
            email: email.into(),
            employee_id: "EMP-010".into(),
            designation: None,
            department: None,
            role: Role::Employee,
            join_date: None,
            phone: None,
        }
    }

    #[test]
    fn create_payload_requires_valid_email_and_name() {
        assert!(payload("asha@company.com", "Asha").validate().is_ok());
        assert!(payload("not-an-email", "Asha").validate().is_err());
        assert!(payload("asha@company.com", "").validate().is_err());
    }

    #[test]
    fn employees_cannot_edit_role_or_department() {
        assert!(!SELF_EDITABLE.contains(&"role"));
        assert!(!SELF_EDITABLE.contains(&"department"));
        assert!(ADMIN_EDITABLE.contains(&"role"));
    }
}
