use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::parse_column;
use super::role::Role;
use crate::error::AppError;

pub const PROFILE_COLUMNS: &str =
    "id, name, email, employee_id, designation, department, role, join_date, phone, photo_url";

/// Row exactly as the `profiles` table returns it.
#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub employee_id: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub role: String,
    pub join_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "John Doe",
        "email": "john.doe@company.com",
        "employee_id": "EMP-001",
        "designation": "Software Engineer",
        "department": "Engineering",
        "role": "employee",
        "join_date": "2024-01-01",
        "phone": "+8801712345678",
        "photo_url": null
    })
)]
pub struct Profile {
    pub id: u64,
    pub name: String,
    #[schema(format = "email")]
    pub email: String,
    #[schema(example = "EMP-001")]
    pub employee_id: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    #[schema(value_type = Option<String>, format = "date")]
    pub join_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        if row.employee_id.trim().is_empty() {
            return Err(AppError::row_shape("profiles", "empty employee_id"));
        }
        Ok(Profile {
            role: parse_column("profiles", "role", &row.role)?,
            id: row.id,
            name: row.name,
            email: row.email,
            employee_id: row.employee_id,
            designation: row.designation,
            department: row.department,
            join_date: row.join_date,
            phone: row.phone,
            photo_url: row.photo_url,
        })
    }
}
