use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_upload_per_min: u32,

    // Content bucket
    pub storage_dir: String,
    pub storage_public_url: String,
    pub max_upload_bytes: usize,

    // Attendance rules
    pub late_after: NaiveTime,
    pub half_day_hours: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", 1000)?,
            rate_upload_per_min: parsed("RATE_UPLOAD_PER_MIN", 30)?,

            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| "storage".to_string()),
            storage_public_url: env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080/files".to_string())
                .trim_end_matches('/')
                .to_string(),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?, // 5 MiB

            late_after: match env::var("LATE_AFTER") {
                Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M:%S")
                    .with_context(|| format!("LATE_AFTER must be HH:MM:SS, got {raw}"))?,
                Err(_) => NaiveTime::from_hms_opt(9, 30, 0)
                    .ok_or_else(|| anyhow!("invalid default LATE_AFTER"))?,
            },
            half_day_hours: parsed("HALF_DAY_HOURS", 4.0)?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by handler tests, never read from the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/hradmin_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            api_prefix: "/api".to_string(),
            rate_protected_per_min: 1000,
            rate_upload_per_min: 30,
            storage_dir: std::env::temp_dir()
                .join("hradmin-test-storage")
                .to_string_lossy()
                .into_owned(),
            storage_public_url: "http://files.test".to_string(),
            max_upload_bytes: 1024,
            late_after: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            half_day_hours: 4.0,
        }
    }
}
