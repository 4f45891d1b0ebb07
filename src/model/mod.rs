pub mod attendance;
pub mod leave_request;
pub mod payslip;
pub mod profile;
pub mod role;
pub mod salary;
pub mod task;

use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Parses a string column into its enum, rejecting values we do not know.
pub(crate) fn parse_column<T: FromStr>(
    collection: &'static str,
    column: &str,
    raw: &str,
) -> AppResult<T> {
    raw.parse::<T>().map_err(|_| {
        tracing::warn!(collection, column, value = raw, "Rejecting row with unknown value");
        AppError::row_shape(collection, format!("unknown {column} '{raw}'"))
    })
}
