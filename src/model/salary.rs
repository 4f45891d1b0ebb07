use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

pub const SALARY_COLUMNS: &str =
    "id, employee_id, gross_salary, epf_percentage, total_deduction, net_pay";

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct SalaryInformation {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = 80000.0)]
    pub gross_salary: f64,
    #[schema(example = 12.0)]
    pub epf_percentage: f64,
    #[schema(example = 9600.0)]
    pub total_deduction: f64,
    #[schema(example = 70400.0)]
    pub net_pay: f64,
}

/// Net pay for a salary record; an explicit override wins over the difference.
pub fn net_pay(gross_salary: f64, total_deduction: f64, override_net: Option<f64>) -> f64 {
    override_net.unwrap_or(gross_salary - total_deduction)
}

pub fn validate_salary(
    gross_salary: f64,
    epf_percentage: f64,
    total_deduction: f64,
) -> AppResult<()> {
    if !gross_salary.is_finite() || gross_salary < 0.0 {
        return Err(AppError::validation("gross_salary must be a non-negative amount"));
    }
    if !(0.0..=100.0).contains(&epf_percentage) {
        return Err(AppError::validation("epf_percentage must be between 0 and 100"));
    }
    if !total_deduction.is_finite() || total_deduction < 0.0 {
        return Err(AppError::validation("total_deduction must be a non-negative amount"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_pay_defaults_to_gross_minus_deduction() {
        assert_eq!(net_pay(80000.0, 9600.0, None), 70400.0);
    }

    #[test]
    fn explicit_override_wins() {
        assert_eq!(net_pay(80000.0, 9600.0, Some(72000.0)), 72000.0);
    }

    #[test]
    fn rejects_out_of_range_epf() {
        assert!(validate_salary(1000.0, 120.0, 0.0).is_err());
        assert!(validate_salary(-1.0, 12.0, 0.0).is_err());
        assert!(validate_salary(1000.0, 12.0, 120.0).is_ok());
    }
}
