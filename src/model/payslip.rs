use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

pub const PAYSLIP_COLUMNS: &str = "id, employee_id, month, year, basic_salary, hra, da, ta, \
     other_allowances, epf_deduction, other_deductions, net_salary";

/// Earnings and deductions making up one payslip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayslipComponents {
    #[schema(example = 50000.0)]
    pub basic_salary: f64,
    #[schema(example = 20000.0)]
    #[serde(default)]
    pub hra: f64,
    #[serde(default)]
    pub da: f64,
    #[serde(default)]
    pub ta: f64,
    #[serde(default)]
    pub other_allowances: f64,
    #[schema(example = 6000.0)]
    #[serde(default)]
    pub epf_deduction: f64,
    #[serde(default)]
    pub other_deductions: f64,
}

impl PayslipComponents {
    pub fn total_earnings(&self) -> f64 {
        self.basic_salary + self.hra + self.da + self.ta + self.other_allowances
    }

    pub fn total_deductions(&self) -> f64 {
        self.epf_deduction + self.other_deductions
    }

    pub fn net_salary(&self) -> f64 {
        self.total_earnings() - self.total_deductions()
    }

    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("basic_salary", self.basic_salary),
            ("hra", self.hra),
            ("da", self.da),
            ("ta", self.ta),
            ("other_allowances", self.other_allowances),
            ("epf_deduction", self.epf_deduction),
            ("other_deductions", self.other_deductions),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{name} must be a non-negative amount"
                )));
            }
        }
        Ok(())
    }
}

/// EPF contribution on the basic salary, rounded to paise.
pub fn epf_deduction(basic_salary: f64, epf_percentage: f64) -> f64 {
    (basic_salary * epf_percentage / 100.0 * 100.0).round() / 100.0
}

#[derive(Debug, FromRow)]
pub struct PayslipRow {
    pub id: u64,
    pub employee_id: u64,
    pub month: u8,
    pub year: u16,
    pub basic_salary: f64,
    pub hra: f64,
    pub da: f64,
    pub ta: f64,
    pub other_allowances: f64,
    pub epf_deduction: f64,
    pub other_deductions: f64,
    pub net_salary: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Payslip {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = 5)]
    pub month: u8,
    #[schema(example = 2024)]
    pub year: u16,
    #[serde(flatten)]
    pub components: PayslipComponents,
    pub net_salary: f64,
}

impl TryFrom<PayslipRow> for Payslip {
    type Error = AppError;

    fn try_from(row: PayslipRow) -> Result<Self, Self::Error> {
        if !(1..=12).contains(&row.month) {
            return Err(AppError::row_shape(
                "payslips",
                format!("month {} out of range", row.month),
            ));
        }
        let components = PayslipComponents {
            basic_salary: row.basic_salary,
            hra: row.hra,
            da: row.da,
            ta: row.ta,
            other_allowances: row.other_allowances,
            epf_deduction: row.epf_deduction,
            other_deductions: row.other_deductions,
        };
        let net_salary = components.net_salary();
        if (net_salary - row.net_salary).abs() > 0.005 {
            tracing::warn!(
                payslip_id = row.id,
                stored = row.net_salary,
                recomputed = net_salary,
                "Stored net salary disagrees with components"
            );
        }
        Ok(Payslip {
            id: row.id,
            employee_id: row.employee_id,
            month: row.month,
            year: row.year,
            components,
            net_salary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_salary_is_earnings_minus_deductions() {
        let c = PayslipComponents {
            basic_salary: 50000.0,
            hra: 20000.0,
            da: 5000.0,
            ta: 1600.0,
            other_allowances: 400.0,
            epf_deduction: 6000.0,
            other_deductions: 1000.0,
        };
        assert_eq!(c.total_earnings(), 77000.0);
        assert_eq!(c.total_deductions(), 7000.0);
        assert_eq!(c.net_salary(), 70000.0);
    }

    #[test]
    fn all_zero_components_net_to_zero() {
        assert_eq!(PayslipComponents::default().net_salary(), 0.0);
    }

    #[test]
    fn deductions_can_exceed_earnings() {
        let c = PayslipComponents {
            basic_salary: 100.0,
            other_deductions: 250.0,
            ..Default::default()
        };
        assert_eq!(c.net_salary(), -150.0);
    }

    #[test]
    fn negative_component_is_rejected() {
        let c = PayslipComponents {
            basic_salary: 100.0,
            hra: -1.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn stored_net_is_ignored_in_favour_of_components() {
        let row = PayslipRow {
            id: 1,
            employee_id: 2,
            month: 5,
            year: 2024,
            basic_salary: 1000.0,
            hra: 200.0,
            da: 0.0,
            ta: 0.0,
            other_allowances: 0.0,
            epf_deduction: 120.0,
            other_deductions: 0.0,
            net_salary: 999_999.0,
        };
        let slip = Payslip::try_from(row).unwrap();
        assert_eq!(slip.net_salary, 1080.0);
    }

    #[test]
    fn epf_is_percentage_of_basic() {
        assert_eq!(epf_deduction(50000.0, 12.0), 6000.0);
        assert_eq!(epf_deduction(12345.0, 12.0), 1481.4);
        assert_eq!(epf_deduction(0.0, 12.0), 0.0);
    }
}
