use crate::{
    api::profile::employee_code,
    auth::auth::AuthUser,
    error::{AppError, on_constraint},
    events::{ChangeFeed, ChangeKind},
    export::{
        ExportFormat, Table, attachment, export_filename,
        pdf_report::{HeaderColor, PdfReport, TableSection, render_pdf},
    },
    fetch::{self, Collection, FetchQuery},
    model::{
        payslip::{Payslip, PayslipComponents, epf_deduction},
        salary::SalaryInformation,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct UpsertPayslip {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = 5)]
    pub month: u8,
    #[schema(example = 2024)]
    pub year: u16,
    #[schema(example = 50000.0)]
    pub basic_salary: f64,
    #[serde(default)]
    pub hra: f64,
    #[serde(default)]
    pub da: f64,
    #[serde(default)]
    pub ta: f64,
    #[serde(default)]
    pub other_allowances: f64,
    /// Derived from the employee's EPF percentage when omitted
    pub epf_deduction: Option<f64>,
    #[serde(default)]
    pub other_deductions: f64,
}

impl UpsertPayslip {
    fn components(&self, epf: f64) -> PayslipComponents {
        PayslipComponents {
            basic_salary: self.basic_salary,
            hra: self.hra,
            da: self.da,
            ta: self.ta,
            other_allowances: self.other_allowances,
            epf_deduction: epf,
            other_deductions: self.other_deductions,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PayslipListResponse {
    pub data: Vec<Payslip>,
    #[schema(example = 12)]
    pub total: usize,
}

/// EPF for a payslip that did not state one.
async fn default_epf(pool: &MySqlPool, employee_id: u64, basic_salary: f64) -> Result<f64, AppError> {
    let salary = fetch::fetch::<SalaryInformation>(pool, &FetchQuery::for_employee(employee_id))
        .await?
        .into_iter()
        .next();
    Ok(match salary {
        Some(s) => epf_deduction(basic_salary, s.epf_percentage),
        None => {
            debug!(employee_id, "No salary information; EPF defaults to zero");
            0.0
        }
    })
}

/// Creates or replaces the payslip for (employee, month, year)
#[utoipa::path(
    put,
    path = "/api/payslips",
    request_body = UpsertPayslip,
    responses(
        (status = 200, description = "Payslip saved", body = Object, example = json!({
            "message": "Payslip saved", "id": 3, "net_salary": 64000.0
        })),
        (status = 400, description = "Invalid period or negative amount"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn upsert_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<UpsertPayslip>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    if !(1..=12).contains(&payload.month) {
        return Err(AppError::validation("month must be between 1 and 12").into());
    }

    let epf = match payload.epf_deduction {
        Some(v) => v,
        None => default_epf(pool.get_ref(), payload.employee_id, payload.basic_salary).await?,
    };
    let components = payload.components(epf);
    components.validate()?;
    let net_salary = components.net_salary();

    let existing: Option<u64> = sqlx::query_scalar(
        "SELECT id FROM payslips WHERE employee_id = ? AND month = ? AND year = ?",
    )
    .bind(payload.employee_id)
    .bind(payload.month)
    .bind(payload.year)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id = payload.employee_id, "Failed to look up payslip");
        AppError::from(e)
    })?;

    let (id, kind) = match existing {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE payslips
                SET basic_salary = ?, hra = ?, da = ?, ta = ?, other_allowances = ?,
                    epf_deduction = ?, other_deductions = ?, net_salary = ?
                WHERE id = ?
                "#,
            )
            .bind(components.basic_salary)
            .bind(components.hra)
            .bind(components.da)
            .bind(components.ta)
            .bind(components.other_allowances)
            .bind(components.epf_deduction)
            .bind(components.other_deductions)
            .bind(net_salary)
            .bind(id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, payslip_id = id, "Failed to update payslip");
                AppError::from(e)
            })?;
            (id, ChangeKind::Update)
        }
        None => {
            let result = sqlx::query(
                r#"
                INSERT INTO payslips
                (employee_id, month, year, basic_salary, hra, da, ta, other_allowances,
                 epf_deduction, other_deductions, net_salary)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(payload.employee_id)
            .bind(payload.month)
            .bind(payload.year)
            .bind(components.basic_salary)
            .bind(components.hra)
            .bind(components.da)
            .bind(components.ta)
            .bind(components.other_allowances)
            .bind(components.epf_deduction)
            .bind(components.other_deductions)
            .bind(net_salary)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, employee_id = payload.employee_id, "Failed to insert payslip");
                on_constraint(e, "Payslip for this period already exists or employee is unknown")
            })?;
            (result.last_insert_id(), ChangeKind::Insert)
        }
    };

    info!(
        payslip_id = id,
        employee_id = payload.employee_id,
        month = payload.month,
        year = payload.year,
        net_salary,
        "Payslip saved"
    );
    feed.publish(Collection::Payslips, kind, Some(id));

    Ok(HttpResponse::Ok().json(json!({
        "message": "Payslip saved",
        "id": id,
        "net_salary": net_salary
    })))
}

#[utoipa::path(
    get,
    path = "/api/payslips",
    params(FetchQuery),
    responses((status = 200, description = "Payslips", body = PayslipListResponse)),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn list_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FetchQuery>,
) -> actix_web::Result<impl Responder> {
    let mut query = query.into_inner();
    query.employee_id = auth.scope_employee(query.employee_id);

    let data = fetch::fetch::<Payslip>(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(PayslipListResponse {
        total: data.len(),
        data,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payslips/{payslip_id}",
    params(("payslip_id" = u64, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip found", body = Payslip),
        (status = 404, description = "Payslip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payslip = fetch::fetch_by_id::<Payslip>(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_manager(payslip.employee_id)?;
    Ok(HttpResponse::Ok().json(payslip))
}

fn amount_table(items: &[(&str, f64)], total_label: &str, total: f64) -> Table {
    let mut rows: Vec<Vec<String>> = items
        .iter()
        .map(|(name, v)| vec![name.to_string(), format!("{v:.2}")])
        .collect();
    rows.push(vec![total_label.to_string(), format!("{total:.2}")]);
    Table {
        columns: vec!["Component".into(), "Amount".into()],
        rows,
    }
}

/// Earnings and deductions sections of a payslip document.
fn payslip_report(payslip: &Payslip, code: &str) -> PdfReport {
    let c = &payslip.components;
    let earnings = amount_table(
        &[
            ("Basic salary", c.basic_salary),
            ("HRA", c.hra),
            ("DA", c.da),
            ("TA", c.ta),
            ("Other allowances", c.other_allowances),
        ],
        "Total earnings",
        c.total_earnings(),
    );
    let deductions = amount_table(
        &[("EPF", c.epf_deduction), ("Other deductions", c.other_deductions)],
        "Total deductions",
        c.total_deductions(),
    );

    PdfReport {
        title: "Payslip".into(),
        generated_at: Utc::now().naive_utc(),
        subtitle: vec![
            format!("Employee: {code}"),
            format!("Period: {}-{:02}", payslip.year, payslip.month),
            format!("Net salary: {:.2}", payslip.net_salary),
        ],
        sections: vec![
            TableSection::new("Earnings", earnings, HeaderColor::Green),
            TableSection::new("Deductions", deductions, HeaderColor::Red),
        ],
    }
}

#[utoipa::path(
    get,
    path = "/api/payslips/{payslip_id}/pdf",
    params(("payslip_id" = u64, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip PDF", content_type = "application/pdf"),
        (status = 404, description = "Payslip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn payslip_pdf(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payslip = fetch::fetch_by_id::<Payslip>(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_manager(payslip.employee_id)?;

    let code = employee_code(pool.get_ref(), payslip.employee_id).await?;
    let bytes = render_pdf(&payslip_report(&payslip, &code))?;

    let period = format!("{}-{:02}", payslip.year, payslip.month);
    let filename = export_filename("payslip", Some(&code), &period, ExportFormat::Pdf);
    info!(payslip_id = payslip.id, filename = %filename, "Rendered payslip");
    Ok(attachment(bytes, filename, ExportFormat::Pdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payslip() -> Payslip {
        let components = PayslipComponents {
            basic_salary: 50000.0,
            hra: 20000.0,
            da: 0.0,
            ta: 1500.0,
            other_allowances: 0.0,
            epf_deduction: 6000.0,
            other_deductions: 500.0,
        };
        Payslip {
            id: 3,
            employee_id: 7,
            month: 5,
            year: 2024,
            net_salary: components.net_salary(),
            components,
        }
    }

    #[test]
    fn omitted_amounts_default_to_zero() {
        let body: UpsertPayslip = serde_json::from_str(
            r#"{"employee_id":7,"month":5,"year":2024,"basic_salary":40000}"#,
        )
        .unwrap();
        assert!(body.epf_deduction.is_none());
        let c = body.components(4800.0);
        assert_eq!(c.total_earnings(), 40000.0);
        assert_eq!(c.net_salary(), 35200.0);
    }

    #[test]
    fn report_has_earnings_and_deductions_totals() {
        let report = payslip_report(&payslip(), "EMP-007");
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].color, HeaderColor::Green);
        assert_eq!(report.sections[1].color, HeaderColor::Red);

        let earnings = &report.sections[0].table;
        assert_eq!(earnings.rows.last().unwrap(), &vec!["Total earnings".to_string(), "71500.00".to_string()]);
        let deductions = &report.sections[1].table;
        assert_eq!(deductions.rows.last().unwrap()[1], "6500.00");
        assert!(report.subtitle.contains(&"Net salary: 65000.00".to_string()));
    }

    #[test]
    fn payslip_report_renders() {
        let bytes = render_pdf(&payslip_report(&payslip(), "EMP-007")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
