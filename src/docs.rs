use crate::aggregate::Granularity;
use crate::api::attendance::AttendanceListResponse;
use crate::api::leave_request::{CreateLeave, LeaveListResponse, LeaveType};
use crate::api::payslip::{PayslipListResponse, UpsertPayslip};
use crate::api::profile::{CreateProfile, ProfileListResponse};
use crate::api::report::{DashboardStats, ReportKind};
use crate::api::salary::UpsertSalary;
use crate::api::task::{CreateTask, TaskListResponse, UpdateTaskStatus};
use crate::export::ExportFormat;
use crate::fetch::Collection;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::payslip::{Payslip, PayslipComponents};
use crate::model::profile::Profile;
use crate::model::role::Role;
use crate::model::salary::SalaryInformation;
use crate::model::task::{Task, TaskStatus};
use crate::storage::StoredObject;
use crate::summary::MonthlyAttendance;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Admin API",
        version = "1.0.0",
        description = r#"
## HR administration service

Employee records, attendance, leave, tasks, payroll and reporting.

### Key Features
- **Profiles**: create, update, list and view employee profiles
- **Tasks**: assign tasks and move them between any statuses
- **Leave**: apply for leave, approve or reject pending requests
- **Attendance**: daily check-in / check-out and monthly summaries
- **Payroll**: salary information and monthly payslips (PDF)
- **Reports**: day / week / month status buckets with an optional comparison window, exported as CSV or PDF
- **Events**: per-collection change notifications over Server-Sent Events

### Security
Endpoints under `/api` expect a **JWT Bearer** token issued by the identity provider.
Approvals, reports and payroll writes are limited to managers and admins.
"#,
    ),
    paths(
        crate::api::profile::create_profile,
        crate::api::profile::list_profiles,
        crate::api::profile::get_profile,
        crate::api::profile::update_profile,
        crate::api::profile::delete_profile,

        crate::api::task::create_task,
        crate::api::task::list_tasks,
        crate::api::task::get_task,
        crate::api::task::update_task,
        crate::api::task::update_task_status,
        crate::api::task::delete_task,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_summary,
        crate::api::attendance::export_attendance_summary,

        crate::api::payslip::upsert_payslip,
        crate::api::payslip::list_payslips,
        crate::api::payslip::get_payslip,
        crate::api::payslip::payslip_pdf,

        crate::api::salary::get_salary,
        crate::api::salary::upsert_salary,

        crate::api::report::dashboard,
        crate::api::report::task_report,
        crate::api::report::leave_report,
        crate::api::report::attendance_report,
        crate::api::report::export_report,

        crate::api::events::subscribe,
        crate::api::storage::upload,
        crate::api::storage::download,
        crate::api::health::health
    ),
    components(
        schemas(
            Role,
            Profile,
            CreateProfile,
            ProfileListResponse,
            TaskStatus,
            Task,
            CreateTask,
            UpdateTaskStatus,
            TaskListResponse,
            LeaveStatus,
            LeaveType,
            LeaveRequest,
            CreateLeave,
            LeaveListResponse,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceListResponse,
            MonthlyAttendance,
            PayslipComponents,
            Payslip,
            UpsertPayslip,
            PayslipListResponse,
            SalaryInformation,
            UpsertSalary,
            DashboardStats,
            ReportKind,
            Granularity,
            ExportFormat,
            Collection,
            StoredObject
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Profile", description = "Employee profile APIs"),
        (name = "Task", description = "Task assignment APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Payslip", description = "Payslip APIs"),
        (name = "Salary", description = "Salary information APIs"),
        (name = "Report", description = "Dashboard and report APIs"),
        (name = "Events", description = "Change notification stream"),
        (name = "Storage", description = "Document and photo storage"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme the handlers refer to.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
