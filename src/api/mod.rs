pub mod attendance;
pub mod events;
pub mod health;
pub mod leave_request;
pub mod payslip;
pub mod profile;
pub mod report;
pub mod salary;
pub mod storage;
pub mod task;
