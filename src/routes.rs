use crate::{
    api::{attendance, events, health, leave_request, payslip, profile, report, salary, storage, task},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP rate limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    protected: Limiter,
    upload: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Limiters {
            protected: build_limiter(config.rate_protected_per_min)?,
            upload: build_limiter(config.rate_upload_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min} requests per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.route("/health", web::get().to(health::health)).route(
        "/files/{folder}/{file}",
        web::get().to(storage::download),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/profiles")
                    // /profiles
                    .service(
                        web::resource("")
                            .route(web::post().to(profile::create_profile))
                            .route(web::get().to(profile::list_profiles)),
                    )
                    // /profiles/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(profile::get_profile))
                            .route(web::put().to(profile::update_profile))
                            .route(web::delete().to(profile::delete_profile)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .service(
                        web::resource("")
                            .route(web::post().to(task::create_task))
                            .route(web::get().to(task::list_tasks)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(task::get_task))
                            .route(web::put().to(task::update_task))
                            .route(web::delete().to(task::delete_task)),
                    )
                    // /tasks/{id}/status
                    .service(
                        web::resource("/{id}/status")
                            .route(web::put().to(task::update_task_status)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/summary")
                            .route(web::get().to(attendance::attendance_summary)),
                    )
                    .service(
                        web::resource("/summary/export")
                            .route(web::get().to(attendance::export_attendance_summary)),
                    ),
            )
            .service(
                web::scope("/payslips")
                    .service(
                        web::resource("")
                            .route(web::get().to(payslip::list_payslips))
                            .route(web::put().to(payslip::upsert_payslip)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(payslip::get_payslip)))
                    .service(web::resource("/{id}/pdf").route(web::get().to(payslip::payslip_pdf))),
            )
            .service(
                web::scope("/salary")
                    .service(web::resource("").route(web::put().to(salary::upsert_salary)))
                    .service(
                        web::resource("/{employee_id}").route(web::get().to(salary::get_salary)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/dashboard").route(web::get().to(report::dashboard)))
                    .service(web::resource("/tasks").route(web::get().to(report::task_report)))
                    .service(web::resource("/leave").route(web::get().to(report::leave_report)))
                    .service(
                        web::resource("/attendance").route(web::get().to(report::attendance_report)),
                    )
                    .service(
                        web::resource("/{kind}/export").route(web::get().to(report::export_report)),
                    ),
            )
            .service(
                web::resource("/events/{collection}").route(web::get().to(events::subscribe)),
            )
            .service(
                web::resource("/storage/{folder}")
                    .app_data(web::PayloadConfig::new(config.max_upload_bytes))
                    .wrap(limiters.upload.clone())
                    .route(web::post().to(storage::upload)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[test]
    fn limiters_build_from_default_config() {
        assert!(Limiters::from_config(&Config::for_tests()).is_ok());
    }

    #[test]
    fn zero_rate_still_builds_a_limiter() {
        assert!(build_limiter(0).is_ok());
    }

    #[actix_web::test]
    async fn protected_scope_requires_a_token() {
        let config = Config::for_tests();
        let limiters = Limiters::from_config(&config).unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config, &limiters)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri(&format!("{}/profiles", config.api_prefix))
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
