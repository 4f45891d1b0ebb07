use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// Short-circuits the request with a 401 in the shared error body shape.
fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    tracing::warn!(path = %req.path(), reason = message, "Rejected unauthenticated request");
    let resp = AppError::Unauthorized(message.to_string()).error_response();
    req.into_response(resp)
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("App config missing".into()))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => return Ok(reject(req, "Invalid Authorization header encoding")),
        },
        None => return Ok(reject(req, "Missing Authorization header")),
    };

    let Some(token) = header_value.strip_prefix("Bearer ") else {
        return Ok(reject(req, "Authorization header must start with Bearer"));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token verification failed");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    let auth_user = match AuthUser::try_from(claims) {
        Ok(user) => user,
        Err(e) => return Ok(reject(req, &e.to_string())),
    };

    tracing::debug!(
        profile_id = auth_user.profile_id,
        email = %auth_user.email,
        role = %auth_user.role,
        "Authenticated request"
    );
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::issue_test_token;
    use actix_web::middleware::from_fn;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.profile_id.to_string())
    }

    #[actix_web::test]
    async fn rejects_missing_header() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Config::for_tests()))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({"message": "Missing Authorization header"}));
    }

    #[actix_web::test]
    async fn bad_token_gets_message_body_without_details() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Config::for_tests()))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", "Bearer junk"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({"message": "Invalid or expired token"}));
    }

    #[actix_web::test]
    async fn passes_verified_user_to_handler() {
        let config = Config::for_tests();
        let token = issue_test_token(7, "employee", &config.jwt_secret);
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "7");
    }
}
