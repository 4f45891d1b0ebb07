use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::Claims;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// The verified caller, passed explicitly to every handler.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile_id: u64,
    pub email: String,
    pub role: Role,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let profile_id = claims
            .sub
            .parse::<u64>()
            .map_err(|_| AppError::Unauthorized("Invalid subject".into()))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized("Invalid role".into()))?;
        Ok(AuthUser {
            profile_id,
            email: claims.email,
            role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(AppError::Internal("Config missing".into())));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(AppError::Unauthorized("Invalid token".into()))),
        };

        ready(AuthUser::try_from(claims))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_manager_or_admin(&self) -> Result<(), AppError> {
        if self.role.can_manage() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Manager/Admin only".into()))
        }
    }

    /// Employees may only touch their own records.
    pub fn require_self_or_manager(&self, profile_id: u64) -> Result<(), AppError> {
        if self.profile_id == profile_id || self.role.can_manage() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not allowed to access another employee's records".into()))
        }
    }

    /// The employee filter a list query is allowed to use.
    pub fn scope_employee(&self, requested: Option<u64>) -> Option<u64> {
        if self.role.can_manage() {
            requested
        } else {
            Some(self.profile_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::issue_test_token;
    use actix_web::test::TestRequest;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            profile_id: 5,
            email: "e@company.com".into(),
            role,
        }
    }

    #[test]
    fn employees_are_scoped_to_themselves() {
        assert_eq!(user(Role::Employee).scope_employee(Some(9)), Some(5));
        assert_eq!(user(Role::Employee).scope_employee(None), Some(5));
        assert_eq!(user(Role::Manager).scope_employee(Some(9)), Some(9));
        assert_eq!(user(Role::Admin).scope_employee(None), None);
    }

    #[test]
    fn role_gates() {
        assert!(user(Role::Admin).require_admin().is_ok());
        assert!(user(Role::Manager).require_admin().is_err());
        assert!(user(Role::Manager).require_manager_or_admin().is_ok());
        assert!(user(Role::Employee).require_manager_or_admin().is_err());
        assert!(user(Role::Employee).require_self_or_manager(5).is_ok());
        assert!(user(Role::Employee).require_self_or_manager(6).is_err());
    }

    #[actix_web::test]
    async fn extracts_user_from_bearer_token() {
        let config = Config::for_tests();
        let token = issue_test_token(42, "admin", &config.jwt_secret);
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {token}")))
            .app_data(Data::new(config))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.profile_id, 42);
        assert_eq!(user.role, Role::Admin);
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(Data::new(Config::for_tests()))
            .to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn unknown_role_is_unauthorized() {
        let config = Config::for_tests();
        let token = issue_test_token(42, "hr", &config.jwt_secret);
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {token}")))
            .app_data(Data::new(config))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }
}
