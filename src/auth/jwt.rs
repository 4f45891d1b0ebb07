use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::models::Claims;

/// Tokens are issued by the external auth provider; this service only verifies them.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
pub(crate) fn issue_test_token(profile_id: u64, role: &str, secret: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let exp = chrono::Utc::now().timestamp() as usize + 600;
    let claims = Claims {
        sub: profile_id.to_string(),
        email: format!("user{profile_id}@company.com"),
        role: role.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("test token encodes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_token_signed_with_same_secret() {
        let token = issue_test_token(12, "manager", "s3cret");
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, "12");
        assert_eq!(claims.role, "manager");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = issue_test_token(12, "manager", "s3cret");
        assert!(verify_token(&token, "other").is_err());
    }
}
