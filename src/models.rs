use serde::{Deserialize, Serialize};

/// Claims carried by access tokens from the external auth provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Profile id, as a decimal string
    pub sub: String,
    pub email: String,
    /// Role looked up from the role table when the token was issued
    pub role: String,
    pub exp: usize,
}
