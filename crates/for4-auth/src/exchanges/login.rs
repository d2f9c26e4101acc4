use for4_core::Identity;
use for4_realtime::Exchange;
use serde::{Deserialize, Serialize};

/// Email and password login.
pub struct Login;

#[allow(missing_docs)]
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A successful login carries the bearer token and the user record.
#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

impl Exchange for Login {
    const NAME: &'static str = "Login";
    type Request = LoginRequest;
    type Response = LoginResponse;
}
