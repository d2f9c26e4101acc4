//! Request/response exchanges of the authentication flow.

mod login;
pub use login::{Login, LoginRequest, LoginResponse};
mod password;
pub use password::{ForgotPassword, ForgotPasswordRequest, ResetPassword, ResetPasswordRequest};
mod register;
pub use register::{Register, RegisterRequest};
mod verify;
pub use verify::{TokenRequest, VerificarToken, VerifyResponse};

use serde::Deserialize;

/// Body of responses that only report an outcome.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Acknowledgement {
    /// Optional server message.
    #[serde(default)]
    pub message: Option<String>,
}
