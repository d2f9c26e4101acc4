use for4_realtime::Exchange;
use serde::Serialize;

use super::Acknowledgement;

/// Request a password recovery email.
pub struct ForgotPassword;

#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl Exchange for ForgotPassword {
    const NAME: &'static str = "ForgotPassword";
    type Request = ForgotPasswordRequest;
    type Response = Acknowledgement;
}

/// Set a new password using the token from the recovery email.
pub struct ResetPassword;

#[allow(missing_docs)]
#[derive(Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

impl std::fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetPasswordRequest").finish_non_exhaustive()
    }
}

impl Exchange for ResetPassword {
    const NAME: &'static str = "ResetPassword";
    type Request = ResetPasswordRequest;
    type Response = Acknowledgement;
}
