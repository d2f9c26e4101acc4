use for4_core::Identity;
use for4_realtime::Exchange;
use serde::{Deserialize, Serialize};

/// Check that a stored token is still valid.
pub struct VerificarToken;

/// Body of every request authorized by the bearer token alone.
#[derive(Clone, Serialize)]
pub struct TokenRequest {
    #[allow(missing_docs)]
    pub token: String,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest").finish_non_exhaustive()
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub user: Identity,
}

impl Exchange for VerificarToken {
    const NAME: &'static str = "VerificarToken";
    type Request = TokenRequest;
    type Response = VerifyResponse;
}
