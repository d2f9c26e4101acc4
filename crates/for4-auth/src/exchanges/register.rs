use for4_realtime::Exchange;
use serde::Serialize;
use serde_json::{Map, Value};

use super::Acknowledgement;

/// Account creation. The new account has to log in afterwards.
pub struct Register;

#[allow(missing_docs)]
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Additional sign up fields, sent as they are.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Exchange for Register {
    const NAME: &'static str = "Register";
    type Request = RegisterRequest;
    type Response = Acknowledgement;
}
