use for4_auth::SessionError;
use for4_realtime::CallError;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("No authenticated session")]
    NotAuthenticated,
}

impl DashboardError {
    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::Call(e) => e.user_message(),
            DashboardError::Session(e) => e.user_message(),
            DashboardError::NotAuthenticated => "You are not logged in.".to_owned(),
        }
    }

    /// Whether the server reported the session credential as invalid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DashboardError::Call(e) if e.is_unauthorized())
    }
}
