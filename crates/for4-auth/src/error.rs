use for4_realtime::CallError;
use for4_state::SettingsError;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error("Failed to access the credential store: {0}")]
    Storage(#[from] SettingsError),

    #[error("No authenticated session")]
    NotAuthenticated,
}

impl SessionError {
    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Call(e) => e.user_message(),
            SessionError::Storage(_) => "Could not access local storage.".to_owned(),
            SessionError::NotAuthenticated => "You are not logged in.".to_owned(),
        }
    }
}
