use std::time::Duration;

use for4_crypto::{CryptoError, DecodeError, IntegrityError};
use thiserror::Error;

/// Why a [`call`](crate::ConnectionManager::call) did not produce a response body.
#[derive(Debug, Error)]
pub enum CallError {
    /// There is no live connection. Nothing was sent.
    #[error("Not connected to the realtime server")]
    NotConnected,

    /// The response envelope was tampered with or garbled.
    #[error("Response failed its integrity check: {0}")]
    Integrity(#[source] IntegrityError),

    /// The response envelope was authentic but unreadable.
    #[error("Failed to decode response: {0}")]
    Decode(#[source] DecodeError),

    /// The request could not be sealed.
    #[error("Failed to seal request: {0}")]
    Codec(#[source] CryptoError),

    /// No response arrived before the deadline.
    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[allow(missing_docs)]
    #[error("The request was cancelled")]
    Cancelled,

    /// The connection manager shut down while the request was pending.
    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    /// The response event did not carry envelope text.
    #[error("Response payload is not an envelope")]
    UnexpectedPayload,

    /// The server understood the request and answered `success: false`.
    #[error("{message}")]
    LogicalFailure {
        #[allow(missing_docs)]
        message: String,
        /// The server rejected the credential the request carried.
        unauthorized: bool,
    },

    /// The response body does not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Response(#[source] serde_json::Error),
}

impl From<CryptoError> for CallError {
    fn from(value: CryptoError) -> Self {
        match value {
            CryptoError::Integrity(e) => CallError::Integrity(e),
            CryptoError::Decode(e) => CallError::Decode(e),
            other => CallError::Codec(other),
        }
    }
}

impl CallError {
    /// Text suitable for showing to the end user.
    ///
    /// Server messages are shown as they are. Transport and codec failures collapse into one
    /// generic message.
    pub fn user_message(&self) -> String {
        match self {
            CallError::LogicalFailure { message, .. } => message.clone(),
            CallError::NotConnected | CallError::ConnectionClosed => {
                "Not connected to the server. Check your connection and try again.".to_owned()
            }
            CallError::Cancelled => "The request was cancelled.".to_owned(),
            _ => "Something went wrong talking to the server. Please try again.".to_owned(),
        }
    }

    /// Whether the server reported the credential as invalid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            CallError::LogicalFailure {
                unauthorized: true,
                ..
            }
        )
    }
}
