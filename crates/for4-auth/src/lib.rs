#![doc = include_str!("../README.md")]

mod credentials;
pub use credentials::CredentialStore;
mod error;
pub use error::SessionError;
pub mod exchanges;
mod session_client;
pub use session_client::{SessionClient, SessionState};
