#![doc = include_str!("../README.md")]

mod envelope;
pub use envelope::{Envelope, EnvelopeCodec};
mod error;
pub(crate) use error::Result;
pub use error::{CryptoError, DecodeError, IntegrityError};
mod keys;
pub use keys::EnvelopeKey;
mod passphrase_aes;
