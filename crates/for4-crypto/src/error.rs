use thiserror::Error;

/// Errors produced while sealing or opening an envelope.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The envelope was tampered with or garbled in transit. Nothing was decrypted.
    #[error("Envelope failed its integrity check: {0}")]
    Integrity(#[from] IntegrityError),

    /// The envelope is authentic but its content could not be read.
    #[error("Failed to decode envelope content: {0}")]
    Decode(#[from] DecodeError),

    /// The outbound message could not be serialized.
    #[error("Failed to serialize message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid key material")]
    InvalidKey,
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("signature does not match the ciphertext")]
    SignatureMismatch,

    #[error("envelope is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("envelope is not a valid JSON object: {0}")]
    Envelope(#[source] serde_json::Error),
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("ciphertext is malformed")]
    Ciphertext,

    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("message is not valid JSON: {0}")]
    Message(#[source] serde_json::Error),
}

pub(crate) type Result<T, E = CryptoError> = std::result::Result<T, E>;
