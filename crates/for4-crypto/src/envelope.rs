use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::Mac;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{passphrase_aes, CryptoError, DecodeError, EnvelopeKey, IntegrityError, Result};

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

/// The wire unit exchanged with the backend in both directions.
///
/// On the wire an envelope is its JSON form, base64 encoded into a single string. See
/// [`Envelope::to_wire`] and [`Envelope::from_wire`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Ciphertext in the OpenSSL `Salted__` format, base64 encoded.
    pub encrypted_message: String,
    /// Lowercase hex HMAC-SHA256 of `encrypted_message`.
    pub hmac_signature: String,
}

impl Envelope {
    /// Serialize the envelope into its transit form.
    pub fn to_wire(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(CryptoError::Encode)?;
        Ok(STANDARD.encode(json))
    }

    /// Parse an envelope from its transit form. This does not verify the signature.
    pub fn from_wire(text: &str) -> Result<Self, IntegrityError> {
        let json = STANDARD.decode(text.trim())?;
        serde_json::from_slice(&json).map_err(IntegrityError::Envelope)
    }
}

/// Seals logical messages into envelopes and opens envelopes back into messages.
///
/// The codec is cheap to clone and holds no state besides the shared key.
#[derive(Clone, Debug)]
pub struct EnvelopeCodec {
    key: Arc<EnvelopeKey>,
}

impl EnvelopeCodec {
    #[allow(missing_docs)]
    pub fn new(key: EnvelopeKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Serialize `message` to JSON, encrypt it, sign the ciphertext and return the envelope in
    /// its transit form.
    pub fn encode<T: Serialize + ?Sized>(&self, message: &T) -> Result<String> {
        self.encode_with_rng(message, rand::thread_rng())
    }

    fn encode_with_rng<T: Serialize + ?Sized>(
        &self,
        message: &T,
        rng: impl rand::RngCore + rand::CryptoRng,
    ) -> Result<String> {
        let plaintext = serde_json::to_vec(message).map_err(CryptoError::Encode)?;
        let encrypted_message = passphrase_aes::encrypt(self.key.passphrase(), &plaintext, rng)?;
        let hmac_signature = self.sign(&encrypted_message)?;

        Envelope {
            encrypted_message,
            hmac_signature,
        }
        .to_wire()
    }

    /// Open an envelope and return the message exactly as it was serialized by the sender.
    ///
    /// The signature is checked before any decryption is attempted.
    pub fn decode(&self, text: &str) -> Result<Value> {
        let envelope = Envelope::from_wire(text)?;
        self.verify(&envelope)?;

        let plaintext = passphrase_aes::decrypt(self.key.passphrase(), &envelope.encrypted_message)?;
        let plaintext = String::from_utf8(plaintext.to_vec()).map_err(DecodeError::from)?;
        let message = serde_json::from_str(&plaintext).map_err(DecodeError::Message)?;

        Ok(message)
    }

    /// Like [`EnvelopeCodec::decode`], but a message that is itself a JSON document serialized
    /// into a string is parsed one more level.
    ///
    /// Some senders stringify their payload before sealing it, so both forms occur on the wire.
    pub fn decode_unwrapped(&self, text: &str) -> Result<Value> {
        Ok(match self.decode(text)? {
            Value::String(inner) => unwrap_json_string(inner),
            message => message,
        })
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.key.mac_secret()).map_err(|_| CryptoError::InvalidKey)
    }

    fn sign(&self, encrypted_message: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(encrypted_message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, envelope: &Envelope) -> Result<()> {
        let signature = hex::decode(envelope.hmac_signature.trim())
            .map_err(|_| IntegrityError::SignatureMismatch)?;

        let mut mac = self.mac()?;
        mac.update(envelope.encrypted_message.as_bytes());
        // `verify_slice` compares in constant time
        mac.verify_slice(&signature).map_err(|_| {
            tracing::warn!("Rejected envelope with a mismatching signature");
            CryptoError::from(IntegrityError::SignatureMismatch)
        })
    }
}

fn unwrap_json_string(inner: String) -> Value {
    let trimmed = inner.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Value::String(inner);
    }
    serde_json::from_str(&inner).unwrap_or_else(|_| Value::String(inner))
}
