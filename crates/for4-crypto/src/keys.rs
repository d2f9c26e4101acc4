use std::fmt;

use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Pre-shared secrets used to seal and open envelopes.
///
/// The passphrase feeds the AES key derivation and the MAC secret signs the ciphertext. Both are
/// used as their UTF-8 bytes, which is how the backend interprets them.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey {
    passphrase: String,
    mac_secret: String,
}

impl EnvelopeKey {
    /// Create a key from the shared passphrase and MAC secret.
    pub fn new(passphrase: impl Into<String>, mac_secret: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            mac_secret: mac_secret.into(),
        }
    }

    pub(crate) fn passphrase(&self) -> &[u8] {
        self.passphrase.as_bytes()
    }

    pub(crate) fn mac_secret(&self) -> &[u8] {
        self.mac_secret.as_bytes()
    }
}

impl ConstantTimeEq for EnvelopeKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.passphrase().ct_eq(other.passphrase()) & self.mac_secret().ct_eq(other.mac_secret())
    }
}

impl PartialEq for EnvelopeKey {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

// Never print the secrets themselves
impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_does_not_leak_secrets() {
        let key = EnvelopeKey::new("passphrase-value", "mac-value");

        let debug = format!("{key:?}");

        assert!(!debug.contains("passphrase-value"));
        assert!(!debug.contains("mac-value"));
    }

    #[test]
    fn keys_compare_both_secrets() {
        let key = EnvelopeKey::new("a", "b");

        assert_eq!(key, EnvelopeKey::new("a", "b"));
        assert_ne!(key, EnvelopeKey::new("a", "c"));
        assert_ne!(key, EnvelopeKey::new("c", "b"));
    }
}
