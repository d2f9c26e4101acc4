use std::{fmt, time::Duration};

use for4_crypto::{EnvelopeCodec, EnvelopeKey};
use serde::{Deserialize, Serialize};

/// Basic client behavior settings. These settings specify the realtime endpoint, the reconnection
/// policy, timeouts, and the secrets used to seal envelopes.
///
/// Defaults to
///
/// ```
/// # use for4_core::ClientSettings;
/// let settings = ClientSettings {
///     socket_url: "http://localhost:5000".to_string(),
///     socket_path: "/socket.io/".to_string(),
///     reconnection_attempts: 5,
///     reconnection_delay_ms: 1000,
///     connect_timeout_ms: 20000,
///     request_timeout_ms: 10000,
///     envelope_passphrase: String::new(),
///     envelope_mac_secret: String::new(),
/// };
/// let default = ClientSettings::default();
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientSettings {
    /// Base url of the realtime server. Defaults to `http://localhost:5000`
    pub socket_url: String,
    /// Path the Socket.IO server is mounted on. Defaults to `/socket.io/`
    pub socket_path: String,
    /// How many times a dropped connection is retried before the client goes offline.
    pub reconnection_attempts: u32,
    /// Fixed delay between reconnection attempts, in milliseconds.
    pub reconnection_delay_ms: u64,
    /// Upper bound for establishing a connection, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Default deadline for a request to receive its response, in milliseconds.
    pub request_timeout_ms: u64,
    /// Pre-shared passphrase the envelope encryption key is derived from.
    pub envelope_passphrase: String,
    /// Pre-shared secret envelopes are signed with.
    pub envelope_mac_secret: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            socket_url: "http://localhost:5000".into(),
            socket_path: "/socket.io/".into(),
            reconnection_attempts: 5,
            reconnection_delay_ms: 1000,
            connect_timeout_ms: 20000,
            request_timeout_ms: 10000,
            envelope_passphrase: String::new(),
            envelope_mac_secret: String::new(),
        }
    }
}

impl ClientSettings {
    #[allow(missing_docs)]
    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    #[allow(missing_docs)]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[allow(missing_docs)]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether both envelope secrets are configured.
    pub fn has_envelope_secrets(&self) -> bool {
        !self.envelope_passphrase.is_empty() && !self.envelope_mac_secret.is_empty()
    }

    /// Build the envelope codec for these settings.
    pub fn envelope_codec(&self) -> EnvelopeCodec {
        EnvelopeCodec::new(EnvelopeKey::new(
            self.envelope_passphrase.clone(),
            self.envelope_mac_secret.clone(),
        ))
    }

    /// A copy of these settings with the envelope secrets masked, for display.
    pub fn redacted(&self) -> Self {
        fn mask(secret: &str) -> String {
            if secret.is_empty() {
                String::new()
            } else {
                "********".to_owned()
            }
        }

        Self {
            envelope_passphrase: mask(&self.envelope_passphrase),
            envelope_mac_secret: mask(&self.envelope_mac_secret),
            ..self.clone()
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = self.redacted();
        f.debug_struct("ClientSettings")
            .field("socket_url", &redacted.socket_url)
            .field("socket_path", &redacted.socket_path)
            .field("reconnection_attempts", &redacted.reconnection_attempts)
            .field("reconnection_delay_ms", &redacted.reconnection_delay_ms)
            .field("connect_timeout_ms", &redacted.connect_timeout_ms)
            .field("request_timeout_ms", &redacted.request_timeout_ms)
            .field("envelope_passphrase", &redacted.envelope_passphrase)
            .field("envelope_mac_secret", &redacted.envelope_mac_secret)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{ "socketUrl": "https://rt.for4.com", "reconnectionAttempts": 2 }"#)
                .unwrap();

        assert_eq!(settings.socket_url, "https://rt.for4.com");
        assert_eq!(settings.reconnection_attempts, 2);
        assert_eq!(settings.socket_path, "/socket.io/");
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ClientSettings>(r#"{ "socketUri": "x" }"#);

        assert!(result.is_err());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let settings = ClientSettings {
            envelope_passphrase: "very-secret".to_owned(),
            envelope_mac_secret: "also-secret".to_owned(),
            ..Default::default()
        };

        let debug = format!("{settings:?}");

        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
        assert!(settings.has_envelope_secrets());
    }
}
