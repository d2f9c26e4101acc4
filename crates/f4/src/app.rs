use std::sync::Arc;

use color_eyre::eyre::{bail, eyre, Result};
use for4_auth::SessionClient;
use for4_core::{ClientSettings, Notifier};
use for4_realtime::{ConnectionManager, SocketIoTransport};
use for4_state::JsonFileRepository;

use crate::config::CliConfig;

/// A session client backed by the websocket transport and the state file.
pub(crate) struct App {
    pub settings: ClientSettings,
    pub session: SessionClient,
}

impl App {
    pub fn open(
        config: &CliConfig,
        socket_url: Option<&str>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let settings = config.load_settings(socket_url)?;
        if !settings.has_envelope_secrets() {
            bail!("Envelope secrets are not configured. Run `f4 config secrets` first.");
        }

        let transport = SocketIoTransport::from_settings(&settings)?;
        let session = SessionClient::new(
            &settings,
            Arc::new(transport),
            Arc::new(JsonFileRepository::new(config.state_path())),
            notifier,
        );
        Ok(Self { settings, session })
    }

    /// Check the saved login and wait for the session connection.
    pub async fn connect(&self) -> Result<ConnectionManager> {
        self.session.initialize().await?;
        if !self.session.is_authenticated() {
            bail!("You are not logged in. Run `f4 login` first.");
        }

        self.session
            .wait_for_connection(self.settings.connect_timeout())
            .await
            .ok_or_else(|| eyre!("Could not reach {}", self.settings.socket_url))
    }
}

#[cfg(test)]
mod tests {
    use for4_core::{ChannelNotifier, Notification};

    use super::*;

    fn configured(dir: &std::path::Path) -> CliConfig {
        let config = CliConfig::new(dir);
        config
            .save_settings(&ClientSettings {
                envelope_passphrase: "p".to_owned(),
                envelope_mac_secret: "m".to_owned(),
                ..Default::default()
            })
            .unwrap();
        config
    }

    #[tokio::test]
    async fn session_notices_reach_the_given_notifier() {
        let dir = tempfile::tempdir().unwrap();
        let notices = ChannelNotifier::default();
        let mut received = notices.subscribe();

        let app = App::open(&configured(dir.path()), None, Arc::new(notices.clone())).unwrap();
        app.session.notifier().notify(Notification::success("Logged out."));

        assert_eq!(received.recv().await.unwrap().message, "Logged out.");
    }

    #[test]
    fn opening_without_secrets_fails() {
        let dir = tempfile::tempdir().unwrap();

        let notifier = Arc::new(ChannelNotifier::default());
        let result = App::open(&CliConfig::new(dir.path()), None, notifier);

        assert!(result.is_err());
    }
}
