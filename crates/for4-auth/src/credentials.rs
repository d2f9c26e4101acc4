use std::sync::Arc;

use for4_core::Identity;
use for4_state::{register_setting_key, repository::Repository, Setting, SettingItem, SettingsError};

register_setting_key!(const TOKEN: String = "token");
register_setting_key!(const USER: Identity = "user");

/// Persisted bearer token and cached identity.
///
/// The two are always written and cleared together.
#[derive(Clone)]
pub struct CredentialStore {
    token: Setting<String>,
    user: Setting<Identity>,
}

impl CredentialStore {
    #[allow(missing_docs)]
    pub fn new(repository: Arc<dyn Repository<SettingItem>>) -> Self {
        Self {
            token: Setting::new(repository.clone(), TOKEN),
            user: Setting::new(repository, USER),
        }
    }

    #[allow(missing_docs)]
    pub async fn token(&self) -> Result<Option<String>, SettingsError> {
        self.token.get().await
    }

    /// The identity cached with the token. A cached record that no longer parses reads as absent.
    pub async fn user(&self) -> Result<Option<Identity>, SettingsError> {
        match self.user.get().await {
            Ok(user) => Ok(user),
            Err(SettingsError::Json(e)) => {
                tracing::warn!("Ignoring unreadable cached user: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist both. If the user can't be written the token is removed again.
    pub async fn save(&self, token: &str, user: &Identity) -> Result<(), SettingsError> {
        self.token.update(token.to_owned()).await?;
        if let Err(e) = self.user.update(user.clone()).await {
            if let Err(rollback) = self.token.delete().await {
                tracing::warn!("Failed to remove token after a partial save: {}", rollback);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove both. Both deletes are attempted, the first failure is returned.
    pub async fn clear(&self) -> Result<(), SettingsError> {
        let token = self.token.delete().await;
        let user = self.user.delete().await;
        token.and(user)
    }
}
