//! Handles for individual settings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Key;
use crate::repository::{Repository, RepositoryError};

/// Raw setting value as it is kept in the repository.
///
/// Use a [`Setting<T>`] handle for typed access instead of working with this type directly.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingItem(pub(crate) serde_json::Value);

/// A handle to a single setting value in storage.
pub struct Setting<T> {
    repository: Arc<dyn Repository<SettingItem>>,
    key: Key<T>,
}

impl<T> Clone for Setting<T> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            key: self.key,
        }
    }
}

impl<T> Setting<T> {
    /// Create a new setting handle from a repository and key.
    pub fn new(repository: Arc<dyn Repository<SettingItem>>, key: Key<T>) -> Self {
        Self { repository, key }
    }

    /// Get the current value of this setting.
    ///
    /// Returns `None` if the setting doesn't exist in storage. Fails if the stored value does
    /// not deserialize into `T`.
    pub async fn get(&self) -> Result<Option<T>, SettingsError>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.repository.get(self.key.name.to_string()).await? {
            Some(item) => Ok(Some(serde_json::from_value::<T>(item.0)?)),
            None => Ok(None),
        }
    }

    /// Update (or create) this setting with a new value.
    pub async fn update(&self, value: T) -> Result<(), SettingsError>
    where
        T: Serialize,
    {
        let item = SettingItem(serde_json::to_value(&value)?);
        self.repository.set(self.key.name.to_string(), item).await?;

        Ok(())
    }

    /// Delete this setting from storage.
    pub async fn delete(&self) -> Result<(), SettingsError> {
        self.repository.remove(self.key.name.to_string()).await?;

        Ok(())
    }
}

/// Errors that can occur when working with settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to serialize/deserialize setting value
    #[error("Failed to serialize/deserialize setting: {0}")]
    Json(#[from] serde_json::Error),
    /// Repository operation failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{register_setting_key, MemoryRepository};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    register_setting_key!(const PROFILE: Profile = "profile");
    register_setting_key!(const WRONG_TYPE: u32 = "profile");

    fn repository() -> Arc<dyn Repository<SettingItem>> {
        Arc::new(MemoryRepository::<SettingItem>::new())
    }

    #[tokio::test]
    async fn update_then_get_returns_value() {
        let setting = Setting::new(repository(), PROFILE);
        let profile = Profile {
            name: "A".to_owned(),
        };

        setting.update(profile.clone()).await.unwrap();

        assert_eq!(setting.get().await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn delete_clears_value() {
        let setting = Setting::new(repository(), PROFILE);
        setting
            .update(Profile {
                name: "A".to_owned(),
            })
            .await
            .unwrap();

        setting.delete().await.unwrap();

        assert_eq!(setting.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn mismatched_type_is_a_json_error() {
        let repository = repository();
        Setting::new(repository.clone(), PROFILE)
            .update(Profile {
                name: "A".to_owned(),
            })
            .await
            .unwrap();

        let result = Setting::new(repository, WRONG_TYPE).get().await;

        assert!(matches!(result, Err(SettingsError::Json(_))));
    }
}
