use std::{
    collections::BTreeMap,
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use tokio::sync::Mutex;
use tracing::debug;

use crate::repository::{Repository, RepositoryError, RepositoryItem};

/// A repository persisted as a single JSON object in a file.
///
/// The whole file is rewritten on every change, which is fine for the handful of entries the
/// client keeps. Writes go to a sibling temporary file that is renamed over the original, and on
/// Unix the file is restricted to its owner since it contains the session credential.
#[derive(Debug)]
pub struct JsonFileRepository<V> {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
    _item: PhantomData<fn() -> V>,
}

impl<V: RepositoryItem> JsonFileRepository<V> {
    /// Create a repository backed by `path`. The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _item: PhantomData,
        }
    }

    #[allow(missing_docs)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, V>, RepositoryError> {
        match tokio::fs::read(&self.path).await {
            Ok(contents) if contents.is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_slice(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, items: &BTreeMap<String, V>) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_vec_pretty(items)?;
        let temporary = self.path.with_extension("tmp");
        tokio::fs::write(&temporary, contents).await?;
        restrict_permissions(&temporary).await?;
        tokio::fs::rename(&temporary, &self.path).await?;

        debug!(path = %self.path.display(), "State file written");
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), RepositoryError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), RepositoryError> {
    Ok(())
}

#[async_trait::async_trait]
impl<V: RepositoryItem> Repository<V> for JsonFileRepository<V> {
    async fn get(&self, key: String) -> Result<Option<V>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&key))
    }

    async fn list(&self) -> Result<Vec<V>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }

    async fn set(&self, key: String, value: V) -> Result<(), RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        items.insert(key, value);
        self.store(&items).await
    }

    async fn remove(&self, key: String) -> Result<(), RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        if items.remove(&key).is_some() {
            self.store(&items).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repository = JsonFileRepository::<Value>::new(dir.path().join("state.json"));

        assert_eq!(repository.get("token".to_owned()).await.unwrap(), None);
        assert!(repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let repository = JsonFileRepository::<Value>::new(&path);
        repository
            .set("user".to_owned(), json!({ "name": "A" }))
            .await
            .unwrap();
        drop(repository);

        let reopened = JsonFileRepository::<Value>::new(&path);
        assert_eq!(
            reopened.get("user".to_owned()).await.unwrap(),
            Some(json!({ "name": "A" }))
        );
    }

    #[tokio::test]
    async fn remove_deletes_only_the_given_key() {
        let dir = tempfile::tempdir().unwrap();
        let repository = JsonFileRepository::<Value>::new(dir.path().join("state.json"));
        repository.set("token".to_owned(), json!("T")).await.unwrap();
        repository.set("other".to_owned(), json!(1)).await.unwrap();

        repository.remove("token".to_owned()).await.unwrap();

        assert_eq!(repository.get("token".to_owned()).await.unwrap(), None);
        assert_eq!(repository.get("other".to_owned()).await.unwrap(), Some(json!(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let repository = JsonFileRepository::<Value>::new(dir.path().join("state.json"));
        repository.set("token".to_owned(), json!("T")).await.unwrap();

        let mode = std::fs::metadata(repository.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
