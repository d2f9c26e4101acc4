use serde::{de::DeserializeOwned, Serialize};

/// An error resulting from operations on a repository.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    /// An internal unspecified error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A serialization or deserialization error.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// Reading or writing the backing storage failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// This trait represents a generic repository interface, capable of storing and retrieving
/// items using a key-value API.
#[async_trait::async_trait]
pub trait Repository<V: RepositoryItem>: Send + Sync {
    /// Retrieves an item from the repository by its key.
    async fn get(&self, key: String) -> Result<Option<V>, RepositoryError>;
    /// Lists all items in the repository.
    async fn list(&self) -> Result<Vec<V>, RepositoryError>;
    /// Sets an item in the repository with the specified key.
    async fn set(&self, key: String, value: V) -> Result<(), RepositoryError>;
    /// Removes an item from the repository by its key.
    async fn remove(&self, key: String) -> Result<(), RepositoryError>;
}

/// Marker for types that can be stored in a repository. Persisting repositories serialize items
/// as JSON.
pub trait RepositoryItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> RepositoryItem for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
