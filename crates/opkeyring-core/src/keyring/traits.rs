//! The keyring capability contract and its error taxonomy

use async_trait::async_trait;
use thiserror::Error;

use super::backend::BackendType;
use crate::config::{ConfigError, ConfigErrors};
use crate::onepassword::TransportError;
use crate::types::{Item, Metadata};

/// Errors returned by keyring operations
#[derive(Error, Debug)]
pub enum KeyringError {
    /// One or more configuration problems, all reported together
    #[error("{0}")]
    Config(#[from] ConfigErrors),

    #[error("The specified item could not be found in the keyring")]
    KeyNotFound,

    #[error("Found multiple matching items: matched {count} items with title {title:?} in vault with ID {vault_id:?}")]
    AmbiguousMatch {
        count: usize,
        title: String,
        vault_id: String,
    },

    #[error("Found duplicate item title in vault with ID {vault_id:?}: {titles:?}")]
    DuplicateTitle {
        titles: Vec<String>,
        vault_id: String,
    },

    /// A store round trip failed; `context` names the operation and its target
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: TransportError,
    },

    #[error("Unable to create a {backend} client: {source}")]
    ClientInit {
        backend: BackendType,
        #[source]
        source: TransportError,
    },

    #[error("Token prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("Unable to decode item field value: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Unable to encode item field value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Unsupported keyring backend: {0}")]
    UnsupportedBackend(String),
}

impl From<ConfigError> for KeyringError {
    fn from(error: ConfigError) -> Self {
        KeyringError::Config(error.into())
    }
}

impl KeyringError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KeyringError::KeyNotFound)
    }
}

pub type KeyringResult<T> = Result<T, KeyringError>;

/// Uniform key-value contract implemented by every backend
///
/// No implementation caches between calls: each operation re-reads the
/// underlying store.
#[async_trait]
pub trait Keyring: Send + Sync {
    /// Backend identifier, e.g. `op-connect`
    fn name(&self) -> &str;

    /// Retrieve the item stored under `key`
    async fn get(&self, key: &str) -> KeyringResult<Item>;

    /// Best-effort metadata for `key`
    async fn get_metadata(&self, key: &str) -> KeyringResult<Metadata>;

    /// Create or replace the item stored under `item.key`
    async fn set(&self, item: Item) -> KeyringResult<()>;

    /// Delete the item stored under `key`
    ///
    /// Fails with [`KeyringError::KeyNotFound`] when there is nothing to delete.
    async fn remove(&self, key: &str) -> KeyringResult<()>;

    /// Every key in the keyring, in the store's listing order
    async fn keys(&self) -> KeyringResult<Vec<String>>;

    /// Check if a key exists
    async fn has(&self, key: &str) -> KeyringResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(KeyringError::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
