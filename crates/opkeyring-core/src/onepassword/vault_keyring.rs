//! The keyring shared by every vault backend
//!
//! [`VaultKeyring`] owns the matching engine and delegates store access to an
//! [`ItemTransport`]. Backends differ only in the transport they plug in.

use async_trait::async_trait;
use chrono::Utc;

use super::base::{ItemScope, ManagedItem};
use super::transport::ItemTransport;
use crate::keyring::{Keyring, KeyringError, KeyringResult};
use crate::types::{Item, Metadata};

/// What `get_metadata` does when the key is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataPolicy {
    /// Fail with [`KeyringError::KeyNotFound`]
    Propagate,
    /// Return [`Metadata::default`]
    ZeroWhenMissing,
}

/// Key-value keyring over a vault transport
pub struct VaultKeyring<T> {
    scope: ItemScope,
    transport: T,
    metadata_policy: MetadataPolicy,
}

impl<T> VaultKeyring<T> {
    pub fn new(scope: ItemScope, transport: T, metadata_policy: MetadataPolicy) -> Self {
        Self {
            scope,
            transport,
            metadata_policy,
        }
    }

    pub fn scope(&self) -> &ItemScope {
        &self.scope
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn metadata_policy(&self) -> MetadataPolicy {
        self.metadata_policy
    }
}

impl<T: ItemTransport + 'static> VaultKeyring<T> {
    async fn find_item(&self, key: &str) -> KeyringResult<ManagedItem> {
        let title = self.scope.encode_title(key);
        let items = self
            .transport
            .managed_items(&self.scope, Some(&title))
            .await?;
        self.scope.find_by_key(items, key)
    }
}

#[async_trait]
impl<T: ItemTransport + 'static> Keyring for VaultKeyring<T> {
    fn name(&self) -> &str {
        self.transport.backend().as_str()
    }

    async fn get(&self, key: &str) -> KeyringResult<Item> {
        crate::debug_log!("{} get() key={:?}", self.name(), key);
        let item = self.find_item(key).await?;
        self.scope.deserialize_field(&item.field.value)
    }

    async fn get_metadata(&self, key: &str) -> KeyringResult<Metadata> {
        match self.find_item(key).await {
            Ok(item) => Ok(Metadata {
                modification_time: item.updated_at,
            }),
            Err(KeyringError::KeyNotFound)
                if self.metadata_policy == MetadataPolicy::ZeroWhenMissing =>
            {
                Ok(Metadata::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn set(&self, item: Item) -> KeyringResult<()> {
        let existing = match self.find_item(&item.key).await {
            Ok(existing) => Some(existing),
            Err(KeyringError::KeyNotFound) => None,
            Err(e) => {
                crate::warn_log!("{} set() lookup failed for key={:?}: {}", self.name(), item.key, e);
                return Err(e);
            }
        };

        let value = self.scope.serialize_field(&item)?;

        match existing {
            None => {
                crate::debug_log!("{} set() creating key={:?}, value len={}", self.name(), item.key, value.len());
                let title = self.scope.encode_title(&item.key);
                self.transport.create_item(&self.scope, &title, value).await
            }
            Some(mut existing) => {
                crate::debug_log!("{} set() updating key={:?}, item id={:?}", self.name(), item.key, existing.id);
                existing.field.value = value;
                existing.updated_at = Some(Utc::now());
                self.transport.update_item(&self.scope, existing).await
            }
        }
    }

    async fn remove(&self, key: &str) -> KeyringResult<()> {
        let item = self.find_item(key).await?;
        crate::debug_log!("{} remove() key={:?}, item id={:?}", self.name(), key, item.id);
        self.transport.delete_item(&self.scope, &item.id).await
    }

    async fn keys(&self) -> KeyringResult<Vec<String>> {
        let items = self.transport.managed_items(&self.scope, None).await?;
        let keys = self.scope.list_keys(&items)?;
        crate::debug_log!("{} keys() found {} keys", self.name(), keys.len());
        Ok(keys)
    }
}

impl<T> std::fmt::Debug for VaultKeyring<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKeyring")
            .field("scope", &self.scope)
            .field("metadata_policy", &self.metadata_policy)
            .finish()
    }
}
