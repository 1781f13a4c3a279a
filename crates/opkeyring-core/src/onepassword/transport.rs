//! Transport capability contracts
//!
//! Each backend binds one narrow client interface:
//!
//! - [`ConnectClientApi`]: the Connect gateway's item endpoints
//! - [`ItemsApi`]: the SDK items surface used by the desktop, service
//!   account and standard backends, built through an [`ItemsClientConnector`]
//!
//! [`ItemTransport`] is what the shared keyring logic is generic over. It
//! hands back items that already passed the managed-item predicate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::base::{ItemScope, ManagedItem};
use super::connect::ConnectItem;
use super::model::{ItemCreateParams, ItemListFilter, ItemOverview, VaultItem};
use crate::keyring::{BackendType, KeyringError, KeyringResult};

/// Failures reported by a store client
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("invalid Connect host: {0}")]
    InvalidHost(String),

    #[error("{0}")]
    Sdk(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Item endpoints of the Connect gateway
#[async_trait]
pub trait ConnectClientApi: Send + Sync {
    async fn create_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem>;

    async fn delete_item_by_id(&self, item_id: &str, vault_id: &str) -> TransportResult<()>;

    async fn get_item_by_uuid(&self, item_id: &str, vault_id: &str) -> TransportResult<ConnectItem>;

    /// Overviews of every item in the vault (no field values)
    async fn get_items(&self, vault_id: &str) -> TransportResult<Vec<ConnectItem>>;

    /// Overviews of the items with exactly this title
    async fn get_items_by_title(&self, title: &str, vault_id: &str)
        -> TransportResult<Vec<ConnectItem>>;

    async fn update_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem>;
}

#[async_trait]
impl<C: ConnectClientApi + ?Sized> ConnectClientApi for Arc<C> {
    async fn create_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem> {
        (**self).create_item(item, vault_id).await
    }

    async fn delete_item_by_id(&self, item_id: &str, vault_id: &str) -> TransportResult<()> {
        (**self).delete_item_by_id(item_id, vault_id).await
    }

    async fn get_item_by_uuid(&self, item_id: &str, vault_id: &str) -> TransportResult<ConnectItem> {
        (**self).get_item_by_uuid(item_id, vault_id).await
    }

    async fn get_items(&self, vault_id: &str) -> TransportResult<Vec<ConnectItem>> {
        (**self).get_items(vault_id).await
    }

    async fn get_items_by_title(&self, title: &str, vault_id: &str)
        -> TransportResult<Vec<ConnectItem>> {
        (**self).get_items_by_title(title, vault_id).await
    }

    async fn update_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem> {
        (**self).update_item(item, vault_id).await
    }
}

/// Items surface of the vault SDK
#[async_trait]
pub trait ItemsApi: Send + Sync {
    async fn create(&self, params: ItemCreateParams) -> TransportResult<VaultItem>;

    async fn delete(&self, vault_id: &str, item_id: &str) -> TransportResult<()>;

    async fn get(&self, vault_id: &str, item_id: &str) -> TransportResult<VaultItem>;

    async fn list(&self, vault_id: &str, filter: ItemListFilter)
        -> TransportResult<Vec<ItemOverview>>;

    async fn put(&self, item: VaultItem) -> TransportResult<VaultItem>;
}

/// How an SDK client authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum ClientAuth {
    ServiceAccountToken(String),
    /// Account name or UUID of a signed-in desktop app
    DesktopAccount(String),
}

impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientAuth::ServiceAccountToken(_) => f.write_str("ServiceAccountToken(..)"),
            ClientAuth::DesktopAccount(account) => {
                f.debug_tuple("DesktopAccount").field(account).finish()
            }
        }
    }
}

/// Identifies this crate to the vault service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Builds authenticated SDK items clients
///
/// The returned client is kept alive for as long as the keyring that asked
/// for it.
#[async_trait]
pub trait ItemsClientConnector: Send + Sync {
    async fn connect(
        &self,
        auth: ClientAuth,
        integration: IntegrationInfo,
    ) -> TransportResult<Arc<dyn ItemsApi>>;
}

/// What the shared keyring logic needs from a store
#[async_trait]
pub trait ItemTransport: Send + Sync {
    fn backend(&self) -> BackendType;

    /// Every managed item in scope, in listing order
    ///
    /// `title` is a hint a transport may use to narrow the listing; callers
    /// still filter by title themselves.
    async fn managed_items(
        &self,
        scope: &ItemScope,
        title: Option<&str>,
    ) -> KeyringResult<Vec<ManagedItem>>;

    async fn create_item(&self, scope: &ItemScope, title: &str, value: String)
        -> KeyringResult<()>;

    /// Write back an existing item, keeping its item and field ids
    async fn update_item(&self, scope: &ItemScope, item: ManagedItem) -> KeyringResult<()>;

    async fn delete_item(&self, scope: &ItemScope, item_id: &str) -> KeyringResult<()>;
}

/// Run one round trip under its own deadline
///
/// Both client failures and an expired deadline come back as
/// [`KeyringError::Transport`] carrying `context`.
pub(crate) async fn with_deadline<T, F, C>(timeout: Duration, context: C, call: F) -> KeyringResult<T>
where
    F: Future<Output = TransportResult<T>>,
    C: FnOnce() -> String,
{
    let source = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => e,
        Err(_) => TransportError::Timeout(timeout),
    };
    Err(KeyringError::Transport {
        context: context(),
        source,
    })
}

/// Wrap a client failure with the operation it interrupted
pub(crate) fn wrap<T>(result: TransportResult<T>, context: impl FnOnce() -> String) -> KeyringResult<T> {
    result.map_err(|source| KeyringError::Transport {
        context: context(),
        source,
    })
}
