//! Transport whose SDK client is built on first use
//!
//! Opening a desktop or service account keyring touches neither the desktop
//! app nor the network. The first operation resolves credentials, connects,
//! and keeps the client for the life of the keyring. Concurrent first calls
//! connect once; a failed connect leaves the cell empty so the next call
//! tries again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::base::{ItemScope, ManagedItem, TokenSource};
use super::service_account::TOKEN_PROMPT;
use super::standard::StandardTransport;
use super::transport::{ClientAuth, ItemTransport, ItemsClientConnector};
use super::INTEGRATION;
use crate::keyring::{BackendType, KeyringError, KeyringResult};

/// Credentials resolved when the client is first needed
#[derive(Debug, Clone)]
pub enum LazyAuth {
    /// Account name or UUID of the signed-in desktop app
    Desktop(String),
    /// Service account token, read from the environment or prompted for
    ServiceAccount(TokenSource),
}

impl LazyAuth {
    async fn resolve(&self) -> KeyringResult<ClientAuth> {
        match self {
            LazyAuth::Desktop(account) => Ok(ClientAuth::DesktopAccount(account.clone())),
            LazyAuth::ServiceAccount(tokens) => tokens
                .resolve(TOKEN_PROMPT)
                .await
                .map(ClientAuth::ServiceAccountToken),
        }
    }
}

pub struct LazyTransport {
    backend: BackendType,
    auth: LazyAuth,
    connector: Arc<dyn ItemsClientConnector>,
    timeout: Duration,
    ready: OnceCell<StandardTransport>,
}

impl LazyTransport {
    pub fn new(
        backend: BackendType,
        auth: LazyAuth,
        connector: Arc<dyn ItemsClientConnector>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            auth,
            connector,
            timeout,
            ready: OnceCell::new(),
        }
    }

    pub fn auth(&self) -> &LazyAuth {
        &self.auth
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    /// Build the client now instead of on first use
    pub async fn initialize(&self) -> KeyringResult<()> {
        self.transport().await.map(|_| ())
    }

    async fn transport(&self) -> KeyringResult<&StandardTransport> {
        self.ready
            .get_or_try_init(|| async {
                let backend = self.backend;
                let auth = self.auth.resolve().await?;
                crate::debug_log!("Connecting {} client: {:?}", backend.as_str(), auth);

                let client = self
                    .connector
                    .connect(auth, INTEGRATION)
                    .await
                    .map_err(|source| {
                        crate::error_log!("{} client initialization failed: {}", backend.as_str(), source);
                        KeyringError::ClientInit { backend, source }
                    })?;

                Ok::<_, KeyringError>(StandardTransport::new(backend, client, self.timeout))
            })
            .await
    }
}

#[async_trait]
impl ItemTransport for LazyTransport {
    fn backend(&self) -> BackendType {
        self.backend
    }

    async fn managed_items(
        &self,
        scope: &ItemScope,
        title: Option<&str>,
    ) -> KeyringResult<Vec<ManagedItem>> {
        self.transport().await?.managed_items(scope, title).await
    }

    async fn create_item(&self, scope: &ItemScope, title: &str, value: String) -> KeyringResult<()> {
        self.transport().await?.create_item(scope, title, value).await
    }

    async fn update_item(&self, scope: &ItemScope, item: ManagedItem) -> KeyringResult<()> {
        self.transport().await?.update_item(scope, item).await
    }

    async fn delete_item(&self, scope: &ItemScope, item_id: &str) -> KeyringResult<()> {
        self.transport().await?.delete_item(scope, item_id).await
    }
}

impl std::fmt::Debug for LazyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTransport")
            .field("backend", &self.backend)
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
