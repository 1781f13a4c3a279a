//! Connect gateway backend
//!
//! Host and token come from the environment (or configuration) and are
//! required up front. Lookups list overviews by title, drop candidates that
//! fail the tag/category check, then hydrate the rest one by one. There is no
//! per-call deadline: the HTTP client owns the transport.

mod client;

pub use client::{ConnectClient, ConnectField, ConnectItem, ConnectVault};

use async_trait::async_trait;

use super::base::{env_non_empty, non_empty, ItemScope, ManagedItem, MANAGED_FIELD_TYPE, MANAGED_ITEM_CATEGORY};
use super::transport::{wrap, ConnectClientApi, ItemTransport};
use super::vault_keyring::{MetadataPolicy, VaultKeyring};
use crate::config::{Config, ConfigError, ConfigErrors};
use crate::keyring::{BackendType, KeyringError, KeyringResult};

/// Connect server URI
pub const ENV_CONNECT_HOST: &str = "OP_CONNECT_HOST";

/// Connect access token
pub const ENV_CONNECT_TOKEN: &str = "OP_CONNECT_TOKEN";

/// Keyring backed by a Connect gateway
pub type ConnectKeyring<C = ConnectClient> = VaultKeyring<ConnectTransport<C>>;

/// [`ItemTransport`] over a [`ConnectClientApi`]
pub struct ConnectTransport<C = ConnectClient> {
    client: C,
}

impl<C> ConnectTransport<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: ConnectClientApi> ConnectTransport<C> {
    async fn prune_and_hydrate(
        &self,
        scope: &ItemScope,
        overviews: Vec<ConnectItem>,
    ) -> KeyringResult<Vec<ManagedItem>> {
        let mut items = Vec::new();
        for overview in overviews {
            if !scope.is_candidate(
                &overview.tags,
                overview.category,
                overview.state.unwrap_or_default(),
            ) {
                continue;
            }

            let item = wrap(
                self.client
                    .get_item_by_uuid(&overview.id, scope.vault_id())
                    .await,
                || {
                    format!(
                        "Unable to get item with ID {:?} from vault with ID {:?}",
                        overview.id,
                        scope.vault_id()
                    )
                },
            )?;

            if let Some(managed) = scope.managed(item.into_vault_item()) {
                items.push(managed);
            }
        }
        Ok(items)
    }

    fn new_item(scope: &ItemScope, title: &str, value: String) -> ConnectItem {
        ConnectItem {
            title: title.to_string(),
            tags: vec![scope.tag().to_string()],
            vault: ConnectVault {
                id: scope.vault_id().to_string(),
            },
            category: MANAGED_ITEM_CATEGORY,
            fields: vec![ConnectField {
                field_type: MANAGED_FIELD_TYPE,
                label: scope.field_title().to_string(),
                value,
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

#[async_trait]
impl<C: ConnectClientApi + 'static> ItemTransport for ConnectTransport<C> {
    fn backend(&self) -> BackendType {
        BackendType::OpConnect
    }

    async fn managed_items(
        &self,
        scope: &ItemScope,
        title: Option<&str>,
    ) -> KeyringResult<Vec<ManagedItem>> {
        let overviews = match title {
            Some(title) => wrap(
                self.client
                    .get_items_by_title(title, scope.vault_id())
                    .await,
                || {
                    format!(
                        "Unable to get item overviews with title {:?} from vault with ID {:?}",
                        title,
                        scope.vault_id()
                    )
                },
            )?,
            None => wrap(self.client.get_items(scope.vault_id()).await, || {
                format!(
                    "Unable to get item overviews from vault with ID {:?}",
                    scope.vault_id()
                )
            })?,
        };

        self.prune_and_hydrate(scope, overviews).await
    }

    async fn create_item(&self, scope: &ItemScope, title: &str, value: String) -> KeyringResult<()> {
        let item = Self::new_item(scope, title, value);
        wrap(self.client.create_item(&item, scope.vault_id()).await, || {
            format!(
                "Unable to create item with title {:?} in vault with ID {:?}",
                title,
                scope.vault_id()
            )
        })?;
        Ok(())
    }

    async fn update_item(&self, scope: &ItemScope, item: ManagedItem) -> KeyringResult<()> {
        // The whole item is rewritten from our own fields, ids preserved
        let mut update = Self::new_item(scope, &item.title, item.field.value);
        update.id = item.id;
        update.fields[0].id = item.field.id;
        update.updated_at = item.updated_at;

        wrap(self.client.update_item(&update, scope.vault_id()).await, || {
            format!(
                "Unable to update item with title {:?} in vault with ID {:?}",
                update.title,
                scope.vault_id()
            )
        })?;
        Ok(())
    }

    async fn delete_item(&self, scope: &ItemScope, item_id: &str) -> KeyringResult<()> {
        wrap(
            self.client
                .delete_item_by_id(item_id, scope.vault_id())
                .await,
            || {
                format!(
                    "Unable to delete item with ID {:?} in vault with ID {:?}",
                    item_id,
                    scope.vault_id()
                )
            },
        )
    }
}

impl<C: ConnectClientApi + 'static> VaultKeyring<ConnectTransport<C>> {
    /// Keyring over an already-built Connect client
    pub fn with_connect_client(scope: ItemScope, client: C) -> Self {
        VaultKeyring::new(scope, ConnectTransport::new(client), MetadataPolicy::Propagate)
    }
}

/// Open a Connect keyring
///
/// Requires a vault id, a host and a token. The token is read from the
/// environment variable named by `op_connect_token_env`, then from
/// `OP_CONNECT_TOKEN`. Every missing value is reported at once.
pub fn new_connect_keyring(config: &Config) -> KeyringResult<ConnectKeyring> {
    let backend = BackendType::OpConnect;
    let mut errors = ConfigErrors::new();

    let scope = ItemScope::from_config(config, backend, &mut errors);

    let host = non_empty(&config.op_connect_host)
        .map(str::to_string)
        .or_else(|| env_non_empty(ENV_CONNECT_HOST));
    if host.is_none() {
        errors.push(ConfigError::EnvUnsetOrEmpty {
            backend,
            var: ENV_CONNECT_HOST.to_string(),
        });
    }

    let token = [config.op_connect_token_env.as_str(), ENV_CONNECT_TOKEN]
        .into_iter()
        .find_map(env_non_empty);
    if token.is_none() {
        errors.push(ConfigError::EnvUnsetOrEmpty {
            backend,
            var: ENV_CONNECT_TOKEN.to_string(),
        });
    }

    let (host, token) = match (host, token) {
        (Some(host), Some(token)) if errors.is_empty() => (host, token),
        _ => {
            crate::warn_log!("Connect keyring configuration rejected: {} problem(s)", errors.len());
            return Err(errors.into());
        }
    };

    let client = ConnectClient::new(&host, token)
        .map_err(|source| KeyringError::ClientInit { backend, source })?;
    crate::debug_log!("Connect keyring ready: host={}, vault={}", host, scope.vault_id());

    Ok(VaultKeyring::with_connect_client(scope, client))
}
