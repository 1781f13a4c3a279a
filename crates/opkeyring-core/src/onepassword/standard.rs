//! SDK-backed transport and the eagerly connected standard backend
//!
//! [`StandardTransport`] drives an [`ItemsApi`] client: list active items,
//! pre-filter on tag and category, then hydrate each candidate. Every round
//! trip runs under the configured deadline. The desktop and service account
//! backends reuse it behind a lazily built client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::base::{check_timeout, ItemScope, ManagedItem, TokenSource, MANAGED_FIELD_TYPE, MANAGED_ITEM_CATEGORY};
use super::model::{ItemCreateParams, ItemField, ItemListFilter};
use super::service_account::{token_source, TOKEN_PROMPT};
use super::transport::{with_deadline, ClientAuth, ItemTransport, ItemsApi, ItemsClientConnector};
use super::vault_keyring::{MetadataPolicy, VaultKeyring};
use super::INTEGRATION;
use crate::config::{Config, ConfigError, ConfigErrors};
use crate::keyring::{BackendType, KeyringError, KeyringResult};

/// Keyring over an already connected SDK client
pub type StandardKeyring = VaultKeyring<StandardTransport>;

/// [`ItemTransport`] over an SDK items client
#[derive(Clone)]
pub struct StandardTransport {
    backend: BackendType,
    client: Arc<dyn ItemsApi>,
    timeout: Duration,
}

impl StandardTransport {
    pub fn new(backend: BackendType, client: Arc<dyn ItemsApi>, timeout: Duration) -> Self {
        Self {
            backend,
            client,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn client(&self) -> &Arc<dyn ItemsApi> {
        &self.client
    }
}

#[async_trait]
impl ItemTransport for StandardTransport {
    fn backend(&self) -> BackendType {
        self.backend
    }

    /// The SDK has no title filter, so `title` is not used here
    async fn managed_items(
        &self,
        scope: &ItemScope,
        _title: Option<&str>,
    ) -> KeyringResult<Vec<ManagedItem>> {
        let overviews = with_deadline(
            self.timeout,
            || format!("Unable to list items in vault with ID {:?}", scope.vault_id()),
            self.client
                .list(scope.vault_id(), ItemListFilter::active_only()),
        )
        .await?;

        let mut items = Vec::new();
        for overview in overviews {
            if !scope.is_candidate(&overview.tags, overview.category, overview.state) {
                continue;
            }

            let item = with_deadline(
                self.timeout,
                || {
                    format!(
                        "Unable to get item with ID {:?} from vault with ID {:?}",
                        overview.id,
                        scope.vault_id()
                    )
                },
                self.client.get(scope.vault_id(), &overview.id),
            )
            .await?;

            if let Some(managed) = scope.managed(item) {
                items.push(managed);
            }
        }
        Ok(items)
    }

    async fn create_item(&self, scope: &ItemScope, title: &str, value: String) -> KeyringResult<()> {
        let params = ItemCreateParams {
            category: MANAGED_ITEM_CATEGORY,
            vault_id: scope.vault_id().to_string(),
            title: title.to_string(),
            fields: vec![ItemField {
                title: scope.field_title().to_string(),
                field_type: MANAGED_FIELD_TYPE,
                value,
                ..Default::default()
            }],
            tags: vec![scope.tag().to_string()],
        };

        with_deadline(
            self.timeout,
            || {
                format!(
                    "Unable to create item with title {:?} in vault with ID {:?}",
                    title,
                    scope.vault_id()
                )
            },
            self.client.create(params),
        )
        .await?;
        Ok(())
    }

    async fn update_item(&self, scope: &ItemScope, item: ManagedItem) -> KeyringResult<()> {
        let title = item.title.clone();
        with_deadline(
            self.timeout,
            || {
                format!(
                    "Unable to update item with title {:?} in vault with ID {:?}",
                    title,
                    scope.vault_id()
                )
            },
            self.client.put(item.into_vault_item()),
        )
        .await?;
        Ok(())
    }

    async fn delete_item(&self, scope: &ItemScope, item_id: &str) -> KeyringResult<()> {
        with_deadline(
            self.timeout,
            || {
                format!(
                    "Unable to delete item with ID {:?} in vault with ID {:?}",
                    item_id,
                    scope.vault_id()
                )
            },
            self.client.delete(scope.vault_id(), item_id),
        )
        .await
    }
}

impl std::fmt::Debug for StandardTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardTransport")
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Connector from config, or record that it is missing
pub(crate) fn connector_from_config(
    config: &Config,
    backend: BackendType,
    errors: &mut ConfigErrors,
) -> Option<Arc<dyn ItemsClientConnector>> {
    let connector = config.op_client_connector.clone();
    if connector.is_none() {
        errors.push(ConfigError::ConnectorMissing { backend });
    }
    connector
}

/// Open a standard keyring, authenticating immediately
///
/// Token resolution follows the service account rules. A token that cannot be
/// obtained is reported with the other configuration problems. A client that
/// cannot be built fails the open with [`KeyringError::ClientInit`].
pub async fn new_standard_keyring(config: &Config) -> KeyringResult<StandardKeyring> {
    let backend = BackendType::OpStandard;
    let mut errors = ConfigErrors::new();

    check_timeout(config, backend, &mut errors);
    let scope = ItemScope::from_config(config, backend, &mut errors);
    let connector = connector_from_config(config, backend, &mut errors);
    let tokens: TokenSource = token_source(config, backend);
    if !tokens.is_available() {
        errors.push(ConfigError::TokenFuncMissing { backend });
    }

    let connector = match connector {
        Some(connector) if errors.is_empty() => connector,
        _ => {
            crate::warn_log!("Standard keyring configuration rejected: {} problem(s)", errors.len());
            return Err(errors.into());
        }
    };

    let token = tokens.resolve(TOKEN_PROMPT).await?;

    let client = connector
        .connect(ClientAuth::ServiceAccountToken(token), INTEGRATION)
        .await
        .map_err(|source| {
            crate::error_log!("Standard keyring client initialization failed: {}", source);
            KeyringError::ClientInit { backend, source }
        })?;
    crate::debug_log!("Standard keyring ready: vault={}", scope.vault_id());

    Ok(VaultKeyring::new(
        scope,
        StandardTransport::new(backend, client, config.op_timeout),
        MetadataPolicy::ZeroWhenMissing,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::Keyring;
    use crate::onepassword::mock::{MockConnector, MockVault, VaultCall};
    use crate::onepassword::model::{FieldType, ItemCategory, ItemState, VaultItem};
    use crate::onepassword::TransportError;
    use crate::types::{Item, Metadata};
    use chrono::{TimeZone, Utc};

    const TIMEOUT: Duration = Duration::from_secs(15);

    fn scope() -> ItemScope {
        ItemScope::new("vaultID", "itemTitlePrefix", "itemTag", "itemFieldTitle")
    }

    fn keyring(vault: &Arc<MockVault>) -> StandardKeyring {
        VaultKeyring::new(
            scope(),
            StandardTransport::new(BackendType::OpStandard, Arc::clone(vault) as Arc<dyn ItemsApi>, TIMEOUT),
            MetadataPolicy::ZeroWhenMissing,
        )
    }

    fn stored_item(id: &str, key: &str, data: &[u8]) -> VaultItem {
        VaultItem {
            id: id.to_string(),
            title: scope().encode_title(key),
            category: ItemCategory::ApiCredentials,
            vault_id: "vaultID".to_string(),
            tags: vec!["itemTag".to_string()],
            fields: vec![ItemField {
                id: format!("{}-field", id),
                title: "itemFieldTitle".to_string(),
                field_type: FieldType::Concealed,
                value: scope().serialize_field(&Item::new(key, data.to_vec())).unwrap(),
            }],
            state: ItemState::Active,
            updated_at: Some(Utc.with_ymd_and_hms(2015, 10, 21, 16, 29, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let vault = Arc::new(MockVault::new());
        let keyring = keyring(&vault);

        let item = Item::new("k", b"binary\x00\xff".to_vec());
        keyring.set(item.clone()).await.unwrap();
        assert_eq!(keyring.get("k").await.unwrap(), item);
        assert!(keyring.has("k").await.unwrap());
        assert!(!keyring.has("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let vault = Arc::new(MockVault::new());
        let keyring = keyring(&vault);

        keyring.set(Item::new("k", b"v".to_vec())).await.unwrap();
        keyring.set(Item::new("k", b"v".to_vec())).await.unwrap();

        let items = vault.items();
        assert_eq!(items.len(), 1);
        assert_eq!(keyring.keys().await.unwrap(), vec!["k"]);
        assert_eq!(vault.call_count(VaultCall::Create), 1);
        assert_eq!(vault.call_count(VaultCall::Update), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_ids() {
        let vault = Arc::new(MockVault::with_items(vec![stored_item("itemID", "k", b"old")]));
        let keyring = keyring(&vault);

        keyring.set(Item::new("k", b"new".to_vec())).await.unwrap();
        let items = vault.items();
        assert_eq!(items[0].id, "itemID");
        assert_eq!(items[0].fields[0].id, "itemID-field");
        assert_eq!(keyring.get("k").await.unwrap().data, b"new");
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp() {
        let seeded = Utc.with_ymd_and_hms(2015, 10, 21, 16, 29, 0).unwrap();
        let vault = Arc::new(MockVault::with_items(vec![stored_item("itemID", "k", b"v")]));
        let keyring = keyring(&vault);

        keyring.set(Item::new("k", b"v".to_vec())).await.unwrap();
        let updated = vault.items()[0].updated_at.unwrap();
        assert!(updated > seeded);
        assert_eq!(
            keyring.get_metadata("k").await.unwrap().modification_time,
            Some(updated)
        );
    }

    #[tokio::test]
    async fn test_not_found_does_not_mutate() {
        let vault = Arc::new(MockVault::with_items(vec![stored_item("1", "present", b"x")]));
        let keyring = keyring(&vault);

        assert!(keyring.get("absent").await.unwrap_err().is_not_found());
        assert!(keyring.remove("absent").await.unwrap_err().is_not_found());
        assert_eq!(vault.items().len(), 1);
        assert_eq!(vault.call_count(VaultCall::Create), 0);
        assert_eq!(vault.call_count(VaultCall::Update), 0);
        assert_eq!(vault.call_count(VaultCall::Delete), 0);
    }

    #[tokio::test]
    async fn test_filters_unmanaged_items() {
        let mut archived = stored_item("1", "k", b"x");
        archived.state = ItemState::Archived;
        let mut login = stored_item("2", "k", b"x");
        login.category = ItemCategory::Login;
        let mut untagged = stored_item("3", "k", b"x");
        untagged.tags.clear();
        let mut two_fields = stored_item("4", "k", b"x");
        two_fields.fields.push(two_fields.fields[0].clone());
        let mut plain_text = stored_item("5", "k", b"x");
        plain_text.fields[0].field_type = FieldType::Text;
        let mut other_vault = stored_item("6", "k", b"x");
        other_vault.vault_id = "elsewhere".to_string();

        let vault = Arc::new(MockVault::with_items(vec![
            archived,
            login,
            untagged,
            two_fields,
            plain_text,
            other_vault,
        ]));
        let keyring = keyring(&vault);

        assert!(keyring.get("k").await.unwrap_err().is_not_found());
        assert!(keyring.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_match() {
        let vault = Arc::new(MockVault::with_items(vec![
            stored_item("1", "k", b"x"),
            stored_item("2", "k", b"y"),
        ]));
        let keyring = keyring(&vault);

        for result in [
            keyring.get("k").await.map(|_| ()),
            keyring.remove("k").await,
            keyring.set(Item::new("k", b"z".to_vec())).await,
        ] {
            assert!(matches!(
                result,
                Err(KeyringError::AmbiguousMatch { count: 2, .. })
            ));
        }
        assert_eq!(vault.items().len(), 2);
    }

    #[tokio::test]
    async fn test_keys_duplicate_title() {
        let vault = Arc::new(MockVault::with_items(vec![
            stored_item("1", "a", b"x"),
            stored_item("2", "b", b"x"),
            stored_item("3", "a", b"y"),
        ]));
        match keyring(&vault).keys().await {
            Err(KeyringError::DuplicateTitle { titles, vault_id }) => {
                assert_eq!(titles, vec!["itemTitlePrefix: a"]);
                assert_eq!(vault_id, "vaultID");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_metadata_zero_when_missing() {
        let vault = Arc::new(MockVault::with_items(vec![stored_item("1", "k", b"x")]));
        let keyring = keyring(&vault);

        assert_eq!(keyring.get_metadata("absent").await.unwrap(), Metadata::default());
        assert_eq!(
            keyring.get_metadata("k").await.unwrap().modification_time,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 16, 29, 0).unwrap())
        );

        // Only a missing key is masked
        vault.fail_with("vault locked");
        assert!(matches!(
            keyring.get_metadata("k").await,
            Err(KeyringError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_scenario() {
        let vault = Arc::new(MockVault::new());
        let keyring = VaultKeyring::new(
            ItemScope::new("vaultID", "kr", "keyring", "keyring"),
            StandardTransport::new(BackendType::OpStandard, Arc::clone(&vault) as Arc<dyn ItemsApi>, TIMEOUT),
            MetadataPolicy::ZeroWhenMissing,
        );

        assert!(keyring.keys().await.unwrap().is_empty());

        keyring.set(Item::new("a", b"1".to_vec())).await.unwrap();
        keyring.set(Item::new("b", b"2".to_vec())).await.unwrap();
        assert_eq!(keyring.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(vault.items()[0].title, "kr: a");

        keyring.set(Item::new("a", b"3".to_vec())).await.unwrap();
        assert_eq!(keyring.get("a").await.unwrap().data, b"3");
        assert_eq!(keyring.keys().await.unwrap(), vec!["a", "b"]);

        keyring.remove("a").await.unwrap();
        assert_eq!(keyring.keys().await.unwrap(), vec!["b"]);
        assert!(keyring.get("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_round_trip_has_a_deadline() {
        let vault = Arc::new(MockVault::with_items(vec![stored_item("1", "k", b"x")]));
        vault.set_delay(Some(Duration::from_secs(20)));
        let keyring = keyring(&vault);

        match keyring.get("k").await {
            Err(KeyringError::Transport { context, source }) => {
                assert!(context.starts_with("Unable to list items"));
                assert!(matches!(source, TransportError::Timeout(d) if d == TIMEOUT));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // Under the deadline each call succeeds even though the total exceeds it
        vault.set_delay(Some(Duration::from_secs(10)));
        assert_eq!(keyring.get("k").await.unwrap().data, b"x");
    }

    #[tokio::test]
    async fn test_new_standard_keyring() {
        std::env::set_var("OPKEYRING_TEST_STANDARD_TOKEN", "ops_token");
        let vault = Arc::new(MockVault::new());
        let connector = Arc::new(MockConnector::new(Arc::clone(&vault)));
        let config = Config::new()
            .with_vault_id("vault")
            .with_timeout(TIMEOUT)
            .with_token_env("OPKEYRING_TEST_STANDARD_TOKEN")
            .with_client_connector(connector.clone());

        let keyring = new_standard_keyring(&config).await.unwrap();
        assert_eq!(keyring.name(), "op-standard");
        assert_eq!(keyring.metadata_policy(), MetadataPolicy::ZeroWhenMissing);
        // Connected eagerly, once
        assert_eq!(connector.connect_count(), 1);
        let (auth, integration) = connector.connects().remove(0);
        assert_eq!(auth, ClientAuth::ServiceAccountToken("ops_token".to_string()));
        assert_eq!(integration, INTEGRATION);

        keyring.set(Item::new("k", b"v".to_vec())).await.unwrap();
        assert_eq!(vault.items()[0].vault_id, "vault");
        assert_eq!(connector.connect_count(), 1);
        std::env::remove_var("OPKEYRING_TEST_STANDARD_TOKEN");
    }

    #[tokio::test]
    async fn test_new_standard_keyring_aggregates_errors() {
        use crate::onepassword::base::env_non_empty;
        use crate::onepassword::{ENV_SERVICE_ACCOUNT_TOKEN, ENV_VAULT_ID};

        if env_non_empty(ENV_VAULT_ID).is_some() || env_non_empty(ENV_SERVICE_ACCOUNT_TOKEN).is_some() {
            return;
        }
        match new_standard_keyring(&Config::new()).await {
            Err(KeyringError::Config(errors)) => {
                assert_eq!(errors.len(), 4);
                let kinds: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
                assert!(kinds[0].contains("timeout must be a non-zero duration"));
                assert!(kinds[1].contains("\"OP_VAULT_ID\""));
                assert!(kinds[2].contains("no items client connector"));
                assert!(kinds[3].contains("token function is nil"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_new_standard_keyring_missing_token_is_a_config_error() {
        if crate::onepassword::base::env_non_empty(crate::onepassword::ENV_SERVICE_ACCOUNT_TOKEN).is_some() {
            return;
        }
        let connector = Arc::new(MockConnector::new(Arc::new(MockVault::new())));
        let config = Config::new()
            .with_vault_id("vault")
            .with_timeout(TIMEOUT)
            .with_token_env("OPKEYRING_TEST_STANDARD_TOKEN_MISSING")
            .with_client_connector(connector.clone());

        match new_standard_keyring(&config).await {
            Err(KeyringError::Config(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors.to_string().contains("token function is nil"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_new_standard_keyring_client_failure() {
        let connector = Arc::new(MockConnector::new(Arc::new(MockVault::new())));
        connector.fail_with("invalid token");
        let config = Config::new()
            .with_vault_id("vault")
            .with_timeout(TIMEOUT)
            .with_token_env("OPKEYRING_TEST_STANDARD_UNSET")
            .with_token_func(|_| Ok("prompted".to_string()))
            .with_client_connector(connector);

        assert!(matches!(
            new_standard_keyring(&config).await,
            Err(KeyringError::ClientInit {
                backend: BackendType::OpStandard,
                ..
            })
        ));
    }
}
