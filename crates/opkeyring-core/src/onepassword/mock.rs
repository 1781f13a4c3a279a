//! In-memory vault for testing
//!
//! [`MockVault`] serves both client surfaces ([`ItemsApi`] and
//! [`ConnectClientApi`]) from one item list, counts every call, and can be
//! told to fail or stall. [`MockConnector`] hands out a shared vault and
//! records how it was asked to authenticate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::connect::ConnectItem;
use super::model::{ItemCreateParams, ItemField, ItemListFilter, ItemOverview, ItemState, VaultItem};
use super::transport::{
    ClientAuth, ConnectClientApi, IntegrationInfo, ItemsApi, ItemsClientConnector, TransportError,
    TransportResult,
};

/// Calls counted by [`MockVault`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultCall {
    List,
    ListByTitle,
    Get,
    Create,
    Update,
    Delete,
}

/// Vault held in memory
#[derive(Default)]
pub struct MockVault {
    items: RwLock<Vec<VaultItem>>,
    next_id: AtomicU64,
    calls: Mutex<HashMap<VaultCall, usize>>,
    delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<String>>,
}

impl MockVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vault pre-populated with `items`, stored as given
    pub fn with_items(items: Vec<VaultItem>) -> Self {
        let vault = Self::new();
        *vault.items.write() = items;
        vault
    }

    /// Snapshot of the stored items
    pub fn items(&self) -> Vec<VaultItem> {
        self.items.read().clone()
    }

    pub fn insert(&self, item: VaultItem) {
        self.items.write().push(item);
    }

    pub fn call_count(&self, call: VaultCall) -> usize {
        self.calls.lock().get(&call).copied().unwrap_or(0)
    }

    /// Stall every call for `delay` before answering
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Fail every call with `message` until [`MockVault::recover`]
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    async fn enter(&self, call: VaultCall) -> TransportResult<()> {
        *self.calls.lock().entry(call).or_insert(0) += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failure.lock().clone() {
            Some(message) => Err(TransportError::Sdk(message)),
            None => Ok(()),
        }
    }

    fn generate_id(&self) -> String {
        format!("mock-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn assign_field_ids(&self, fields: &mut [ItemField]) {
        for field in fields.iter_mut().filter(|f| f.id.is_empty()) {
            field.id = self.generate_id();
        }
    }

    fn not_found(item_id: &str) -> TransportError {
        TransportError::Status {
            status: 404,
            message: format!("item {:?} not found", item_id),
        }
    }

    fn find(&self, vault_id: &str, item_id: &str) -> TransportResult<VaultItem> {
        self.items
            .read()
            .iter()
            .find(|i| i.vault_id == vault_id && i.id == item_id)
            .cloned()
            .ok_or_else(|| Self::not_found(item_id))
    }

    fn store_new(&self, mut item: VaultItem) -> VaultItem {
        item.id = self.generate_id();
        self.assign_field_ids(&mut item.fields);
        item.state = ItemState::Active;
        item.updated_at = Some(Utc::now());
        self.items.write().push(item.clone());
        item
    }

    /// Stores the item as sent, `updated_at` included
    fn replace(&self, mut item: VaultItem) -> TransportResult<VaultItem> {
        self.assign_field_ids(&mut item.fields);

        let mut items = self.items.write();
        let slot = items
            .iter_mut()
            .find(|i| i.vault_id == item.vault_id && i.id == item.id)
            .ok_or_else(|| Self::not_found(&item.id))?;
        *slot = item.clone();
        Ok(item)
    }

    fn take(&self, vault_id: &str, item_id: &str) -> TransportResult<()> {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|i| !(i.vault_id == vault_id && i.id == item_id));
        if items.len() == before {
            return Err(Self::not_found(item_id));
        }
        Ok(())
    }

    fn connect_overviews(&self, vault_id: &str, title: Option<&str>) -> Vec<ConnectItem> {
        self.items
            .read()
            .iter()
            .filter(|i| i.vault_id == vault_id)
            .filter(|i| title.map_or(true, |t| i.title == t))
            .map(|i| {
                let mut overview = ConnectItem::from_vault_item(i);
                overview.fields.clear();
                overview
            })
            .collect()
    }
}

#[async_trait]
impl ItemsApi for MockVault {
    async fn create(&self, params: ItemCreateParams) -> TransportResult<VaultItem> {
        self.enter(VaultCall::Create).await?;
        Ok(self.store_new(VaultItem {
            title: params.title,
            category: params.category,
            vault_id: params.vault_id,
            tags: params.tags,
            fields: params.fields,
            ..Default::default()
        }))
    }

    async fn delete(&self, vault_id: &str, item_id: &str) -> TransportResult<()> {
        self.enter(VaultCall::Delete).await?;
        self.take(vault_id, item_id)
    }

    async fn get(&self, vault_id: &str, item_id: &str) -> TransportResult<VaultItem> {
        self.enter(VaultCall::Get).await?;
        self.find(vault_id, item_id)
    }

    async fn list(
        &self,
        vault_id: &str,
        filter: ItemListFilter,
    ) -> TransportResult<Vec<ItemOverview>> {
        self.enter(VaultCall::List).await?;
        Ok(self
            .items
            .read()
            .iter()
            .filter(|i| i.vault_id == vault_id && filter.matches(i.state))
            .map(ItemOverview::from)
            .collect())
    }

    async fn put(&self, item: VaultItem) -> TransportResult<VaultItem> {
        self.enter(VaultCall::Update).await?;
        self.replace(item)
    }
}

#[async_trait]
impl ConnectClientApi for MockVault {
    async fn create_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem> {
        self.enter(VaultCall::Create).await?;
        let mut item = item.clone().into_vault_item();
        item.vault_id = vault_id.to_string();
        Ok(ConnectItem::from_vault_item(&self.store_new(item)))
    }

    async fn delete_item_by_id(&self, item_id: &str, vault_id: &str) -> TransportResult<()> {
        self.enter(VaultCall::Delete).await?;
        self.take(vault_id, item_id)
    }

    async fn get_item_by_uuid(&self, item_id: &str, vault_id: &str) -> TransportResult<ConnectItem> {
        self.enter(VaultCall::Get).await?;
        self.find(vault_id, item_id)
            .map(|item| ConnectItem::from_vault_item(&item))
    }

    async fn get_items(&self, vault_id: &str) -> TransportResult<Vec<ConnectItem>> {
        self.enter(VaultCall::List).await?;
        Ok(self.connect_overviews(vault_id, None))
    }

    async fn get_items_by_title(
        &self,
        title: &str,
        vault_id: &str,
    ) -> TransportResult<Vec<ConnectItem>> {
        self.enter(VaultCall::ListByTitle).await?;
        Ok(self.connect_overviews(vault_id, Some(title)))
    }

    async fn update_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem> {
        self.enter(VaultCall::Update).await?;
        let mut item = item.clone().into_vault_item();
        item.vault_id = vault_id.to_string();
        self.replace(item).map(|item| ConnectItem::from_vault_item(&item))
    }
}

/// Connector handing out one shared [`MockVault`]
pub struct MockConnector {
    vault: Arc<MockVault>,
    connects: Mutex<Vec<(ClientAuth, IntegrationInfo)>>,
    failure: Mutex<Option<String>>,
}

impl MockConnector {
    pub fn new(vault: Arc<MockVault>) -> Self {
        Self {
            vault,
            connects: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn vault(&self) -> &Arc<MockVault> {
        &self.vault
    }

    /// Number of clients built so far
    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    /// Credentials and integration info of every connect, in order
    pub fn connects(&self) -> Vec<(ClientAuth, IntegrationInfo)> {
        self.connects.lock().clone()
    }

    /// Refuse to build clients until [`MockConnector::recover`]
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }
}

#[async_trait]
impl ItemsClientConnector for MockConnector {
    async fn connect(
        &self,
        auth: ClientAuth,
        integration: IntegrationInfo,
    ) -> TransportResult<Arc<dyn ItemsApi>> {
        self.connects.lock().push((auth, integration));
        if let Some(message) = self.failure.lock().clone() {
            return Err(TransportError::Sdk(message));
        }
        Ok(Arc::clone(&self.vault) as Arc<dyn ItemsApi>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onepassword::model::{FieldType, ItemCategory};
    use chrono::TimeZone;

    fn params(title: &str) -> ItemCreateParams {
        ItemCreateParams {
            category: ItemCategory::ApiCredentials,
            vault_id: "vault".to_string(),
            title: title.to_string(),
            fields: vec![ItemField {
                title: "keyring".to_string(),
                field_type: FieldType::Concealed,
                value: "value".to_string(),
                ..Default::default()
            }],
            tags: vec!["keyring".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let vault = MockVault::new();
        let item = ItemsApi::create(&vault, params("a")).await.unwrap();
        assert!(!item.id.is_empty());
        assert!(!item.fields[0].id.is_empty());
        assert_ne!(item.id, item.fields[0].id);
        assert!(item.updated_at.is_some());
        assert_eq!(vault.items().len(), 1);
        assert_eq!(vault.call_count(VaultCall::Create), 1);
    }

    #[tokio::test]
    async fn test_list_hides_fields_and_archived() {
        let vault = MockVault::new();
        let mut archived = ItemsApi::create(&vault, params("old")).await.unwrap();
        archived.state = ItemState::Archived;
        ItemsApi::put(&vault, archived).await.unwrap();
        ItemsApi::create(&vault, params("new")).await.unwrap();

        let overviews = vault
            .list("vault", ItemListFilter::active_only())
            .await
            .unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].title, "new");

        let connect = vault.get_items("vault").await.unwrap();
        assert_eq!(connect.len(), 2);
        assert!(connect.iter().all(|i| i.fields.is_empty()));
    }

    #[tokio::test]
    async fn test_put_keeps_caller_timestamp() {
        let vault = MockVault::new();
        let mut item = ItemsApi::create(&vault, params("a")).await.unwrap();
        let stamp = Utc.with_ymd_and_hms(2015, 10, 21, 16, 29, 0).unwrap();
        item.updated_at = Some(stamp);
        ItemsApi::put(&vault, item).await.unwrap();
        assert_eq!(vault.items()[0].updated_at, Some(stamp));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let vault = MockVault::new();
        assert!(matches!(
            ItemsApi::get(&vault, "vault", "nope").await,
            Err(TransportError::Status { status: 404, .. })
        ));
        assert!(ItemsApi::delete(&vault, "vault", "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let vault = MockVault::new();
        vault.fail_with("boom");
        assert!(matches!(
            ItemsApi::create(&vault, params("a")).await,
            Err(TransportError::Sdk(m)) if m == "boom"
        ));
        vault.recover();
        assert!(ItemsApi::create(&vault, params("a")).await.is_ok());
        assert_eq!(vault.call_count(VaultCall::Create), 2);
    }

    #[tokio::test]
    async fn test_connector_records_auth() {
        let connector = MockConnector::new(Arc::new(MockVault::new()));
        let info = IntegrationInfo {
            name: "keyring",
            version: "v1.0.0",
        };
        connector
            .connect(ClientAuth::DesktopAccount("acct".to_string()), info)
            .await
            .unwrap();
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(
            connector.connects()[0].0,
            ClientAuth::DesktopAccount("acct".to_string())
        );

        connector.fail_with("locked");
        assert!(connector
            .connect(ClientAuth::DesktopAccount("acct".to_string()), info)
            .await
            .is_err());
    }
}
