//! HTTP client for the Connect gateway REST API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};

use crate::onepassword::model::{FieldType, ItemCategory, ItemField, ItemState, VaultItem};
use crate::onepassword::transport::{ConnectClientApi, TransportError, TransportResult};

static USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "opkeyring/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
});

/// An item as the gateway sends and receives it
///
/// Listing endpoints return overviews: the same shape without `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vault: ConnectVault,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ConnectField>,
    /// Absent for active items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ItemState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectVault {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectField {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

/// `title eq "<title>"` with `\\` and `"` escaped inside the literal
fn title_filter(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('"', "\\\"");
    format!("title eq \"{}\"", escaped)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ConnectItem {
    pub fn into_vault_item(self) -> VaultItem {
        VaultItem {
            id: self.id,
            title: self.title,
            category: self.category,
            vault_id: self.vault.id,
            tags: self.tags,
            fields: self
                .fields
                .into_iter()
                .map(|f| ItemField {
                    id: f.id,
                    title: f.label,
                    field_type: f.field_type,
                    value: f.value,
                })
                .collect(),
            state: self.state.unwrap_or_default(),
            updated_at: self.updated_at,
        }
    }

    pub fn from_vault_item(item: &VaultItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            vault: ConnectVault {
                id: item.vault_id.clone(),
            },
            category: item.category,
            tags: item.tags.clone(),
            fields: item
                .fields
                .iter()
                .map(|f| ConnectField {
                    id: f.id.clone(),
                    field_type: f.field_type,
                    label: f.title.clone(),
                    value: f.value.clone(),
                })
                .collect(),
            state: match item.state {
                ItemState::Active => None,
                state => Some(state),
            },
            updated_at: item.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct ConnectErrorBody {
    #[serde(default)]
    message: String,
}

/// Connect gateway client authenticated with a bearer token
pub struct ConnectClient {
    host: String,
    base_url: Url,
    token: String,
    http: reqwest::Client,
}

impl ConnectClient {
    /// Create a client for `host` (an `http://` or `https://` URI)
    pub fn new(host: &str, token: impl Into<String>) -> TransportResult<Self> {
        let trimmed = host.trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base())
            .ok_or_else(|| TransportError::InvalidHost(host.to_string()))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT.as_str())
            .build()?;

        Ok(Self {
            host: trimmed.to_string(),
            base_url,
            token: token.into(),
            http,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `<host>/v1/vaults/<vault_id>/items[/<item_id>]`, ids percent-encoded
    fn endpoint(&self, vault_id: &str, item_id: Option<&str>) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::InvalidHost(self.host.clone()))?;
            segments.pop_if_empty().extend(["v1", "vaults", vault_id, "items"]);
            if let Some(item_id) = item_id {
                segments.push(item_id);
            }
        }
        Ok(url)
    }

    fn items_url(&self, vault_id: &str) -> TransportResult<Url> {
        self.endpoint(vault_id, None)
    }

    fn item_url(&self, vault_id: &str, item_id: &str) -> TransportResult<Url> {
        self.endpoint(vault_id, Some(item_id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> TransportResult<reqwest::Response> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ConnectErrorBody>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        crate::warn_log!("Connect request failed: status={}, message={}", status, message);
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for ConnectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectClient")
            .field("host", &self.host)
            .field("token", &"[redacted]")
            .finish()
    }
}

#[async_trait]
impl ConnectClientApi for ConnectClient {
    async fn create_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem> {
        let response = self
            .send(self.http.post(self.items_url(vault_id)?).json(item))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_item_by_id(&self, item_id: &str, vault_id: &str) -> TransportResult<()> {
        self.send(self.http.delete(self.item_url(vault_id, item_id)?))
            .await?;
        Ok(())
    }

    async fn get_item_by_uuid(&self, item_id: &str, vault_id: &str) -> TransportResult<ConnectItem> {
        let response = self
            .send(self.http.get(self.item_url(vault_id, item_id)?))
            .await?;
        Ok(response.json().await?)
    }

    async fn get_items(&self, vault_id: &str) -> TransportResult<Vec<ConnectItem>> {
        let response = self.send(self.http.get(self.items_url(vault_id)?)).await?;
        Ok(response.json().await?)
    }

    async fn get_items_by_title(
        &self,
        title: &str,
        vault_id: &str,
    ) -> TransportResult<Vec<ConnectItem>> {
        let filter = title_filter(title);
        let response = self
            .send(
                self.http
                    .get(self.items_url(vault_id)?)
                    .query(&[("filter", filter)]),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn update_item(&self, item: &ConnectItem, vault_id: &str) -> TransportResult<ConnectItem> {
        let response = self
            .send(self.http.put(self.item_url(vault_id, &item.id)?).json(item))
            .await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_host() {
        assert!(matches!(
            ConnectClient::new("connect.example.com", "token"),
            Err(TransportError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_urls() {
        let client = ConnectClient::new("https://connect.example.com/", "token").unwrap();
        assert_eq!(client.host(), "https://connect.example.com");
        assert_eq!(
            client.items_url("vault").unwrap().as_str(),
            "https://connect.example.com/v1/vaults/vault/items"
        );
        assert_eq!(
            client.item_url("vault", "item").unwrap().as_str(),
            "https://connect.example.com/v1/vaults/vault/items/item"
        );
    }

    #[test]
    fn test_urls_keep_host_path_and_encode_ids() {
        let client = ConnectClient::new("http://localhost:8080/connect/", "token").unwrap();
        assert_eq!(
            client.item_url("va/ult", "it em?").unwrap().as_str(),
            "http://localhost:8080/connect/v1/vaults/va%2Fult/items/it%20em%3F"
        );
    }

    #[test]
    fn test_title_filter_escapes_literal() {
        assert_eq!(title_filter("keyring: key"), r#"title eq "keyring: key""#);
        assert_eq!(
            title_filter(r#"keyring: say "hi" \ bye"#),
            r#"title eq "keyring: say \"hi\" \\ bye""#
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = ConnectClient::new("http://localhost:8080", "secret-token").unwrap();
        assert!(!format!("{:?}", client).contains("secret-token"));
    }

    #[test]
    fn test_parse_item() {
        let json = r#"{
            "id": "itemID",
            "title": "keyring: key",
            "vault": {"id": "vaultID"},
            "category": "API_CREDENTIAL",
            "tags": ["keyring"],
            "fields": [
                {"id": "itemFieldID", "type": "CONCEALED", "label": "keyring", "value": "{}"},
                {"id": "notes", "type": "STRING", "purpose": "NOTES", "label": "notes"}
            ],
            "updatedAt": "1955-11-05T11:00:00Z"
        }"#;

        let item: ConnectItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.state, None);
        assert_eq!(item.fields.len(), 2);

        let item = item.into_vault_item();
        assert_eq!(item.vault_id, "vaultID");
        assert_eq!(item.category, ItemCategory::ApiCredentials);
        assert_eq!(item.state, ItemState::Active);
        assert_eq!(item.fields[0].title, "keyring");
        assert_eq!(item.fields[0].field_type, FieldType::Concealed);
        assert!(item.updated_at.is_some());
    }

    #[test]
    fn test_parse_overview_with_null_tags() {
        let json = r#"{"id": "i", "title": "t", "vault": {"id": "v"}, "category": "LOGIN", "tags": null, "state": "ARCHIVED"}"#;
        let item: ConnectItem = serde_json::from_str(json).unwrap();
        assert!(item.tags.is_empty());
        assert!(item.fields.is_empty());
        assert_eq!(item.state, Some(ItemState::Archived));
    }

    #[test]
    fn test_parse_listing_with_unknown_state() {
        let json = r#"[
            {"id": "a", "title": "keyring: a", "vault": {"id": "v"}, "category": "API_CREDENTIAL", "state": "PURGED"},
            {"id": "b", "title": "keyring: b", "vault": {"id": "v"}, "category": "API_CREDENTIAL"}
        ]"#;
        let items: Vec<ConnectItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].state, Some(ItemState::Unknown));
        assert_eq!(items[1].state, None);
        assert_eq!(items[0].clone().into_vault_item().state, ItemState::Unknown);
    }

    #[test]
    fn test_serialize_new_item() {
        let item = ConnectItem {
            title: "keyring: key".to_string(),
            vault: ConnectVault {
                id: "vaultID".to_string(),
            },
            category: ItemCategory::ApiCredentials,
            tags: vec!["keyring".to_string()],
            fields: vec![ConnectField {
                field_type: FieldType::Concealed,
                label: "keyring".to_string(),
                value: "{}".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("updatedAt").is_none());
        assert_eq!(value["category"], "API_CREDENTIAL");
        assert_eq!(value["fields"][0]["type"], "CONCEALED");
        assert!(value["fields"][0].get("id").is_none());
    }
}
