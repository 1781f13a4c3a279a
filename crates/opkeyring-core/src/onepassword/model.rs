//! Store-native vault item model
//!
//! These mirror the vault's own schema. The category and field type names
//! serialize the way the Connect REST API spells them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemCategory {
    #[serde(rename = "API_CREDENTIAL")]
    ApiCredentials,
    #[serde(rename = "LOGIN")]
    Login,
    #[serde(rename = "PASSWORD")]
    Password,
    #[serde(rename = "SECURE_NOTE")]
    SecureNote,
    #[serde(rename = "CUSTOM")]
    Custom,
    /// Any category this crate does not manage
    #[default]
    #[serde(other, rename = "UNSUPPORTED")]
    Unsupported,
}

/// Item field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "CONCEALED")]
    Concealed,
    #[serde(rename = "STRING")]
    Text,
    #[serde(rename = "EMAIL")]
    Email,
    #[serde(rename = "URL")]
    Url,
    #[serde(rename = "OTP")]
    Totp,
    #[default]
    #[serde(other, rename = "UNKNOWN")]
    Unknown,
}

/// Lifecycle state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemState {
    #[default]
    Active,
    Archived,
    Deleted,
    /// Any state this crate does not know; never treated as active
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemField {
    pub id: String,
    pub title: String,
    pub field_type: FieldType,
    pub value: String,
}

/// A fully hydrated item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultItem {
    pub id: String,
    pub title: String,
    pub category: ItemCategory,
    pub vault_id: String,
    pub tags: Vec<String>,
    pub fields: Vec<ItemField>,
    pub state: ItemState,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lightweight listing entry, without fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemOverview {
    pub id: String,
    pub title: String,
    pub category: ItemCategory,
    pub vault_id: String,
    pub tags: Vec<String>,
    pub state: ItemState,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&VaultItem> for ItemOverview {
    fn from(item: &VaultItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            category: item.category,
            vault_id: item.vault_id.clone(),
            tags: item.tags.clone(),
            state: item.state,
            updated_at: item.updated_at,
        }
    }
}

/// Parameters for creating an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCreateParams {
    pub category: ItemCategory,
    pub vault_id: String,
    pub title: String,
    pub fields: Vec<ItemField>,
    pub tags: Vec<String>,
}

/// Which item states a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemListFilter {
    pub active: bool,
    pub archived: bool,
}

impl ItemListFilter {
    pub fn active_only() -> Self {
        Self {
            active: true,
            archived: false,
        }
    }

    pub fn matches(&self, state: ItemState) -> bool {
        match state {
            ItemState::Active => self.active,
            ItemState::Archived => self.archived,
            ItemState::Deleted | ItemState::Unknown => false,
        }
    }
}
