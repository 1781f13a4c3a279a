//! Shared matching and encoding engine
//!
//! Everything here is transport-agnostic. Transports hand over hydrated
//! items; [`ItemScope`] decides which of them belong to the keyring, maps
//! keys to titles and back, and detects duplicates.

use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{FieldType, ItemCategory, ItemField, ItemState, VaultItem};
use super::{DEFAULT_ITEM_FIELD_TITLE, DEFAULT_ITEM_TAG, DEFAULT_ITEM_TITLE_PREFIX, ENV_VAULT_ID};
use crate::config::{Config, ConfigError, ConfigErrors, PromptFunc};
use crate::keyring::{BackendType, KeyringError, KeyringResult};
use crate::types::Item;

/// Separator between the title prefix and the key
pub const TITLE_PREFIX_KEY_SEP: &str = ": ";

/// Category of every managed item
pub const MANAGED_ITEM_CATEGORY: ItemCategory = ItemCategory::ApiCredentials;

/// Type of the field holding the serialized item
pub const MANAGED_FIELD_TYPE: FieldType = FieldType::Concealed;

/// An item that passed the managed-item predicate
///
/// Carries exactly one field: the one holding the serialized [`Item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedItem {
    pub id: String,
    pub title: String,
    pub vault_id: String,
    pub tags: Vec<String>,
    pub field: ItemField,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManagedItem {
    /// Back to the store's shape, ready to be written
    pub fn into_vault_item(self) -> VaultItem {
        VaultItem {
            id: self.id,
            title: self.title,
            category: MANAGED_ITEM_CATEGORY,
            vault_id: self.vault_id,
            tags: self.tags,
            fields: vec![self.field],
            state: ItemState::Active,
            updated_at: self.updated_at,
        }
    }
}

/// JSON payload stored in the managed field
///
/// Member names and the base64 encoding of `Data` match what other keyring
/// implementations write, so existing items stay readable. Unknown members
/// are ignored on read.
#[derive(Serialize, Deserialize)]
struct FieldPayload {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Data", default, with = "base64_bytes")]
    data: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    // `null` is how an empty payload is written by some writers
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(D::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// Which part of a vault the keyring manages, and how keys are encoded
///
/// # Example
///
/// ```
/// use opkeyring_core::onepassword::ItemScope;
///
/// let scope = ItemScope::new("vault", "kr", "keyring", "keyring");
/// assert_eq!(scope.encode_title("a"), "kr: a");
/// assert_eq!(scope.decode_title("kr: a"), "a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemScope {
    vault_id: String,
    title_prefix: String,
    tag: String,
    field_title: String,
}

impl ItemScope {
    pub fn new(
        vault_id: impl Into<String>,
        title_prefix: impl Into<String>,
        tag: impl Into<String>,
        field_title: impl Into<String>,
    ) -> Self {
        Self {
            vault_id: vault_id.into(),
            title_prefix: title_prefix.into(),
            tag: tag.into(),
            field_title: field_title.into(),
        }
    }

    /// Build the scope from configuration, applying defaults
    ///
    /// The vault id falls back to `OP_VAULT_ID`; if that is unset too the
    /// problem is recorded in `errors` and the scope is left with an empty id.
    pub fn from_config(config: &Config, backend: BackendType, errors: &mut ConfigErrors) -> Self {
        let vault_id = non_empty(&config.op_vault_id)
            .map(str::to_string)
            .or_else(|| env_non_empty(ENV_VAULT_ID))
            .unwrap_or_else(|| {
                errors.push(ConfigError::EnvUnsetOrEmpty {
                    backend,
                    var: ENV_VAULT_ID.to_string(),
                });
                String::new()
            });

        Self::new(
            vault_id,
            non_empty(&config.op_item_title_prefix).unwrap_or(DEFAULT_ITEM_TITLE_PREFIX),
            non_empty(&config.op_item_tag).unwrap_or(DEFAULT_ITEM_TAG),
            non_empty(&config.op_item_field_title).unwrap_or(DEFAULT_ITEM_FIELD_TITLE),
        )
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    pub fn title_prefix(&self) -> &str {
        &self.title_prefix
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn field_title(&self) -> &str {
        &self.field_title
    }

    pub fn encode_title(&self, key: &str) -> String {
        format!("{}{}{}", self.title_prefix, TITLE_PREFIX_KEY_SEP, key)
    }

    /// Strip the title prefix; titles without it come back unchanged
    pub fn decode_title<'a>(&self, title: &'a str) -> &'a str {
        title
            .strip_prefix(self.title_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(TITLE_PREFIX_KEY_SEP))
            .unwrap_or(title)
    }

    pub fn serialize_field(&self, item: &Item) -> KeyringResult<String> {
        let payload = FieldPayload {
            key: item.key.clone(),
            data: item.data.clone(),
        };
        serde_json::to_string(&payload).map_err(KeyringError::Encode)
    }

    pub fn deserialize_field(&self, value: &str) -> KeyringResult<Item> {
        let payload: FieldPayload = serde_json::from_str(value).map_err(KeyringError::Decode)?;
        Ok(Item::new(payload.key, payload.data))
    }

    /// Cheap pre-check on listing data, before paying for hydration
    pub fn is_candidate(&self, tags: &[String], category: ItemCategory, state: ItemState) -> bool {
        state == ItemState::Active
            && category == MANAGED_ITEM_CATEGORY
            && tags.iter().any(|t| t == &self.tag)
    }

    /// The managed-item predicate
    ///
    /// Returns `None` for items the keyring must not see: wrong category or
    /// state, missing tag, or anything other than exactly one concealed field
    /// carrying the configured field title.
    pub fn managed(&self, item: VaultItem) -> Option<ManagedItem> {
        if !self.is_candidate(&item.tags, item.category, item.state) {
            return None;
        }

        let mut concealed = item
            .fields
            .into_iter()
            .filter(|f| f.field_type == MANAGED_FIELD_TYPE);
        let field = concealed.next()?;
        if concealed.next().is_some() || field.title != self.field_title {
            return None;
        }

        Some(ManagedItem {
            id: item.id,
            title: item.title,
            vault_id: item.vault_id,
            tags: item.tags,
            field,
            updated_at: item.updated_at,
        })
    }

    /// The single managed item stored under `key`
    pub fn find_by_key(&self, items: Vec<ManagedItem>, key: &str) -> KeyringResult<ManagedItem> {
        let title = self.encode_title(key);
        let mut matches: Vec<ManagedItem> =
            items.into_iter().filter(|i| i.title == title).collect();

        match matches.len() {
            0 => Err(KeyringError::KeyNotFound),
            1 => Ok(matches.remove(0)),
            count => Err(KeyringError::AmbiguousMatch {
                count,
                title,
                vault_id: self.vault_id.clone(),
            }),
        }
    }

    /// Decode every title, keeping the listing order
    ///
    /// Two distinct items sharing a title fail the whole listing with
    /// [`KeyringError::DuplicateTitle`] naming the repeated titles.
    pub fn list_keys(&self, items: &[ManagedItem]) -> KeyringResult<Vec<String>> {
        let mut seen: Vec<&str> = Vec::with_capacity(items.len());
        let mut duplicates: Vec<String> = Vec::new();

        for item in items {
            if seen.contains(&item.title.as_str()) {
                if !duplicates.contains(&item.title) {
                    duplicates.push(item.title.clone());
                }
            } else {
                seen.push(&item.title);
            }
        }

        if !duplicates.is_empty() {
            return Err(KeyringError::DuplicateTitle {
                titles: duplicates,
                vault_id: self.vault_id.clone(),
            });
        }

        Ok(seen
            .into_iter()
            .map(|title| self.decode_title(title).to_string())
            .collect())
    }
}

/// Where a bearer token comes from
///
/// Environment variables are checked in order (blank names and empty values
/// are skipped), then the prompt function is asked.
#[derive(Clone)]
pub struct TokenSource {
    backend: BackendType,
    envs: Vec<String>,
    prompt: Option<PromptFunc>,
}

impl TokenSource {
    pub fn new(backend: BackendType, envs: Vec<String>, prompt: Option<PromptFunc>) -> Self {
        Self {
            backend,
            envs,
            prompt,
        }
    }

    pub fn envs(&self) -> &[String] {
        &self.envs
    }

    /// Whether a token can be obtained without failing: a variable is set
    /// or a prompt function is configured
    pub fn is_available(&self) -> bool {
        self.prompt.is_some() || self.from_env().is_some()
    }

    fn from_env(&self) -> Option<String> {
        self.envs.iter().find_map(|name| env_non_empty(name))
    }

    /// Resolve the token
    ///
    /// The prompt function is interactive and blocking, so it runs on the
    /// blocking thread pool.
    pub async fn resolve(&self, prompt: &str) -> KeyringResult<String> {
        if let Some(token) = self.from_env() {
            return Ok(token);
        }
        let Some(func) = self.prompt.clone() else {
            return Err(ConfigError::TokenFuncMissing {
                backend: self.backend,
            }
            .into());
        };

        let text = prompt.to_string();
        tokio::task::spawn_blocking(move || func(&text))
            .await
            .map_err(|e| KeyringError::Prompt(io::Error::new(io::ErrorKind::Other, e)))?
            .map_err(KeyringError::Prompt)
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("backend", &self.backend)
            .field("envs", &self.envs)
            .field("prompt", &self.prompt.is_some())
            .finish()
    }
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Value of an environment variable, treating unset and empty alike
pub(crate) fn env_non_empty(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Reject a zero per-call deadline
pub(crate) fn check_timeout(config: &Config, backend: BackendType, errors: &mut ConfigErrors) {
    if config.op_timeout.is_zero() {
        errors.push(ConfigError::TimeoutZero { backend });
    }
}
