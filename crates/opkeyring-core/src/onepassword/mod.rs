//! Keyring backends on top of an item-based password vault
//!
//! Every backend stores one vault item per key and shares the same matching
//! rules (see [`ItemScope`]). They differ in how they reach the vault:
//!
//! | Backend | Identifier | Client |
//! |---|---|---|
//! | Connect gateway | `op-connect` | REST client with a bearer token |
//! | Desktop integration | `op-desktop` | SDK client, built on first use |
//! | Service account | `op` | SDK client, built on first use |
//! | Standard | `op-standard` | SDK client, built at open time |
//!
//! SDK clients come from the [`ItemsClientConnector`] attached to the
//! [`Config`](crate::Config).

mod base;
pub mod connect;
mod desktop;
mod lazy;
pub mod mock;
pub mod model;
mod service_account;
mod standard;
mod transport;
mod vault_keyring;

pub use base::{ItemScope, ManagedItem, TokenSource, TITLE_PREFIX_KEY_SEP};
pub use connect::{new_connect_keyring, ConnectClient, ConnectKeyring, ConnectTransport, ENV_CONNECT_HOST, ENV_CONNECT_TOKEN};
pub use desktop::{new_desktop_keyring, DesktopKeyring, ENV_DESKTOP_ACCOUNT_ID};
pub use lazy::{LazyAuth, LazyTransport};
pub use model::{FieldType, ItemCategory, ItemField, ItemState, VaultItem};
pub use service_account::{new_service_account_keyring, ServiceAccountKeyring, ENV_SERVICE_ACCOUNT_TOKEN};
pub use standard::{new_standard_keyring, StandardKeyring, StandardTransport};
pub use transport::{
    ClientAuth, ConnectClientApi, IntegrationInfo, ItemTransport, ItemsApi, ItemsClientConnector,
    TransportError, TransportResult,
};
pub use vault_keyring::{MetadataPolicy, VaultKeyring};

/// Vault UUID, used when the configuration leaves it empty
pub const ENV_VAULT_ID: &str = "OP_VAULT_ID";

pub const DEFAULT_ITEM_TITLE_PREFIX: &str = "keyring";
pub const DEFAULT_ITEM_TAG: &str = "keyring";
pub const DEFAULT_ITEM_FIELD_TITLE: &str = "keyring";

/// Sent to the vault service with every SDK client
pub const INTEGRATION: IntegrationInfo = IntegrationInfo {
    name: "keyring",
    version: "v1.0.0",
};
