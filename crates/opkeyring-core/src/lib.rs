//! opkeyring Core
//!
//! Key-value keyring backends on top of an item-based password vault.
//! Each key lives in its own vault item; four backends reach the vault in
//! different ways but share the same storage rules and error taxonomy.
//!
//! ## Opening a keyring
//!
//! ```rust,ignore
//! use opkeyring_core::{BackendRegistry, Config, Item};
//!
//! let registry = BackendRegistry::with_defaults();
//! let config = Config::new()
//!     .with_vault_id("abcdefghijklmnopqrstuvwxyz")
//!     .with_connect_host("https://connect.example.com");
//!
//! let keyring = registry.open_named("op-connect", config).await?;
//! keyring.set(Item::new("aws-prod", b"secret".to_vec())).await?;
//! let keys = keyring.keys().await?;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod keyring;
pub mod onepassword;

// Re-export commonly used types
pub use types::{Item, Metadata};

pub use config::{Config, ConfigError, ConfigErrors, PromptFunc};

pub use keyring::{BackendRegistry, BackendType, Keyring, KeyringError, KeyringResult};

pub use onepassword::{
    new_connect_keyring, new_desktop_keyring, new_service_account_keyring, new_standard_keyring,
    ItemsApi, ItemsClientConnector, ItemScope, MetadataPolicy, TransportError, VaultKeyring,
};
