//! Keyring backend registry for opening keyrings by identifier
//!
//! The registry is a plain value: build it once at startup (usually with
//! [`BackendRegistry::with_defaults`]) and share it read-only.

use std::collections::BTreeMap;

use futures::future::BoxFuture;

use super::backend::BackendType;
use super::traits::{Keyring, KeyringError, KeyringResult};
use crate::config::Config;
use crate::onepassword::{
    new_connect_keyring, new_desktop_keyring, new_service_account_keyring, new_standard_keyring,
};

/// Opener function type for creating keyrings
pub type KeyringOpener =
    Box<dyn Fn(Config) -> BoxFuture<'static, KeyringResult<Box<dyn Keyring>>> + Send + Sync>;

/// Definition of a registered backend
pub struct BackendDefinition {
    pub backend: BackendType,
    /// Human-readable description
    pub description: String,
    pub opener: KeyringOpener,
}

impl std::fmt::Debug for BackendDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDefinition")
            .field("backend", &self.backend)
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<BackendType, BackendDefinition>,
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four vault backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            BackendType::OpConnect,
            "Items in a vault behind a Connect gateway",
            Box::new(|config| {
                Box::pin(async move {
                    Ok::<_, KeyringError>(Box::new(new_connect_keyring(&config)?) as Box<dyn Keyring>)
                })
            }),
        );

        registry.register(
            BackendType::OpDesktop,
            "Items in a vault reached through the desktop app",
            Box::new(|config| {
                Box::pin(async move {
                    Ok::<_, KeyringError>(Box::new(new_desktop_keyring(&config)?) as Box<dyn Keyring>)
                })
            }),
        );

        registry.register(
            BackendType::OpServiceAccount,
            "Items in a vault reached with a service account token",
            Box::new(|config| {
                Box::pin(async move {
                    Ok::<_, KeyringError>(Box::new(new_service_account_keyring(&config)?) as Box<dyn Keyring>)
                })
            }),
        );

        registry.register(
            BackendType::OpStandard,
            "Items in a vault reached with a service account token, authenticated at open",
            Box::new(|config| {
                Box::pin(async move {
                    Ok::<_, KeyringError>(Box::new(new_standard_keyring(&config).await?) as Box<dyn Keyring>)
                })
            }),
        );

        registry
    }

    /// Register (or replace) the opener for `backend`
    pub fn register(&mut self, backend: BackendType, description: &str, opener: KeyringOpener) {
        self.backends.insert(
            backend,
            BackendDefinition {
                backend,
                description: description.to_string(),
                opener,
            },
        );
    }

    pub fn contains(&self, backend: BackendType) -> bool {
        self.backends.contains_key(&backend)
    }

    /// Registered backends as (backend, description) pairs
    pub fn backends(&self) -> Vec<(BackendType, String)> {
        self.backends
            .values()
            .map(|def| (def.backend, def.description.clone()))
            .collect()
    }

    /// Open a keyring for `backend`
    ///
    /// Fails with [`KeyringError::UnsupportedBackend`] when nothing is
    /// registered for it.
    pub async fn open(&self, backend: BackendType, config: Config) -> KeyringResult<Box<dyn Keyring>> {
        let def = self.backends.get(&backend).ok_or_else(|| {
            crate::warn_log!("No keyring registered for backend {}", backend.as_str());
            KeyringError::UnsupportedBackend(backend.as_str().to_string())
        })?;

        crate::debug_log!("Opening {} keyring", backend.as_str());
        (def.opener)(config).await
    }

    /// Open a keyring by its identifier (`op-connect`, `op-desktop`, `op`,
    /// `op-standard`)
    pub async fn open_named(&self, name: &str, config: Config) -> KeyringResult<Box<dyn Keyring>> {
        let backend: BackendType = name.parse()?;
        self.open(backend, config).await
    }
}
