//! Service account backend

use super::base::{check_timeout, ItemScope, TokenSource};
use super::lazy::{LazyAuth, LazyTransport};
use super::standard::connector_from_config;
use super::vault_keyring::{MetadataPolicy, VaultKeyring};
use crate::config::{Config, ConfigErrors};
use crate::keyring::{BackendType, KeyringResult};

/// Service account token
pub const ENV_SERVICE_ACCOUNT_TOKEN: &str = "OP_SERVICE_ACCOUNT_TOKEN";

pub(crate) const TOKEN_PROMPT: &str = "Enter 1Password service account token";

/// Keyring authenticated by a service account token
pub type ServiceAccountKeyring = VaultKeyring<LazyTransport>;

/// Token lookup shared by the service account and standard backends
///
/// The variable named by `op_token_env` is tried first, then
/// `OP_SERVICE_ACCOUNT_TOKEN`, then the prompt function.
pub(crate) fn token_source(config: &Config, backend: BackendType) -> TokenSource {
    TokenSource::new(
        backend,
        vec![
            config.op_token_env.clone(),
            ENV_SERVICE_ACCOUNT_TOKEN.to_string(),
        ],
        config.op_token_func.clone(),
    )
}

/// Open a service account keyring
///
/// The token is not read until the first operation.
pub fn new_service_account_keyring(config: &Config) -> KeyringResult<ServiceAccountKeyring> {
    let backend = BackendType::OpServiceAccount;
    let mut errors = ConfigErrors::new();

    check_timeout(config, backend, &mut errors);
    let scope = ItemScope::from_config(config, backend, &mut errors);
    let connector = connector_from_config(config, backend, &mut errors);

    let connector = match connector {
        Some(connector) if errors.is_empty() => connector,
        _ => {
            crate::warn_log!("Service account keyring configuration rejected: {} problem(s)", errors.len());
            return Err(errors.into());
        }
    };

    let transport = LazyTransport::new(
        backend,
        LazyAuth::ServiceAccount(token_source(config, backend)),
        connector,
        config.op_timeout,
    );
    crate::debug_log!("Service account keyring opened: vault={}", scope.vault_id());

    Ok(VaultKeyring::new(scope, transport, MetadataPolicy::ZeroWhenMissing))
}
