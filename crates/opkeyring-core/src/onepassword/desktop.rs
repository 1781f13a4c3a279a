//! Desktop app integration backend

use super::base::{check_timeout, env_non_empty, non_empty, ItemScope};
use super::lazy::{LazyAuth, LazyTransport};
use super::standard::connector_from_config;
use super::vault_keyring::{MetadataPolicy, VaultKeyring};
use crate::config::{Config, ConfigError, ConfigErrors};
use crate::keyring::{BackendType, KeyringResult};

/// Account name or UUID of the signed-in desktop app
pub const ENV_DESKTOP_ACCOUNT_ID: &str = "OP_DESKTOP_ACCOUNT_ID";

/// Keyring authenticated through the desktop app
pub type DesktopKeyring = VaultKeyring<LazyTransport>;

/// Open a desktop keyring
///
/// The desktop app is not contacted until the first operation, so opening
/// never triggers an unlock prompt.
pub fn new_desktop_keyring(config: &Config) -> KeyringResult<DesktopKeyring> {
    let backend = BackendType::OpDesktop;
    let mut errors = ConfigErrors::new();

    check_timeout(config, backend, &mut errors);
    let scope = ItemScope::from_config(config, backend, &mut errors);

    let account = non_empty(&config.op_desktop_account_id)
        .map(str::to_string)
        .or_else(|| env_non_empty(ENV_DESKTOP_ACCOUNT_ID));
    if account.is_none() {
        errors.push(ConfigError::EnvUnsetOrEmpty {
            backend,
            var: ENV_DESKTOP_ACCOUNT_ID.to_string(),
        });
    }

    let connector = connector_from_config(config, backend, &mut errors);

    let (account, connector) = match (account, connector) {
        (Some(account), Some(connector)) if errors.is_empty() => (account, connector),
        _ => {
            crate::warn_log!("Desktop keyring configuration rejected: {} problem(s)", errors.len());
            return Err(errors.into());
        }
    };

    crate::debug_log!("Desktop keyring opened: account={}, vault={}", account, scope.vault_id());
    let transport = LazyTransport::new(
        backend,
        LazyAuth::Desktop(account),
        connector,
        config.op_timeout,
    );

    Ok(VaultKeyring::new(scope, transport, MetadataPolicy::ZeroWhenMissing))
}
