//! Keyring configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigResult;
use crate::onepassword::ItemsClientConnector;

/// Interactive prompt used to ask the user for a token
///
/// Receives the prompt text and returns what the user entered.
pub type PromptFunc = Arc<dyn Fn(&str) -> std::io::Result<String> + Send + Sync>;

/// Configuration consumed by the vault keyring backends
///
/// Empty strings mean "not configured": required values then fall back to
/// their environment variable, optional ones to their default.
///
/// The prompt function and the SDK client connector cannot be written to a
/// file; attach them with [`Config::with_token_func`] and
/// [`Config::with_client_connector`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use opkeyring_core::Config;
///
/// let config = Config::new()
///     .with_vault_id("abcdefghijklmnopqrstuvwxyz")
///     .with_timeout(Duration::from_secs(15))
///     .with_item_tag("aws-vault");
/// assert_eq!(config.op_item_tag, "aws-vault");
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UUID of the vault holding the keyring items
    pub op_vault_id: String,

    /// Prefix prepended to item titles
    pub op_item_title_prefix: String,

    /// Tag applied to every managed item
    pub op_item_tag: String,

    /// Title of the field holding the serialized item
    pub op_item_field_title: String,

    /// Deadline for each SDK round trip
    #[serde(rename = "op_timeout_secs", with = "duration_secs")]
    pub op_timeout: Duration,

    /// Connect server HTTP(S) URI
    pub op_connect_host: String,

    /// Primary environment variable holding the Connect token
    pub op_connect_token_env: String,

    /// Primary environment variable holding the service account token
    pub op_token_env: String,

    /// Account name or UUID used for desktop app integration
    pub op_desktop_account_id: String,

    /// Prompt used when no token environment variable is set
    #[serde(skip)]
    pub op_token_func: Option<PromptFunc>,

    /// Builds SDK items clients for the desktop, service account and standard backends
    #[serde(skip)]
    pub op_client_connector: Option<Arc<dyn ItemsClientConnector>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vault_id(mut self, vault_id: impl Into<String>) -> Self {
        self.op_vault_id = vault_id.into();
        self
    }

    pub fn with_item_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.op_item_title_prefix = prefix.into();
        self
    }

    pub fn with_item_tag(mut self, tag: impl Into<String>) -> Self {
        self.op_item_tag = tag.into();
        self
    }

    pub fn with_item_field_title(mut self, title: impl Into<String>) -> Self {
        self.op_item_field_title = title.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_connect_host(mut self, host: impl Into<String>) -> Self {
        self.op_connect_host = host.into();
        self
    }

    pub fn with_connect_token_env(mut self, env: impl Into<String>) -> Self {
        self.op_connect_token_env = env.into();
        self
    }

    pub fn with_token_env(mut self, env: impl Into<String>) -> Self {
        self.op_token_env = env.into();
        self
    }

    pub fn with_desktop_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.op_desktop_account_id = account_id.into();
        self
    }

    pub fn with_token_func<F>(mut self, func: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<String> + Send + Sync + 'static,
    {
        self.op_token_func = Some(Arc::new(func));
        self
    }

    pub fn with_client_connector(mut self, connector: Arc<dyn ItemsClientConnector>) -> Self {
        self.op_client_connector = Some(connector);
        self
    }

    /// Parse a configuration from YAML
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Render the file-backed part of this configuration as YAML
    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load a configuration file
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Write the file-backed part of this configuration, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    /// User-level config location (~/.config/opkeyring/config.yaml)
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        config_dir.join("opkeyring").join("config.yaml")
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("op_vault_id", &self.op_vault_id)
            .field("op_item_title_prefix", &self.op_item_title_prefix)
            .field("op_item_tag", &self.op_item_tag)
            .field("op_item_field_title", &self.op_item_field_title)
            .field("op_timeout", &self.op_timeout)
            .field("op_connect_host", &self.op_connect_host)
            .field("op_connect_token_env", &self.op_connect_token_env)
            .field("op_token_env", &self.op_token_env)
            .field("op_desktop_account_id", &self.op_desktop_account_id)
            .field("op_token_func", &self.op_token_func.is_some())
            .field("op_client_connector", &self.op_client_connector.is_some())
            .finish()
    }
}

/// Seconds on disk; whole values stay integers, fractions are kept
mod duration_secs {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid op_timeout_secs {}: {}", secs, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml_str(
            "op_vault_id: vault\nop_item_tag: team\nop_timeout_secs: 30\n",
        )
        .unwrap();

        assert_eq!(config.op_vault_id, "vault");
        assert_eq!(config.op_item_tag, "team");
        assert_eq!(config.op_timeout, Duration::from_secs(30));
        assert!(config.op_item_title_prefix.is_empty());
        assert!(config.op_token_func.is_none());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.yaml")).unwrap();
        assert!(config.op_vault_id.is_empty());
        assert_eq!(config.op_timeout, Duration::ZERO);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config::new()
            .with_vault_id("vault")
            .with_connect_host("https://connect.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_token_func(|_| Ok("token".to_string()));
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("op_timeout_secs: 5"));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.op_vault_id, "vault");
        assert_eq!(loaded.op_connect_host, "https://connect.example.com");
        assert_eq!(loaded.op_timeout, Duration::from_secs(5));
        // Prompt functions never round-trip through a file
        assert!(loaded.op_token_func.is_none());
    }

    #[test]
    fn test_sub_second_timeout_survives_save_and_load() {
        let dir = tempdir().unwrap();

        for timeout in [Duration::from_millis(1500), Duration::from_millis(500)] {
            let path = dir.path().join(format!("{}ms.yaml", timeout.as_millis()));
            Config::new().with_timeout(timeout).save(&path).unwrap();
            assert_eq!(Config::load(&path).unwrap().op_timeout, timeout);
        }

        let content = Config::new()
            .with_timeout(Duration::from_millis(1500))
            .to_yaml_string()
            .unwrap();
        assert!(content.contains("op_timeout_secs: 1.5"));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        assert!(Config::from_yaml_str("op_timeout_secs: -1").is_err());
        assert_eq!(
            Config::from_yaml_str("op_timeout_secs: 0.25").unwrap().op_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Config::from_yaml_str("op_timeout_secs: [not a number]").is_err());
    }

    #[test]
    fn test_debug_hides_collaborators() {
        let config = Config::new().with_token_func(|_| Ok("secret-token".to_string()));
        let debug = format!("{:?}", config);
        assert!(debug.contains("op_token_func: true"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.ends_with("opkeyring/config.yaml"));
    }
}
