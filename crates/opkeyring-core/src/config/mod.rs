//! Keyring configuration
//!
//! - `Config`: the settings every vault backend reads, loadable from YAML
//! - `ConfigError` / `ConfigErrors`: single and aggregated validation failures

mod error;
mod settings;

pub use error::{ConfigError, ConfigErrors, ConfigResult};
pub use settings::{Config, PromptFunc};
