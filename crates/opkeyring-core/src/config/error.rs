//! Configuration errors
//!
//! Keyring constructors never stop at the first problem: every missing or
//! invalid parameter is collected into a [`ConfigErrors`] so that a caller can
//! fix them all in one pass.

use thiserror::Error;

use crate::keyring::BackendType;

/// A single configuration problem
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to create a {backend} keyring: environment variable unset or empty: {var:?}")]
    EnvUnsetOrEmpty { backend: BackendType, var: String },

    #[error("Unable to create a {backend} keyring: timeout must be a non-zero duration")]
    TimeoutZero { backend: BackendType },

    #[error("Unable to create a {backend} client: token function is nil")]
    TokenFuncMissing { backend: BackendType },

    #[error("Unable to create a {backend} keyring: no items client connector configured")]
    ConnectorMissing { backend: BackendType },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Every configuration problem found while constructing a keyring
///
/// Displays as one line per problem.
#[derive(Error, Debug, Default)]
#[error("{}", join_lines(.0))]
pub struct ConfigErrors(Vec<ConfigError>);

fn join_lines(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl ConfigErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: ConfigError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was collected, otherwise `Err(self)`
    pub fn into_result(self) -> Result<(), ConfigErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ConfigError> for ConfigErrors {
    fn from(error: ConfigError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for ConfigErrors {
    type Item = ConfigError;
    type IntoIter = std::vec::IntoIter<ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
