//! Backend identifiers

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::traits::KeyringError;

/// Identifies a keyring backend in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendType {
    /// Connect gateway (self-hosted REST proxy)
    #[serde(rename = "op-connect")]
    OpConnect,
    /// Desktop app integration
    #[serde(rename = "op-desktop")]
    OpDesktop,
    /// Service account, client built on first use
    #[serde(rename = "op")]
    OpServiceAccount,
    /// Service account, client built when the keyring is opened
    #[serde(rename = "op-standard")]
    OpStandard,
}

impl BackendType {
    pub const ALL: [BackendType; 4] = [
        BackendType::OpConnect,
        BackendType::OpDesktop,
        BackendType::OpServiceAccount,
        BackendType::OpStandard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::OpConnect => "op-connect",
            BackendType::OpDesktop => "op-desktop",
            BackendType::OpServiceAccount => "op",
            BackendType::OpStandard => "op-standard",
        }
    }

    /// Human-readable product name, used in error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendType::OpConnect => "1Password Connect",
            BackendType::OpDesktop => "1Password Desktop",
            BackendType::OpServiceAccount | BackendType::OpStandard => {
                "1Password Service Accounts"
            }
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BackendType {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendType::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| KeyringError::UnsupportedBackend(s.to_string()))
    }
}
