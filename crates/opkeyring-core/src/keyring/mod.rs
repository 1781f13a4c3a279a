//! The keyring contract, backend identifiers and the backend registry

mod backend;
mod registry;
mod traits;

pub use backend::BackendType;
pub use registry::{BackendDefinition, BackendRegistry, KeyringOpener};
pub use traits::{Keyring, KeyringError, KeyringResult};
