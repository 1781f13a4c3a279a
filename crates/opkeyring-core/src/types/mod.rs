//! Core value types shared by all keyring backends

mod item;

pub use item::{Item, Metadata};
