//! Item and metadata value types exchanged with every keyring backend

use chrono::{DateTime, Utc};

/// A secret stored in a keyring under a caller-visible key
///
/// `data` is opaque to the keyring. Backends persist it byte-for-byte.
///
/// # Example
///
/// ```
/// use opkeyring_core::Item;
///
/// let item = Item::new("aws-session", b"secret".to_vec());
/// assert_eq!(item.key, "aws-session");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Item {
    /// Caller-visible identifier
    pub key: String,
    /// Opaque secret payload
    pub data: Vec<u8>,
}

impl Item {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }
}

// Payloads are secrets, only their size is printed
impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("data", &format!("[{} bytes]", self.data.len()))
            .finish()
    }
}

/// Best-effort metadata about a stored item
///
/// The default value (no modification time) is what backends return when
/// the underlying store cannot tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Last update time as reported by the underlying store
    pub modification_time: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn modified_at(time: DateTime<Utc>) -> Self {
        Self {
            modification_time: Some(time),
        }
    }

    /// Whether this is the zero value
    pub fn is_zero(&self) -> bool {
        self.modification_time.is_none()
    }
}
