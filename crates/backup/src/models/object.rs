//! Opaque remote record

use serde_json::Value;

use super::Key;

/// A record returned by the remote API, kept verbatim
///
/// The payload is never interpreted beyond reading its key.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    pub key: Key,
    pub data: Value,
}

impl RemoteObject {
    pub fn new(key: impl Into<Key>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }

    /// Build from a raw API record, reading its `key` field
    ///
    /// Returns `None` for records without a string key.
    pub fn from_raw(data: Value) -> Option<Self> {
        let key = data.get("key")?.as_str()?.to_string();
        Some(Self {
            key: Key::new(key),
            data,
        })
    }
}
