//! Wire event names for the channel protocol.
//!
//! Each channel derives its event names by suffixing a fixed protocol prefix
//! with its logical name. The endpoint id travels in the payload, never in
//! the event name, so rebinding a channel to a new window id does not require
//! resubscription.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub const GET_VALUE_REQUEST: &str = "getValue.request:";
pub const GET_VALUE_RESPONSE: &str = "getValue.response:";
pub const SYNC: &str = "_channel_sync_:";
pub const ARRAY_APPEND: &str = "appendArray:";
pub const ARRAY_REMOVE: &str = "removeArray:";
pub const OBJECT_SET: &str = "setObjectKeys:";
pub const OBJECT_DELETE: &str = "deleteObjectKeys:";

/// One `{key, value}` entry of an object-set delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Json,
}

/// The full set of wire event names for one channel.
#[derive(Debug, Clone)]
pub struct WireEvents {
    pub request: String,
    pub response: String,
    pub sync: String,
    pub append: String,
    pub remove: String,
    pub set: String,
    pub delete: String,
}

impl WireEvents {
    pub fn derive(name: &str) -> Self {
        Self {
            request: format!("{GET_VALUE_REQUEST}{name}"),
            response: format!("{GET_VALUE_RESPONSE}{name}"),
            sync: format!("{SYNC}{name}"),
            append: format!("{ARRAY_APPEND}{name}"),
            remove: format!("{ARRAY_REMOVE}{name}"),
            set: format!("{OBJECT_SET}{name}"),
            delete: format!("{OBJECT_DELETE}{name}"),
        }
    }

    /// Every event name, for bulk subscribe/unsubscribe.
    pub fn all(&self) -> [&str; 7] {
        [
            &self.request,
            &self.response,
            &self.sync,
            &self.append,
            &self.remove,
            &self.set,
            &self.delete,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_wire_names() {
        let events = WireEvents::derive("photo-list");
        assert_eq!(events.request, "getValue.request:photo-list");
        assert_eq!(events.response, "getValue.response:photo-list");
        assert_eq!(events.sync, "_channel_sync_:photo-list");
        assert_eq!(events.append, "appendArray:photo-list");
        assert_eq!(events.remove, "removeArray:photo-list");
        assert_eq!(events.set, "setObjectKeys:photo-list");
        assert_eq!(events.delete, "deleteObjectKeys:photo-list");
    }

    #[test]
    fn test_all_lists_every_event() {
        let events = WireEvents::derive("x");
        let all = events.all();
        assert_eq!(all.len(), 7);
        assert!(all.iter().all(|name| name.ends_with("x")));
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry = Entry {
            key: "brand".to_string(),
            value: serde_json::json!("AMD"),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"key": "brand", "value": "AMD"}));
    }
}
