//! Named value cell - the observable slot a channel writes into.
//!
//! The channel exclusively owns and mutates its cell; everything else treats
//! the exposed value as read-only and routes mutation through the channel's
//! typed operations so every local change is paired with propagation.

use serde_json::Value as Json;
use tokio::sync::watch;

/// A single mutable slot holding the channel's current value.
///
/// Assignment must be synchronous and visible on the next read. Change
/// broadcasting is optional; implementations that support it return a
/// receiver from [`ValueCell::watch`].
pub trait ValueCell: Send + Sync {
    /// Snapshot of the current value.
    fn get(&self) -> Json;

    /// Replace the current value.
    fn set(&self, value: Json);

    /// Subscribe to changes, when supported.
    fn watch(&self) -> Option<watch::Receiver<Json>> {
        None
    }
}

/// Stock cell backed by `tokio::sync::watch`, so UI code can await changes.
pub struct WatchCell {
    tx: watch::Sender<Json>,
}

impl WatchCell {
    pub fn new(value: Json) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }
}

impl ValueCell for WatchCell {
    fn get(&self) -> Json {
        self.tx.borrow().clone()
    }

    fn set(&self, value: Json) {
        self.tx.send_replace(value);
    }

    fn watch(&self) -> Option<watch::Receiver<Json>> {
        Some(self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_visible_on_next_read() {
        let cell = WatchCell::new(json!(0));
        cell.set(json!(5));
        assert_eq!(cell.get(), json!(5));
    }

    #[tokio::test]
    async fn test_watch_observes_changes() {
        let cell = WatchCell::new(json!("a"));
        let mut rx = cell.watch().unwrap();
        cell.set(json!("b"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), json!("b"));
    }
}
