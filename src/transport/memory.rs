//! In-memory linked transport pair.
//!
//! Simulates a host/window process pairing inside one process: emitting on one
//! half invokes the handlers registered on the other half, synchronously and
//! in order. Handlers are invoked outside the registry lock so they may emit
//! back (the get-value request/response exchange relies on this).

use super::{Handler, HandlerId, Payload, Transport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type SharedHandler = Arc<dyn Fn(Payload) + Send + Sync>;

pub struct MemoryTransport {
    label: &'static str,
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(HandlerId, SharedHandler)>>>,
    peer: Mutex<Weak<MemoryTransport>>,
}

/// Build a linked transport pair: `(host, window)`.
pub fn pair() -> (Arc<MemoryTransport>, Arc<MemoryTransport>) {
    let host = Arc::new(MemoryTransport::unlinked("host"));
    let window = Arc::new(MemoryTransport::unlinked("window"));
    *lock(&host.peer) = Arc::downgrade(&window);
    *lock(&window.peer) = Arc::downgrade(&host);
    (host, window)
}

impl MemoryTransport {
    fn unlinked(label: &'static str) -> Self {
        Self {
            label,
            next_id: AtomicU64::new(0),
            handlers: Mutex::new(HashMap::new()),
            peer: Mutex::new(Weak::new()),
        }
    }

    /// Number of live subscriptions for `event`, across all handlers.
    pub fn handler_count(&self, event: &str) -> usize {
        lock(&self.handlers).get(event).map_or(0, Vec::len)
    }
}

impl Transport for MemoryTransport {
    fn on(&self, event: &str, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.handlers)
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::from(handler)));
        id
    }

    fn emit(&self, event: &str, payload: Payload) {
        let Some(peer) = lock(&self.peer).upgrade() else {
            tracing::trace!(from = self.label, event, "emit dropped, no peer");
            return;
        };
        // Snapshot the handler list so a handler may subscribe/emit reentrantly.
        let targets: Vec<SharedHandler> = lock(&peer.handlers)
            .get(event)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in targets {
            handler(payload.clone());
        }
    }

    fn off(&self, event: &str, id: HandlerId) {
        let mut handlers = lock(&self.handlers);
        if let Some(hs) = handlers.get_mut(event) {
            hs.retain(|(hid, _)| *hid != id);
            if hs.is_empty() {
                handlers.remove(event);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
