//! Transport adapter boundary.
//!
//! The channel protocol only needs a fire-and-forget, named-message transport
//! between the two processes: subscribe, emit, unsubscribe. Delivery must be
//! in-order and at-most-once per event name; `emit` reaches the peer process
//! only, never the local handlers (the protocol relies on this to avoid echo).
//!
//! `memory` provides a linked in-process pair used by tests and local runs.
//! Bindings to a real IPC mechanism implement [`Transport`] once per process.

pub mod memory;

use crate::context::EndpointId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Message envelope for every wire event.
///
/// `window_id` is the endpoint id the message is scoped to; a receiver
/// discards any payload whose id does not equal its own current endpoint id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
    #[serde(rename = "windowId")]
    pub window_id: EndpointId,
}

impl Payload {
    pub fn new(value: Option<Json>, window_id: EndpointId) -> Self {
        Self { value, window_id }
    }
}

/// Handle returned by [`Transport::on`], identifying one subscription.
///
/// A host process can hold several same-named channels scoped to different
/// windows; unsubscribing by event name alone would tear all of them down, so
/// `off` takes the id of the exact handler to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

pub type Handler = Box<dyn Fn(Payload) + Send + Sync>;

/// Fire-and-forget named-message transport between two processes.
///
/// Contract: in-order, at-most-once delivery per event name within one
/// process pairing, no cross-delivery between event names, and no local
/// loop-back of emitted payloads. Transport failures are the implementation's
/// concern; the channel protocol has no retry or acknowledgment layer.
pub trait Transport: Send + Sync {
    /// Subscribe `handler` to `event`. Handlers for one event are invoked in
    /// subscription order.
    fn on(&self, event: &str, handler: Handler) -> HandlerId;

    /// Send `payload` to the peer process. Dropped silently when no peer is
    /// listening.
    fn emit(&self, event: &str, payload: Payload);

    /// Remove the single subscription identified by `id`.
    fn off(&self, event: &str, id: HandlerId);
}
