//! Endpoint-scoped channel groups.
//!
//! Windows in the host application can be closed and recreated while
//! logically representing the same window type. A `ChannelGroup` bundles
//! every channel belonging to one such window so the bundle can be rebound to
//! the recreated window's endpoint id, or disposed, atomically.

pub mod registry;

use crate::channel::{lock, Channel, ChannelCore};
use crate::context::EndpointId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// A bundle of channels sharing one endpoint id.
///
/// Members are recorded explicitly via [`ChannelGroup::adopt`] at
/// construction time. Rebinding the group's endpoint id cascades to every
/// member.
pub struct ChannelGroup {
    kind: String,
    endpoint: Mutex<EndpointId>,
    members: Mutex<Vec<Arc<ChannelCore>>>,
    dispose_on_close: Mutex<bool>,
}

impl ChannelGroup {
    pub fn new(kind: impl Into<String>, endpoint: EndpointId) -> Self {
        Self {
            kind: kind.into(),
            endpoint: Mutex::new(endpoint),
            members: Mutex::new(Vec::new()),
            dispose_on_close: Mutex::new(false),
        }
    }

    /// Logical window type this group belongs to.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn endpoint(&self) -> EndpointId {
        *lock(&self.endpoint)
    }

    /// Whether the registry should dispose this group when its window
    /// closes. Off by default: groups survive window recreation, trading a
    /// small subscription cost for not losing in-flight state.
    pub fn dispose_on_close(&self) -> bool {
        *lock(&self.dispose_on_close)
    }

    pub fn set_dispose_on_close(&self, dispose: bool) {
        *lock(&self.dispose_on_close) = dispose;
    }

    /// Record a member channel. Call once per channel while constructing the
    /// owning bundle; members are expected to carry the group's endpoint id.
    pub fn adopt<V: Serialize + DeserializeOwned>(&self, channel: &Channel<V>) {
        debug_assert_eq!(channel.endpoint(), self.endpoint());
        lock(&self.members).push(Arc::clone(channel.core()));
    }

    pub fn member_count(&self) -> usize {
        lock(&self.members).len()
    }

    /// Rebind the group (and every member) to a recreated window's endpoint
    /// id. No-op when the id is unchanged.
    pub fn update_window_id(&self, new: EndpointId) {
        {
            let mut endpoint = lock(&self.endpoint);
            if *endpoint == new {
                return;
            }
            *endpoint = new;
        }
        for member in lock(&self.members).iter() {
            member.set_endpoint(new);
        }
        tracing::debug!(kind = %self.kind, endpoint = %new, "group rebound");
    }

    /// Dispose every member channel.
    pub fn dispose(&self) {
        for member in lock(&self.members).iter() {
            member.dispose();
        }
    }
}

impl std::fmt::Debug for ChannelGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelGroup")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint())
            .field("members", &self.member_count())
            .finish()
    }
}

/// A user-defined bundle of channels for one window type.
///
/// Implementors hold their `Channel` fields plus a [`ChannelGroup`] that
/// adopted each of them:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::any::Any;
/// # use winchan::{Channel, ChannelGroup, EndpointId, InitValue, SyncContext, WindowChannels};
/// struct PhotoChannels {
///     group: ChannelGroup,
///     directories: Channel<Vec<String>>,
/// }
///
/// impl PhotoChannels {
///     fn new(ctx: &SyncContext, window_id: EndpointId) -> winchan::Result<Self> {
///         let group = ChannelGroup::new("photo", window_id);
///         let directories = ctx.channel("directories", InitValue::Value(vec![]), window_id)?;
///         group.adopt(&directories);
///         Ok(Self { group, directories })
///     }
/// }
///
/// impl WindowChannels for PhotoChannels {
///     fn group(&self) -> &ChannelGroup {
///         &self.group
///     }
///     fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
///         self
///     }
/// }
/// ```
pub trait WindowChannels: Send + Sync + 'static {
    fn group(&self) -> &ChannelGroup;

    /// Hook for concrete downcasts from the registry; implement as `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InitValue;
    use crate::context::{Role, SyncContext};
    use crate::transport::memory;

    #[test]
    fn test_rebind_cascades_to_members() {
        let (host, _window) = memory::pair();
        let ctx = SyncContext::new(Role::Responder, host);

        let group = ChannelGroup::new("photo", EndpointId(1));
        let c1: Channel<i64> = ctx.channel("c1", InitValue::Value(0), EndpointId(1)).unwrap();
        let c2: Channel<i64> = ctx.channel("c2", InitValue::Value(0), EndpointId(1)).unwrap();
        group.adopt(&c1);
        group.adopt(&c2);

        group.update_window_id(EndpointId(2));
        assert_eq!(group.endpoint(), EndpointId(2));
        assert_eq!(c1.endpoint(), EndpointId(2));
        assert_eq!(c2.endpoint(), EndpointId(2));
    }

    #[test]
    fn test_rebind_same_id_is_noop() {
        let group = ChannelGroup::new("photo", EndpointId(1));
        group.update_window_id(EndpointId(1));
        assert_eq!(group.endpoint(), EndpointId(1));
    }

    #[test]
    fn test_dispose_disposes_members() {
        let (host, _window) = memory::pair();
        let ctx = SyncContext::new(Role::Responder, host);

        let group = ChannelGroup::new("photo", EndpointId(1));
        let chan: Channel<i64> = ctx.channel("c", InitValue::Value(0), EndpointId(1)).unwrap();
        group.adopt(&chan);

        group.dispose();
        assert!(chan.is_disposed());
    }
}
