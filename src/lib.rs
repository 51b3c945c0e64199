//! winchan - replicated state channels between a host process and its
//! window processes.
//!
//! A [`Channel`] keeps a named, typed value consistent across two processes
//! that can only exchange fire-and-forget named messages. Either side may
//! mutate through the typed operations; the peer converges after delivery.
//!
//! ```text
//! host process                               window process
//! +---------------------+   wire events   +---------------------+
//! | SyncContext (resp.) | <-------------> | SyncContext (req.)  |
//! |  Channel "cpu"      |   {windowId}    |  Channel "cpu"      |
//! |  Channel "dirs"     |                 |  Channel "dirs"     |
//! |  GroupRegistry      |                 |                     |
//! +---------------------+                 +---------------------+
//! ```
//!
//! Bootstrap: a requester-side channel fires a get-value request on creation
//! and keeps its initial value until (and unless) the responder answers.
//! Arrays and keyed objects propagate incremental deltas instead of full
//! values; `flush()` forces a full resync. Channels scoped to one window are
//! bundled in a [`ChannelGroup`] so the bundle follows the window through
//! recreation and tears down with it.
//!
//! Not a consensus protocol, not a CRDT, not a durable log: delivery is
//! assumed in-order and at-most-once per event name, lost messages leave the
//! peer stale until the next mutation or flush, and simultaneous writes on
//! both ends resolve last-write-wins.

pub mod channel;
pub mod context;
pub mod error;
pub mod group;
pub mod transport;

pub use channel::cell::{ValueCell, WatchCell};
pub use channel::interval::IntervalSpec;
pub use channel::wire::{Entry, WireEvents};
pub use channel::{ArrayValue, Channel, InitValue, ObjectValue};
pub use context::{EndpointId, Role, SyncContext};
pub use error::{Error, Result};
pub use group::registry::GroupRegistry;
pub use group::{ChannelGroup, WindowChannels};
pub use transport::{Handler, HandlerId, Payload, Transport};
