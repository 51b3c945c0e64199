//! Process-level context for channel replication.
//!
//! One `SyncContext` per process side. It carries the transport handle, the
//! process role (host answers get-value requests, windows issue them) and the
//! channel name reservations for this process. Everything is passed down
//! explicitly; there is no process-wide registry.

use crate::channel::{Channel, InitValue};
use crate::error::Result;
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Identifies one process instance a channel replica is scoped to: the host,
/// or a specific window. Travels in every payload as `windowId`; receivers
/// discard payloads whose id does not match their own. Purely a filter, never
/// a routing address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub i64);

impl EndpointId {
    /// Sentinel id for the host process.
    pub const HOST: EndpointId = EndpointId(-1);
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for EndpointId {
    fn from(id: i64) -> Self {
        EndpointId(id)
    }
}

/// Which side of the bootstrap handshake this process plays.
///
/// The role is a property of the process, not of a channel: the host process
/// is the responder for every channel it holds, window processes are
/// requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Authoritative side. Answers get-value requests with its current value.
    Responder,
    /// Requesting side. Emits a get-value request on channel creation and
    /// keeps its initial value until (and unless) a response arrives.
    Requester,
}

/// Per-process context: role, transport, and channel name reservations.
///
/// Cheap to clone; clones share the same reservation table.
#[derive(Clone)]
pub struct SyncContext {
    role: Role,
    transport: Arc<dyn Transport>,
    reservations: Arc<Mutex<HashSet<(String, EndpointId)>>>,
}

impl SyncContext {
    pub fn new(role: Role, transport: Arc<dyn Transport>) -> Self {
        Self {
            role,
            transport,
            reservations: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn reservations(&self) -> &Arc<Mutex<HashSet<(String, EndpointId)>>> {
        &self.reservations
    }

    /// Create a channel scoped to `endpoint`.
    ///
    /// Subscribes the channel to its wire events and, in `Requester` role,
    /// fires the get-value request for the initial value. Fails with
    /// `NameConflict` if a live channel with the same name already exists in
    /// the same endpoint scope.
    pub fn channel<V>(
        &self,
        name: &str,
        init: InitValue<V>,
        endpoint: EndpointId,
    ) -> Result<Channel<V>>
    where
        V: Serialize + DeserializeOwned,
    {
        Channel::create(self, name, init, endpoint)
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_id_host_sentinel() {
        assert_eq!(EndpointId::HOST, EndpointId(-1));
        assert_ne!(EndpointId::HOST, EndpointId(0));
    }

    #[test]
    fn test_endpoint_id_serde_transparent() {
        let id = EndpointId(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: EndpointId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
