//! Host-side group registry.
//!
//! Maps window types to their channel bundles, populated lazily from window
//! lifecycle notifications: first creation constructs the bundle via its
//! registered factory, recreation rebinds the existing bundle to the new
//! window id, and close disposes the bundle when it asked for that.

use super::WindowChannels;
use crate::channel::lock;
use crate::context::{EndpointId, SyncContext};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type GroupFactory =
    Arc<dyn Fn(&SyncContext, EndpointId) -> Result<Arc<dyn WindowChannels>> + Send + Sync>;

/// Lives for the host process; entries live from first window creation until
/// disposal on close (or process exit).
#[derive(Default)]
pub struct GroupRegistry {
    factories: Mutex<HashMap<String, GroupFactory>>,
    groups: Mutex<HashMap<String, Arc<dyn WindowChannels>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for one window type.
    pub fn register<F>(&self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&SyncContext, EndpointId) -> Result<Arc<dyn WindowChannels>> + Send + Sync + 'static,
    {
        lock(&self.factories).insert(kind.into(), Arc::new(factory));
    }

    /// Window-created notification: construct the bundle on first sight,
    /// rebind it on recreation. Kinds without a registered factory are
    /// skipped.
    pub fn window_created(
        &self,
        ctx: &SyncContext,
        kind: &str,
        window_id: EndpointId,
    ) -> Result<()> {
        if let Some(existing) = lock(&self.groups).get(kind) {
            existing.group().update_window_id(window_id);
            return Ok(());
        }
        // Clone the factory out so it runs without the lock; a constructor
        // may register further window types.
        let factory = {
            let factories = lock(&self.factories);
            match factories.get(kind) {
                Some(factory) => Arc::clone(factory),
                None => {
                    tracing::debug!(kind, "no channel group registered for window type");
                    return Ok(());
                }
            }
        };
        let group = factory(ctx, window_id)?;
        lock(&self.groups).insert(kind.to_string(), group);
        Ok(())
    }

    /// Window-closed notification: dispose and drop the bundle when it is
    /// marked for disposal, otherwise keep it alive across recreation.
    pub fn window_closed(&self, kind: &str) {
        let removed = {
            let mut groups = lock(&self.groups);
            match groups.get(kind) {
                Some(group) if group.group().dispose_on_close() => groups.remove(kind),
                _ => None,
            }
        };
        if let Some(group) = removed {
            group.group().dispose();
        }
    }

    /// Look up the bundle for `kind`. Missing bundles are a caller bug, not a
    /// recoverable condition.
    pub fn get(&self, kind: &str) -> Result<Arc<dyn WindowChannels>> {
        lock(&self.groups)
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::GroupNotFound(kind.to_string()))
    }

    /// Like [`GroupRegistry::get`], downcast to the concrete bundle type.
    pub fn get_as<T: WindowChannels>(&self, kind: &str) -> Result<Arc<T>> {
        self.get(kind)?
            .as_any()
            .downcast::<T>()
            .map_err(|_| Error::GroupTypeMismatch(kind.to_string()))
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let groups = lock(&self.groups);
        f.debug_struct("GroupRegistry")
            .field("kinds", &groups.keys().collect::<Vec<_>>())
            .finish()
    }
}
