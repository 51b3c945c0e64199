//! Replicated state channels.
//!
//! A `Channel<V>` keeps one named value consistent between the host process
//! and a window process over a fire-and-forget transport:
//!
//! ```text
//! +--------------+  mutator   +------------+  wire event  +------------+
//! | caller (A)   | ---------> | cell (A)   | -----------> | cell (B)   |
//! |              |            | + emit     |   payload    | apply only |
//! +--------------+            +------------+  {windowId}  +------------+
//! ```
//!
//! Either side may mutate; every local mutation updates the cell
//! synchronously and emits a delta tagged with the channel's endpoint id. The
//! peer applies the delta without re-emitting, so there is no echo.
//! Concurrent writers on both ends converge last-write-wins with no conflict
//! detection; designate one side as sole writer when that matters.

pub mod cell;
pub mod interval;
pub mod wire;

use crate::context::{EndpointId, Role, SyncContext};
use crate::error::{Error, Result};
use crate::transport::{HandlerId, Payload, Transport};
use cell::{ValueCell, WatchCell};
use interval::IntervalSpec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use wire::{Entry, WireEvents};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Initial value for a channel: a literal, a producer called once, or an
/// interval spec (see [`IntervalSpec`]). An interval spec must carry a full
/// producer; its first output seeds the value silently, then the timer is
/// armed.
pub enum InitValue<V> {
    Value(V),
    Producer(Box<dyn FnOnce() -> V + Send>),
    Interval(IntervalSpec),
}

impl<V> InitValue<V> {
    pub fn producer(f: impl FnOnce() -> V + Send + 'static) -> Self {
        InitValue::Producer(Box::new(f))
    }
}

// =============================================================================
// Untyped core
// =============================================================================

/// Shared state behind every `Channel` handle. Holds the value as JSON; the
/// typed facade (de)serializes at the boundary.
pub(crate) struct ChannelCore {
    name: String,
    role: Role,
    endpoint: AtomicI64,
    events: WireEvents,
    cell: Arc<dyn ValueCell>,
    transport: Arc<dyn Transport>,
    pub(crate) timer: Mutex<Option<JoinHandle<()>>>,
    subs: Mutex<Vec<(String, HandlerId)>>,
    disposed: AtomicBool,
    reservations: Arc<Mutex<HashSet<(String, EndpointId)>>>,
}

impl ChannelCore {
    pub(crate) fn endpoint_id(&self) -> EndpointId {
        EndpointId(self.endpoint.load(Ordering::SeqCst))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    /// Rebind this channel to a new endpoint id (window recreated). Wire
    /// names stay as-is; only the payload tag and receive filter change.
    pub(crate) fn set_endpoint(&self, new: EndpointId) {
        let old = self.endpoint_id();
        if old == new {
            return;
        }
        {
            let mut reservations = lock(&self.reservations);
            reservations.remove(&(self.name.clone(), old));
            if !reservations.insert((self.name.clone(), new)) {
                tracing::warn!(
                    channel = %self.name,
                    endpoint = %new,
                    "endpoint rebind collides with a live channel of the same name"
                );
            }
        }
        self.endpoint.store(new.0, Ordering::SeqCst);
    }

    /// Tear down: cancel the interval timer, drop every wire subscription,
    /// release the name reservation. Receipt after this point is a no-op.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
        for (event, id) in lock(&self.subs).drain(..) {
            self.transport.off(&event, id);
        }
        lock(&self.reservations).remove(&(self.name.clone(), self.endpoint_id()));
        tracing::debug!(channel = %self.name, "channel disposed");
    }

    fn emit(&self, event: &str, value: Option<Json>) {
        if self.is_disposed() {
            return;
        }
        tracing::trace!(channel = %self.name, event, "emit");
        self.transport
            .emit(event, Payload::new(value, self.endpoint_id()));
    }

    // -------------------------------------------------------------------------
    // Local mutators: apply + emit delta
    // -------------------------------------------------------------------------

    pub(crate) fn set_value_json(&self, value: Json) {
        if self.cell.get() == value {
            return;
        }
        self.cell.set(value.clone());
        self.emit(&self.events.sync, Some(value));
    }

    pub(crate) fn flush(&self) {
        self.emit(&self.events.sync, Some(self.cell.get()));
    }

    pub(crate) fn append_json(&self, items: Vec<Json>) -> Result<()> {
        self.ensure_live()?;
        if items.is_empty() {
            return Ok(());
        }
        self.apply_append(&items)?;
        self.emit(&self.events.append, Some(Json::Array(items)));
        Ok(())
    }

    pub(crate) fn append_no_repeat_json(&self, items: Vec<Json>) -> Result<()> {
        self.ensure_live()?;
        if items.is_empty() {
            return Ok(());
        }
        let current = self.cell.get();
        let existing = current.as_array().ok_or(Error::NotAnArray)?;
        let mut added: Vec<Json> = Vec::new();
        for item in items {
            if existing.contains(&item) || added.contains(&item) {
                continue;
            }
            added.push(item);
        }
        if added.is_empty() {
            return Ok(());
        }
        self.apply_append(&added)?;
        self.emit(&self.events.append, Some(Json::Array(added)));
        Ok(())
    }

    pub(crate) fn remove_json(&self, items: Vec<Json>) -> Result<()> {
        self.ensure_live()?;
        if items.is_empty() {
            return Ok(());
        }
        self.apply_remove(&items)?;
        self.emit(&self.events.remove, Some(Json::Array(items)));
        Ok(())
    }

    pub(crate) fn set_entries(&self, entries: Vec<Entry>) -> Result<()> {
        self.ensure_live()?;
        if entries.is_empty() {
            return Ok(());
        }
        let current = self.cell.get();
        let object = current.as_object().ok_or(Error::NotAnObject)?;
        let changed: Vec<Entry> = entries
            .into_iter()
            .filter(|entry| object.get(&entry.key) != Some(&entry.value))
            .collect();
        if changed.is_empty() {
            return Ok(());
        }
        self.apply_set(&changed)?;
        let wire = serde_json::to_value(&changed)?;
        self.emit(&self.events.set, Some(wire));
        Ok(())
    }

    pub(crate) fn delete_keys(&self, keys: Vec<String>) -> Result<()> {
        self.ensure_live()?;
        if keys.is_empty() {
            return Ok(());
        }
        let current = self.cell.get();
        let object = current.as_object().ok_or(Error::NotAnObject)?;
        let present: Vec<String> = keys
            .into_iter()
            .filter(|key| object.contains_key(key))
            .collect();
        if present.is_empty() {
            return Ok(());
        }
        self.apply_delete(&present)?;
        self.emit(&self.events.delete, Some(serde_json::to_value(&present)?));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Receive-side application: mutate the cell, never re-emit
    // -------------------------------------------------------------------------

    fn apply_sync(&self, value: Json) {
        self.cell.set(value);
    }

    fn apply_append(&self, items: &[Json]) -> Result<()> {
        let mut current = self.cell.get();
        let array = current.as_array_mut().ok_or(Error::NotAnArray)?;
        array.extend(items.iter().cloned());
        self.cell.set(current);
        Ok(())
    }

    /// Removes the first occurrence of each item.
    fn apply_remove(&self, items: &[Json]) -> Result<()> {
        let mut current = self.cell.get();
        let array = current.as_array_mut().ok_or(Error::NotAnArray)?;
        for item in items {
            if let Some(pos) = array.iter().position(|existing| existing == item) {
                array.remove(pos);
            }
        }
        self.cell.set(current);
        Ok(())
    }

    fn apply_set(&self, entries: &[Entry]) -> Result<()> {
        let mut current = self.cell.get();
        let object = current.as_object_mut().ok_or(Error::NotAnObject)?;
        for entry in entries {
            object.insert(entry.key.clone(), entry.value.clone());
        }
        self.cell.set(current);
        Ok(())
    }

    fn apply_delete(&self, keys: &[String]) -> Result<()> {
        let mut current = self.cell.get();
        let object = current.as_object_mut().ok_or(Error::NotAnObject)?;
        for key in keys {
            object.remove(key);
        }
        self.cell.set(current);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Wire event handlers
    // -------------------------------------------------------------------------

    fn subscribe_all(this: &Arc<Self>) {
        let hooks: [(&str, fn(&ChannelCore, Payload)); 7] = [
            (&this.events.request, ChannelCore::on_request),
            (&this.events.response, ChannelCore::on_sync_value),
            (&this.events.sync, ChannelCore::on_sync_value),
            (&this.events.append, ChannelCore::on_append),
            (&this.events.remove, ChannelCore::on_remove),
            (&this.events.set, ChannelCore::on_set),
            (&this.events.delete, ChannelCore::on_delete),
        ];
        let mut registered = Vec::with_capacity(hooks.len());
        for (event, apply) in hooks {
            let weak = Arc::downgrade(this);
            let id = this.transport.on(
                event,
                Box::new(move |payload| {
                    let Some(core) = weak.upgrade() else { return };
                    if core.is_disposed() {
                        return;
                    }
                    apply(&core, payload);
                }),
            );
            registered.push((event.to_string(), id));
        }
        *lock(&this.subs) = registered;
    }

    /// True when the payload targets this replica's endpoint. Mismatches are
    /// normal operation (another window's traffic), not failures.
    fn accepts(&self, payload: &Payload) -> bool {
        if payload.window_id == self.endpoint_id() {
            return true;
        }
        tracing::trace!(
            channel = %self.name,
            got = %payload.window_id,
            own = %self.endpoint_id(),
            "payload dropped, endpoint mismatch"
        );
        false
    }

    fn on_request(&self, payload: Payload) {
        if !self.accepts(&payload) || self.role != Role::Responder {
            return;
        }
        // Echo the requester's id so only that requester applies the value.
        self.transport.emit(
            &self.events.response,
            Payload::new(Some(self.cell.get()), payload.window_id),
        );
    }

    fn on_sync_value(&self, payload: Payload) {
        if !self.accepts(&payload) {
            return;
        }
        self.apply_sync(payload.value.unwrap_or(Json::Null));
    }

    fn on_append(&self, payload: Payload) {
        if !self.accepts(&payload) {
            return;
        }
        match payload.value {
            Some(Json::Array(items)) => {
                if let Err(err) = self.apply_append(&items) {
                    tracing::error!(channel = %self.name, %err, "append rejected");
                }
            }
            other => {
                tracing::error!(channel = %self.name, ?other, "malformed append payload")
            }
        }
    }

    fn on_remove(&self, payload: Payload) {
        if !self.accepts(&payload) {
            return;
        }
        match payload.value {
            Some(Json::Array(items)) => {
                if let Err(err) = self.apply_remove(&items) {
                    tracing::error!(channel = %self.name, %err, "remove rejected");
                }
            }
            other => {
                tracing::error!(channel = %self.name, ?other, "malformed remove payload")
            }
        }
    }

    fn on_set(&self, payload: Payload) {
        if !self.accepts(&payload) {
            return;
        }
        let entries: Vec<Entry> =
            match serde_json::from_value(payload.value.unwrap_or(Json::Null)) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::error!(channel = %self.name, %err, "malformed set payload");
                    return;
                }
            };
        if let Err(err) = self.apply_set(&entries) {
            tracing::error!(channel = %self.name, %err, "set rejected");
        }
    }

    fn on_delete(&self, payload: Payload) {
        if !self.accepts(&payload) {
            return;
        }
        let keys: Vec<String> = match serde_json::from_value(payload.value.unwrap_or(Json::Null)) {
            Ok(keys) => keys,
            Err(err) => {
                tracing::error!(channel = %self.name, %err, "malformed delete payload");
                return;
            }
        };
        if let Err(err) = self.apply_delete(&keys) {
            tracing::error!(channel = %self.name, %err, "delete rejected");
        }
    }
}

// =============================================================================
// Typed facade
// =============================================================================

/// Marker for channels whose value is a JSON array; `Item` is the element
/// type accepted by the array mutators.
pub trait ArrayValue {
    type Item: Serialize + DeserializeOwned;
}

impl<T: Serialize + DeserializeOwned> ArrayValue for Vec<T> {
    type Item = T;
}

/// Dynamic channels accept any JSON item; array-ness is checked at runtime.
impl ArrayValue for Json {
    type Item = Json;
}

/// Marker for channels whose value is a JSON object; `Field` is the value
/// type accepted by the object mutators.
pub trait ObjectValue {
    type Field: Serialize + DeserializeOwned;
}

impl<F: Serialize + DeserializeOwned> ObjectValue for HashMap<String, F> {
    type Field = F;
}

/// Dynamic channels accept any JSON field; object-ness is checked at runtime.
impl ObjectValue for Json {
    type Field = Json;
}

/// A named, typed replicated value. Cheap-to-clone handle over shared state;
/// all clones address the same replica.
///
/// Mutate only through the typed operations so every local change is paired
/// with propagation; treat [`Channel::value`] as read-only.
pub struct Channel<V> {
    core: Arc<ChannelCore>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Channel<V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _marker: PhantomData,
        }
    }
}

impl<V: Serialize + DeserializeOwned> Channel<V> {
    pub(crate) fn create(
        ctx: &SyncContext,
        name: &str,
        init: InitValue<V>,
        endpoint: EndpointId,
    ) -> Result<Channel<V>> {
        let (initial, interval_spec) = match init {
            InitValue::Value(value) => (serde_json::to_value(value)?, None),
            InitValue::Producer(produce) => (serde_json::to_value(produce())?, None),
            // Seed from the full producer so the cell never holds an
            // undefined value; the timer takes over from there.
            InitValue::Interval(spec) => match &spec.full {
                Some(full) => (full(), Some(spec)),
                None => return Err(Error::IntervalWithoutFull),
            },
        };

        {
            let mut reservations = lock(ctx.reservations());
            if !reservations.insert((name.to_string(), endpoint)) {
                return Err(Error::NameConflict(name.to_string()));
            }
        }

        let core = Arc::new(ChannelCore {
            name: name.to_string(),
            role: ctx.role(),
            endpoint: AtomicI64::new(endpoint.0),
            events: WireEvents::derive(name),
            cell: Arc::new(WatchCell::new(initial)),
            transport: Arc::clone(ctx.transport()),
            timer: Mutex::new(None),
            subs: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            reservations: Arc::clone(ctx.reservations()),
        });
        ChannelCore::subscribe_all(&core);

        // The requester bootstraps by asking the responder for its current
        // value. Fire-and-forget: with no responder listening yet the request
        // is simply dropped and the initial value stands.
        if ctx.role() == Role::Requester {
            core.transport
                .emit(&core.events.request, Payload::new(None, endpoint));
        }

        if let Some(spec) = interval_spec {
            interval::arm(&core, spec);
        }

        Ok(Channel {
            core,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Endpoint id this replica is currently scoped to.
    pub fn endpoint(&self) -> EndpointId {
        self.core.endpoint_id()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Result<V> {
        Ok(serde_json::from_value(self.core.cell.get())?)
    }

    /// Current value as raw JSON, without the typed decode.
    pub fn value_json(&self) -> Json {
        self.core.cell.get()
    }

    /// Replace the value and emit a full sync. No-op when the new value
    /// equals the current one.
    pub fn set_value(&self, value: &V) -> Result<()> {
        self.core.ensure_live()?;
        self.core.set_value_json(serde_json::to_value(value)?);
        Ok(())
    }

    /// Re-emit the full current value. Idempotent; use to force a resync,
    /// e.g. after a new peer subscribes.
    pub fn flush(&self) {
        self.core.flush();
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Install (or replace) the interval producer for this channel. See
    /// [`IntervalSpec`].
    pub fn set_interval_callback(&self, spec: IntervalSpec) {
        interval::install(&self.core, spec);
    }

    /// Subscribe to value changes, when the underlying cell supports it.
    pub fn watch(&self) -> Option<watch::Receiver<Json>> {
        self.core.cell.watch()
    }

    pub(crate) fn core(&self) -> &Arc<ChannelCore> {
        &self.core
    }
}

impl<V: ArrayValue + Serialize + DeserializeOwned> Channel<V> {
    /// Append items in place and emit only the delta.
    pub fn append<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = V::Item>,
    {
        self.core.append_json(encode_items(items)?)
    }

    /// Like [`Channel::append`], but skips items already present (value
    /// equality). Emits only the items actually added; emits nothing when
    /// every item was filtered.
    pub fn append_no_repeat<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = V::Item>,
    {
        self.core.append_no_repeat_json(encode_items(items)?)
    }

    /// Remove the first occurrence of each item and emit only the delta.
    pub fn remove<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = V::Item>,
    {
        self.core.remove_json(encode_items(items)?)
    }
}

impl<V: ObjectValue + Serialize + DeserializeOwned> Channel<V> {
    /// Set keys in place, skipping entries whose value is unchanged, and emit
    /// only the changed entries.
    pub fn set<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, V::Field)>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| {
                Ok(Entry {
                    key,
                    value: serde_json::to_value(value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.core.set_entries(entries)
    }

    /// Delete keys in place and emit only the keys that were present.
    pub fn delete<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        self.core.delete_keys(keys.into_iter().collect())
    }
}

fn encode_items<T: Serialize>(items: impl IntoIterator<Item = T>) -> Result<Vec<Json>> {
    items
        .into_iter()
        .map(|item| Ok(serde_json::to_value(item)?))
        .collect()
}

impl<V> std::fmt::Debug for Channel<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.core.name)
            .field("endpoint", &self.core.endpoint_id())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}
