//! Interval producers: optional host-driven polling for a channel.
//!
//! A spec carries one optional producer per operation kind. Each tick routes
//! producer output through the channel's regular mutator paths, so interval
//! updates get the same endpoint tagging and delta semantics as caller
//! updates. At most one timer per channel; installing a new spec cancels the
//! previous one.

use super::{lock, ChannelCore};
use serde_json::Value as Json;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::wire::Entry;

type FullProducer = Arc<dyn Fn() -> Json + Send + Sync>;
type ItemsProducer = Arc<dyn Fn() -> Vec<Json> + Send + Sync>;
type EntriesProducer = Arc<dyn Fn() -> Vec<(String, Json)> + Send + Sync>;
type KeysProducer = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// Producer callbacks keyed by operation kind, plus the tick period.
///
/// ```no_run
/// # use std::time::Duration;
/// # use winchan::IntervalSpec;
/// let spec = IntervalSpec::every(Duration::from_secs(2))
///     .full(|| serde_json::json!({"load": 0.3}));
/// ```
#[derive(Clone)]
pub struct IntervalSpec {
    pub(crate) period: Duration,
    pub(crate) full: Option<FullProducer>,
    pub(crate) append: Option<ItemsProducer>,
    pub(crate) remove: Option<ItemsProducer>,
    pub(crate) set: Option<EntriesProducer>,
    pub(crate) delete: Option<KeysProducer>,
}

impl IntervalSpec {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            full: None,
            append: None,
            remove: None,
            set: None,
            delete: None,
        }
    }

    /// Full-value replacement, forwarded through `set_value`. Also applied
    /// once immediately when the spec is installed.
    pub fn full(mut self, f: impl Fn() -> Json + Send + Sync + 'static) -> Self {
        self.full = Some(Arc::new(f));
        self
    }

    /// Array-append delta per tick; an empty batch emits nothing.
    pub fn append(mut self, f: impl Fn() -> Vec<Json> + Send + Sync + 'static) -> Self {
        self.append = Some(Arc::new(f));
        self
    }

    /// Array-remove delta per tick; an empty batch emits nothing.
    pub fn remove(mut self, f: impl Fn() -> Vec<Json> + Send + Sync + 'static) -> Self {
        self.remove = Some(Arc::new(f));
        self
    }

    /// Object-set delta per tick; unchanged entries are skipped as usual.
    pub fn set(mut self, f: impl Fn() -> Vec<(String, Json)> + Send + Sync + 'static) -> Self {
        self.set = Some(Arc::new(f));
        self
    }

    /// Object-delete delta per tick.
    pub fn delete(mut self, f: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        self.delete = Some(Arc::new(f));
        self
    }
}

/// Cancel any existing timer for the channel, apply the spec's immediate full
/// value if present, then arm the tick task.
pub(crate) fn install(core: &Arc<ChannelCore>, spec: IntervalSpec) {
    if let Some(previous) = lock(&core.timer).take() {
        previous.abort();
    }
    if core.is_disposed() {
        return;
    }
    if let Some(full) = &spec.full {
        core.set_value_json(full());
    }
    arm(core, spec);
}

/// Arm the tick task without touching the current value; the caller has
/// already seeded or applied it (channel construction seeds the cell from the
/// full producer silently, before any wire subscription exists).
///
/// Requires a running tokio runtime; without one the timer is skipped with a
/// warning.
pub(crate) fn arm(core: &Arc<ChannelCore>, spec: IntervalSpec) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(channel = %core.name(), "no tokio runtime, interval producer not armed");
        return;
    };

    let weak = Arc::downgrade(core);
    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(spec.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of `interval` completes immediately; the current
        // value already covers it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !tick(&weak, &spec) {
                break;
            }
        }
    });
    let mut slot = lock(&core.timer);
    if core.is_disposed() {
        handle.abort();
        return;
    }
    *slot = Some(handle);
}

/// One producer round. Returns false once the channel is gone.
fn tick(core: &Weak<ChannelCore>, spec: &IntervalSpec) -> bool {
    let Some(core) = core.upgrade() else {
        return false;
    };
    if core.is_disposed() {
        return false;
    }

    if let Some(full) = &spec.full {
        core.set_value_json(full());
    }
    if let Some(append) = &spec.append {
        if let Err(err) = core.append_json(append()) {
            tracing::error!(channel = %core.name(), %err, "interval append rejected");
        }
    }
    if let Some(remove) = &spec.remove {
        if let Err(err) = core.remove_json(remove()) {
            tracing::error!(channel = %core.name(), %err, "interval remove rejected");
        }
    }
    if let Some(set) = &spec.set {
        let entries = set()
            .into_iter()
            .map(|(key, value)| Entry { key, value })
            .collect();
        if let Err(err) = core.set_entries(entries) {
            tracing::error!(channel = %core.name(), %err, "interval set rejected");
        }
    }
    if let Some(delete) = &spec.delete {
        if let Err(err) = core.delete_keys(delete()) {
            tracing::error!(channel = %core.name(), %err, "interval delete rejected");
        }
    }
    true
}
