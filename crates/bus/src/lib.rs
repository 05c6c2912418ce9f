//! Keyed query registry with synchronous publish/subscribe.
//!
//! Invariants:
//! - Subscribers of a key are notified in subscription order, synchronously,
//!   before `set_query` returns.
//! - A subscriber removed during a notification round is not called for the
//!   rest of that round.
//! - A subscriber that is already running is never re-entered; a nested
//!   `set_query` that would reach it skips it with a warning.
//! - The latest value and options per key are kept until `dispose`.

use core_types::QueryKey;
use normalize::{HighlightOptions, NormalizationEngine, NormalizeError, NormalizerStep};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

pub type QueryCallback = dyn FnMut(&str, &HighlightOptions);

type SharedCallback = Rc<RefCell<Box<QueryCallback>>>;

struct Subscriber {
    id: u64,
    callback: SharedCallback,
}

#[derive(Default)]
struct StoreState {
    values: HashMap<QueryKey, String>,
    options: HashMap<QueryKey, HighlightOptions>,
    subscribers: HashMap<QueryKey, Vec<Subscriber>>,
    next_id: u64,
}

impl StoreState {
    fn is_subscribed(&self, key: &str, id: u64) -> bool {
        self.subscribers
            .get(key)
            .is_some_and(|subs| subs.iter().any(|s| s.id == id))
    }
}

struct Shared {
    state: RefCell<StoreState>,
    normalizer: NormalizationEngine,
}

/// Cheaply cloneable handle to one store. Construct one per application (or
/// per isolated UI region) and hand clones to every source and target.
#[derive(Clone)]
pub struct QueryStore {
    shared: Rc<Shared>,
}

impl QueryStore {
    pub fn new() -> Self {
        Self::with_normalizer(NormalizationEngine::new())
    }

    pub fn with_normalizer(normalizer: NormalizationEngine) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(StoreState::default()),
                normalizer,
            }),
        }
    }

    /// The normalization engine owned by this store.
    pub fn normalizer(&self) -> &NormalizationEngine {
        &self.shared.normalizer
    }

    /// Registers a normalizer preset available to every binding on this store.
    pub fn register_normalizer_preset(
        &self,
        name: &str,
        steps: Vec<NormalizerStep>,
    ) -> Result<(), NormalizeError> {
        self.shared.normalizer.register_preset(name, steps)
    }

    /// Stores `value` (and `options`, when given) for `key` and notifies its
    /// subscribers. Without `options` the key keeps its previous options.
    pub fn set_query(
        &self,
        key: impl Into<QueryKey>,
        value: &str,
        options: Option<HighlightOptions>,
    ) {
        let key = key.into();
        let (options, callbacks) = {
            let mut state = self.shared.state.borrow_mut();
            state.values.insert(key.clone(), value.to_string());
            let options = match options {
                Some(options) => options,
                None => state.options.get(&key).cloned().unwrap_or_default(),
            };
            state.options.insert(key.clone(), options.clone());
            let callbacks: Vec<(u64, SharedCallback)> = state
                .subscribers
                .get(&key)
                .map(|subs| {
                    subs.iter()
                        .map(|s| (s.id, Rc::clone(&s.callback)))
                        .collect()
                })
                .unwrap_or_default();
            (options, callbacks)
        };
        log::trace!(
            target: "bus",
            "set_query {key} = {value:?} ({} subscribers)",
            callbacks.len()
        );

        for (id, callback) in callbacks {
            if !self.shared.state.borrow().is_subscribed(key.as_str(), id) {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => callback(value, &options),
                Err(_) => log::warn!(
                    target: "bus",
                    "subscriber {id} of '{key}' is still running; nested notification skipped"
                ),
            }
        }
    }

    pub fn get_query(&self, key: &str) -> Option<String> {
        self.shared.state.borrow().values.get(key).cloned()
    }

    pub fn get_query_options(&self, key: &str) -> Option<HighlightOptions> {
        self.shared.state.borrow().options.get(key).cloned()
    }

    /// Adds `callback` to `key`'s subscribers. Dropping the returned
    /// [`Subscription`] does not unsubscribe; call
    /// [`Subscription::unsubscribe`].
    pub fn subscribe_query(
        &self,
        key: impl Into<QueryKey>,
        callback: impl FnMut(&str, &HighlightOptions) + 'static,
    ) -> Subscription {
        let key = key.into();
        let mut state = self.shared.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state
            .subscribers
            .entry(key.clone())
            .or_default()
            .push(Subscriber {
                id,
                callback: Rc::new(RefCell::new(Box::new(callback))),
            });
        Subscription {
            shared: Rc::downgrade(&self.shared),
            key,
            id,
            active: Cell::new(true),
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.shared
            .state
            .borrow()
            .subscribers
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Keys that have ever been set, sorted.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.shared.state.borrow().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drops every value, option set and subscriber, and clears the
    /// normalization cache. Subscription ids keep counting up, so handles from
    /// before the dispose never match a later subscriber.
    pub fn dispose(&self) {
        let dropped = {
            let mut state = self.shared.state.borrow_mut();
            let next_id = state.next_id;
            let dropped = std::mem::take(&mut *state);
            state.next_id = next_id;
            dropped
        };
        // Callbacks may own store handles; drop them outside the borrow.
        drop(dropped);
        self.shared.normalizer.clear_cache();
        log::debug!(target: "bus", "query store disposed");
    }
}

impl Default for QueryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`QueryStore::subscribe_query`].
pub struct Subscription {
    shared: Weak<Shared>,
    key: QueryKey,
    id: u64,
    active: Cell<bool>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// `false` once unsubscribed or dropped by [`QueryStore::dispose`].
    pub fn is_active(&self) -> bool {
        self.active.get()
            && self.shared.upgrade().is_some_and(|shared| {
                shared
                    .state
                    .borrow()
                    .is_subscribed(self.key.as_str(), self.id)
            })
    }

    /// Removes exactly this subscription. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let removed = {
            let mut state = shared.state.borrow_mut();
            let Some(subs) = state.subscribers.get_mut(self.key.as_str()) else {
                return;
            };
            let removed = subs
                .iter()
                .position(|s| s.id == self.id)
                .map(|pos| subs.remove(pos));
            if subs.is_empty() {
                state.subscribers.remove(self.key.as_str());
            }
            removed
        };
        drop(removed);
    }
}
