//! The collection cache: the client's only copy of a server-owned list.
//!
//! A cache holds one [`Snapshot`] plus an `is_loading` flag. Snapshots are
//! never patched: every successful round-trip replaces the previous one, either
//! wholesale or, for paginated growth, by appending a page while taking the
//! aggregate, cursor and `has_more` from the newest response.
//!
//! State lives in a `tokio::sync::watch` channel so consumers can both read
//! the current value and await changes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::watch;

/// An authoritative view of (part of) a server collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T, A> {
    /// Entries in server order.
    pub items: Vec<T>,
    /// Collection-wide value computed by the server (total price, unread
    /// count). Trusted as-is.
    pub aggregate: A,
    /// How many server entries have been pulled into `items`.
    pub cursor: u64,
    /// Whether the last page was full.
    pub has_more: bool,
}

impl<T, A: Default> Default for Snapshot<T, A> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            aggregate: A::default(),
            cursor: 0,
            has_more: false,
        }
    }
}

impl<T, A> Snapshot<T, A> {
    /// A snapshot holding the whole collection.
    #[must_use]
    pub fn complete(items: Vec<T>, aggregate: A) -> Self {
        Self {
            cursor: items.len() as u64,
            items,
            aggregate,
            has_more: false,
        }
    }
}

/// How [`CollectionCache::replace`] combines a new snapshot with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Discard the current snapshot.
    Overwrite,
    /// Keep current items and add the new page after them.
    Append,
}

/// Current cache contents as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheState<T, A> {
    pub snapshot: Snapshot<T, A>,
    pub is_loading: bool,
}

/// Holds the current snapshot of one collection.
#[derive(Debug)]
pub struct CollectionCache<T, A> {
    state: watch::Sender<CacheState<T, A>>,
    in_flight: AtomicUsize,
    active: AtomicBool,
}

impl<T: Clone, A: Clone + Default> Default for CollectionCache<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, A: Clone + Default> CollectionCache<T, A> {
    /// Create an empty, active cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(CacheState {
                snapshot: Snapshot::default(),
                is_loading: false,
            }),
            in_flight: AtomicUsize::new(0),
            active: AtomicBool::new(true),
        }
    }

    /// Clone of the current state.
    #[must_use]
    pub fn view(&self) -> CacheState<T, A> {
        self.state.borrow().clone()
    }

    /// Run `f` against the current snapshot without cloning it.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Snapshot<T, A>) -> R) -> R {
        f(&self.state.borrow().snapshot)
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CacheState<T, A>> {
        self.state.subscribe()
    }

    /// Install `snapshot` as the new state.
    ///
    /// Returns `false` when the cache has been deactivated and the snapshot
    /// was dropped.
    pub fn replace(&self, snapshot: Snapshot<T, A>, mode: ReplaceMode) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_active() {
                return false;
            }
            match mode {
                ReplaceMode::Overwrite => state.snapshot = snapshot,
                ReplaceMode::Append => {
                    let Snapshot {
                        items,
                        aggregate,
                        cursor,
                        has_more,
                    } = snapshot;
                    state.snapshot.items.extend(items);
                    state.snapshot.aggregate = aggregate;
                    state.snapshot.cursor = cursor;
                    state.snapshot.has_more = has_more;
                }
            }
            true
        })
    }

    /// Overwrite the aggregate only. `items` and `cursor` are untouched.
    ///
    /// Returns `false` when the cache has been deactivated.
    pub fn set_aggregate(&self, aggregate: A) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_active() {
                return false;
            }
            state.snapshot.aggregate = aggregate;
            true
        })
    }

    /// Mark an operation as in flight until the returned guard drops.
    ///
    /// `is_loading` stays true while at least one guard is alive.
    #[must_use = "loading clears as soon as the guard is dropped"]
    pub fn begin_loading(&self) -> LoadingGuard<'_, T, A> {
        if self.in_flight.fetch_add(1, Ordering::AcqRel) == 0 {
            self.set_loading(true);
        }
        LoadingGuard { cache: self }
    }

    /// Whether any operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Whether writes are still accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop accepting writes. Responses that arrive afterwards are dropped.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.is_loading != loading;
            state.is_loading = loading;
            changed
        });
    }
}

/// Clears `is_loading` on drop once no other operation is in flight.
#[derive(Debug)]
pub struct LoadingGuard<'a, T: Clone, A: Clone + Default> {
    cache: &'a CollectionCache<T, A>,
}

impl<T: Clone, A: Clone + Default> Drop for LoadingGuard<'_, T, A> {
    fn drop(&mut self) {
        if self.cache.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.cache.set_loading(false);
        }
    }
}
