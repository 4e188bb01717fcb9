// src/store/mod.rs
// =============================================================================
// The aggregated store: every quad discovered so far, readable while it grows.
//
// Features:
// - Append-only set of quads (re-importing a known quad is a no-op)
// - Live cursors: a cursor yields what is stored now plus whatever arrives
//   later, until the store ends
// - Per-cursor metadata with a cardinality estimate that only grows, and
//   becomes exact once the store ends
// - Observers for "cursor created" and "all cursors closed", which the
//   traversal manager uses to stop crawling nobody is reading
//
// All mutations happen inside one short, synchronous critical section, so a
// reader never sees a quad that its cursor's cardinality doesn't count.
// Observers are always called after the lock has been released.
// =============================================================================

mod cursor;
mod metadata;

pub use cursor::Cursor;
pub use metadata::{Cardinality, CardinalityKind, MetadataHandle, ValidationState};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Waker;

use futures::{pin_mut, Stream, StreamExt};

use crate::rdf::{Quad, QuadPattern};

pub type StoreListener = Arc<dyn Fn() + Send + Sync>;

// Book-keeping for one open cursor
struct CursorEntry {
    pattern: QuadPattern,
    matched: u64,
    metadata: MetadataHandle,
    waker: Option<Waker>,
}

#[derive(Default)]
struct StoreState {
    quads: Vec<Quad>,
    seen: HashSet<Quad>,
    contained_sources: HashSet<String>,
    cursors: HashMap<u64, CursorEntry>,
    next_cursor_id: u64,
    ended: bool,
    base_metadata: Option<Cardinality>,
    cursor_created_listeners: Vec<StoreListener>,
    all_closed_listeners: Vec<StoreListener>,
}

impl StoreState {
    // Cardinality for `matched` quads, folded with the injected baseline
    fn cardinality(&self, matched: u64) -> Cardinality {
        let own = if self.ended {
            Cardinality::exact(matched)
        } else {
            Cardinality::estimate(matched)
        };
        match self.base_metadata {
            Some(base) => base.combine(own),
            None => own,
        }
    }

    // Invalidates the cursor's current handle and publishes a fresh one
    fn refresh(&mut self, id: u64) {
        let Some(matched) = self.cursors.get(&id).map(|entry| entry.matched) else {
            return;
        };
        let cardinality = self.cardinality(matched);
        if let Some(entry) = self.cursors.get_mut(&id) {
            entry.metadata.state.invalidate();
            entry.metadata = MetadataHandle::new(cardinality);
        }
    }

    fn refresh_all(&mut self) {
        let ids: Vec<u64> = self.cursors.keys().copied().collect();
        for id in ids {
            self.refresh(id);
        }
    }

    fn take_wakers(&mut self) -> Vec<Waker> {
        self.cursors
            .values_mut()
            .filter_map(|entry| entry.waker.take())
            .collect()
    }
}

pub(crate) struct StoreInner {
    state: Mutex<StoreState>,
    cardinality_updates: bool,
}

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // poisoning is ignored, no critical section leaves the state half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Removes a cursor and fires the "all closed" observers if it was the last
    fn deregister(&self, id: u64) -> Option<MetadataHandle> {
        let (metadata, listeners) = {
            let mut state = self.lock();
            let entry = state.cursors.remove(&id)?;
            let listeners = if state.cursors.is_empty() {
                state.all_closed_listeners.clone()
            } else {
                Vec::new()
            };
            (entry.metadata, listeners)
        };

        for listener in listeners {
            listener();
        }
        Some(metadata)
    }
}

/// Shared handle to the store. Cloning it is cheap, all clones see the same data.
#[derive(Clone)]
pub struct AggregatedStore {
    inner: Arc<StoreInner>,
}

impl Default for AggregatedStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AggregatedStore {
    // `cardinality_updates`: publish a fresh metadata handle on every new
    // matching quad, instead of only when the store ends
    pub fn new(cardinality_updates: bool) -> Self {
        AggregatedStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                cardinality_updates,
            }),
        }
    }

    pub fn cardinality_updates(&self) -> bool {
        self.inner.cardinality_updates
    }

    // Adds one quad. Returns false when it was already known or the store ended.
    pub fn insert(&self, quad: Quad) -> bool {
        let wakers = {
            let mut state = self.inner.lock();
            if state.ended || state.seen.contains(&quad) {
                return false;
            }

            // only cursors whose pattern matches have something new to read
            let mut touched = Vec::new();
            let mut wakers = Vec::new();
            for (&id, entry) in state.cursors.iter_mut() {
                if entry.pattern.matches(&quad) {
                    entry.matched += 1;
                    touched.push(id);
                    wakers.extend(entry.waker.take());
                }
            }
            if self.inner.cardinality_updates {
                for id in touched {
                    state.refresh(id);
                }
            }

            state.seen.insert(quad.clone());
            state.quads.push(quad);
            wakers
        };

        for waker in wakers {
            waker.wake();
        }
        true
    }

    // Drains `quads` into the store. Stops early once the store has ended.
    // Returns how many new quads were added.
    pub async fn import<S>(&self, quads: S) -> usize
    where
        S: Stream<Item = Quad>,
    {
        pin_mut!(quads);
        let mut added = 0;
        while let Some(quad) = quads.next().await {
            if self.insert(quad) {
                added += 1;
            } else if self.is_ended() {
                break;
            }
        }
        added
    }

    // Like `import`, then records `url` as fully contained. A source cut short
    // by `end` is not marked.
    pub async fn import_source<S>(&self, url: &str, quads: S) -> usize
    where
        S: Stream<Item = Quad>,
    {
        let added = self.import(quads).await;

        let mut state = self.inner.lock();
        if !state.ended {
            state.contained_sources.insert(url.to_string());
        }
        added
    }

    pub fn contains_source(&self, url: &str) -> bool {
        self.inner.lock().contained_sources.contains(url)
    }

    pub fn contained_sources(&self) -> HashSet<String> {
        self.inner.lock().contained_sources.clone()
    }

    /// Opens a live cursor over every quad matching `pattern`.
    ///
    /// The cursor starts with an estimate equal to the number of matches
    /// already stored, and stays registered as running until it is closed,
    /// dropped or exhausted.
    pub fn match_pattern(&self, pattern: QuadPattern) -> Cursor {
        let (id, metadata, listeners) = {
            let mut state = self.inner.lock();
            let matched = state.quads.iter().filter(|q| pattern.matches(q)).count() as u64;
            let metadata = MetadataHandle::new(state.cardinality(matched));

            let id = state.next_cursor_id;
            state.next_cursor_id += 1;
            state.cursors.insert(
                id,
                CursorEntry {
                    pattern: pattern.clone(),
                    matched,
                    metadata: metadata.clone(),
                    waker: None,
                },
            );
            (id, metadata, state.cursor_created_listeners.clone())
        };

        for listener in listeners {
            listener();
        }
        Cursor::new(id, pattern, metadata, self.inner.clone())
    }

    /// Injects a baseline that every cardinality is combined with from now on.
    ///
    /// With `update_running_cursors`, open cursors get a fresh handle right
    /// away; otherwise they pick it up on their next refresh.
    pub fn set_base_metadata(&self, base: Cardinality, update_running_cursors: bool) {
        let mut state = self.inner.lock();
        state.base_metadata = Some(base);
        if update_running_cursors {
            state.refresh_all();
        }
    }

    /// Seals the store: no more writes, every cardinality becomes exact.
    pub fn end(&self) {
        let wakers = {
            let mut state = self.inner.lock();
            if state.ended {
                return;
            }
            state.ended = true;
            state.refresh_all();
            state.take_wakers()
        };

        tracing::debug!(quads = self.len(), "Aggregated store ended");
        for waker in wakers {
            waker.wake();
        }
    }

    pub fn is_ended(&self) -> bool {
        self.inner.lock().ended
    }

    pub fn len(&self) -> usize {
        self.inner.lock().quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_running_cursors(&self) -> bool {
        !self.inner.lock().cursors.is_empty()
    }

    pub fn running_cursor_count(&self) -> usize {
        self.inner.lock().cursors.len()
    }

    pub fn on_cursor_created(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner
            .lock()
            .cursor_created_listeners
            .push(Arc::new(listener));
    }

    // Called every time the number of running cursors drops to zero
    pub fn on_all_cursors_closed(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.lock().all_closed_listeners.push(Arc::new(listener));
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Arc<Mutex<..>> and not a channel per cursor?
//    - Every cursor needs the quads that existed before it was opened as well
//      as the ones that arrive later
//    - Keeping one shared Vec and an index per cursor gives both
//
// 2. Why are observers called outside the lock?
//    - An observer may call back into the store (the early-stop observer asks
//      whether cursors are still running), and std Mutex is not re-entrant
//    - So the listener list is cloned under the lock and called after it
//
// 3. What does `end` change?
//    - Inserts are refused from then on
//    - Parked cursors are woken and finish once they have read everything
//    - Cardinalities switch from estimates to exact counts
// -----------------------------------------------------------------------------
