// src/store/cursor.rs
// =============================================================================
// A live read handle over the aggregated store.
//
// The store only ever appends, so a cursor is just a position in the quad
// list plus the pattern it filters with. When it catches up with the writers
// it parks its waker in the store and is woken by the next matching insert,
// or by `end`.
// =============================================================================

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use super::{MetadataHandle, StoreInner};
use crate::rdf::{Quad, QuadPattern};

pub struct Cursor {
    id: u64,
    pattern: QuadPattern,
    position: usize,
    store: Arc<StoreInner>,
    // Last handle seen before the cursor left the store's running set
    final_metadata: MetadataHandle,
    closed: bool,
}

impl Cursor {
    pub(super) fn new(
        id: u64,
        pattern: QuadPattern,
        metadata: MetadataHandle,
        store: Arc<StoreInner>,
    ) -> Self {
        Cursor {
            id,
            pattern,
            position: 0,
            store,
            final_metadata: metadata,
            closed: false,
        }
    }

    pub fn pattern(&self) -> &QuadPattern {
        &self.pattern
    }

    /// The current metadata snapshot. Once its state is invalidated, call
    /// this again for a fresh one.
    pub fn metadata(&self) -> MetadataHandle {
        let state = self.store.lock();
        match state.cursors.get(&self.id) {
            Some(entry) => entry.metadata.clone(),
            None => self.final_metadata.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // Stops reading. If this was the last running cursor, the store's
    // "all closed" observers fire.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(metadata) = self.store.deregister(self.id) {
            self.final_metadata = metadata;
        }
    }
}

impl Stream for Cursor {
    type Item = Quad;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Quad>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(None);
        }

        let mut state = this.store.lock();
        while this.position < state.quads.len() {
            let quad = &state.quads[this.position];
            this.position += 1;
            if this.pattern.matches(quad) {
                return Poll::Ready(Some(quad.clone()));
            }
        }

        if state.ended {
            drop(state);
            this.close();
            return Poll::Ready(None);
        }

        if let Some(entry) = state.cursors.get_mut(&this.id) {
            entry.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use crate::rdf::{Quad, QuadPattern, Term};
    use crate::store::AggregatedStore;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_closed_cursor_yields_nothing() {
        let store = AggregatedStore::new(false);
        store.insert(Quad::triple(Term::iri("a"), Term::iri("p"), Term::iri("b")));

        let mut cursor = store.match_pattern(QuadPattern::any());
        cursor.close();
        assert!(cursor.is_closed());
        assert_eq!(cursor.next().await, None);
        assert!(!store.has_running_cursors());
    }

    #[tokio::test]
    async fn test_pending_cursor_wakes_on_end() {
        let store = AggregatedStore::new(false);
        let cursor = store.match_pattern(QuadPattern::any());

        let reader = tokio::spawn(cursor.collect::<Vec<_>>());
        tokio::task::yield_now().await;
        store.end();

        let quads = reader.await.unwrap();
        assert!(quads.is_empty());
    }
}
