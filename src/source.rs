// src/source.rs
// =============================================================================
// The query side: things that can be asked for quads matching a pattern.
//
// - QuerySource: anything you can query (the aggregated store, a document
//   that brought its own query engine, an in-memory list)
// - QuadCursor: the answer, a stream of quads plus cardinality metadata
// - TraversalSource: wraps a TraversalManager so that the first query starts
//   the traversal, and every answer covers all sources found along the way
// =============================================================================

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, SelectAll, Stream, StreamExt};

use crate::error::TraversalError;
use crate::link::QueryContext;
use crate::rdf::{Quad, QuadPattern};
use crate::store::{AggregatedStore, Cardinality, Cursor, MetadataHandle};
use crate::traversal::TraversalManager;

pub trait QuadCursor: Stream<Item = Quad> + Send + Unpin {
    fn metadata(&self) -> MetadataHandle;
}

pub type BoxCursor = Box<dyn QuadCursor>;

pub trait QuerySource: Send + Sync {
    fn query(&self, pattern: &QuadPattern) -> BoxCursor;
}

impl QuadCursor for Cursor {
    fn metadata(&self) -> MetadataHandle {
        Cursor::metadata(self)
    }
}

impl QuerySource for AggregatedStore {
    fn query(&self, pattern: &QuadPattern) -> BoxCursor {
        Box::new(self.match_pattern(pattern.clone()))
    }
}

/// A fixed list of quads. Its cardinalities are always exact.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    quads: Vec<Quad>,
}

impl StaticSource {
    pub fn new(quads: Vec<Quad>) -> Self {
        StaticSource { quads }
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }
}

impl QuerySource for StaticSource {
    fn query(&self, pattern: &QuadPattern) -> BoxCursor {
        let matched: Vec<Quad> = self
            .quads
            .iter()
            .filter(|quad| pattern.matches(quad))
            .cloned()
            .collect();
        let metadata = MetadataHandle::new(Cardinality::exact(matched.len() as u64));
        Box::new(StaticCursor {
            quads: matched.into_iter(),
            metadata,
        })
    }
}

pub struct StaticCursor {
    quads: std::vec::IntoIter<Quad>,
    metadata: MetadataHandle,
}

impl Stream for StaticCursor {
    type Item = Quad;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Quad>> {
        Poll::Ready(self.quads.next())
    }
}

impl QuadCursor for StaticCursor {
    fn metadata(&self) -> MetadataHandle {
        self.metadata.clone()
    }
}

/// Exposes a traversal as something to query.
///
/// The manager is started lazily by the first `query`, exactly once. A fetch
/// failure shows up as an `Err` item on every result stream, after which those
/// streams end. That holds even when the manager was started by someone else,
/// since the failure is read from the manager itself.
pub struct TraversalSource {
    manager: TraversalManager,
    context: QueryContext,
    started: AtomicBool,
}

impl TraversalSource {
    pub fn new(manager: TraversalManager, context: QueryContext) -> Self {
        TraversalSource {
            manager,
            context,
            started: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> &TraversalManager {
        &self.manager
    }

    pub fn error(&self) -> Option<TraversalError> {
        self.manager.failure()
    }

    /// Answers `pattern` over everything the traversal finds.
    ///
    /// Must be called from within a tokio runtime, since the first call
    /// spawns the traversal.
    pub fn query(&self, pattern: &QuadPattern) -> UnionCursor {
        // the cursor exists before traversal starts, so nothing is missed and
        // the early-stop observer has something to watch
        let aggregated = self.manager.query_source_aggregated().match_pattern(pattern.clone());
        let sources = self.manager.query_sources_non_aggregated();

        if !self.started.swap(true, Ordering::SeqCst) {
            // the manager keeps the failure itself, the handler only logs
            let started = self.manager.start(self.context.clone(), |error| {
                tracing::debug!(error = %error, "Traversal rejected, result streams will report it");
            });
            if let Err(e) = started {
                tracing::debug!(error = %e, "Traversal was already started elsewhere");
            }
        }

        UnionCursor {
            pattern: pattern.clone(),
            aggregated,
            aggregated_done: false,
            sources: Some(sources),
            others: SelectAll::new(),
            manager: self.manager.clone(),
            done: false,
        }
    }
}

/// The merged result stream of a `TraversalSource` query: the aggregated
/// store's cursor plus a cursor per non-aggregated source, opened as those
/// sources are discovered.
pub struct UnionCursor {
    pattern: QuadPattern,
    aggregated: Cursor,
    aggregated_done: bool,
    sources: Option<BoxStream<'static, Arc<dyn QuerySource>>>,
    others: SelectAll<BoxCursor>,
    manager: TraversalManager,
    done: bool,
}

impl UnionCursor {
    // Metadata of the aggregated half
    pub fn metadata(&self) -> MetadataHandle {
        self.aggregated.metadata()
    }

    pub fn is_closed(&self) -> bool {
        self.done
    }

    /// Closes both halves. If that leaves the store without readers while
    /// links are queued, the traversal stops early.
    pub fn close(&mut self) {
        self.done = true;
        self.sources = None;
        self.others = SelectAll::new();
        self.aggregated.close();
    }

    fn current_error(&self) -> Option<TraversalError> {
        self.manager.failure()
    }
}

impl Stream for UnionCursor {
    type Item = Result<Quad, TraversalError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        // 1. A failed traversal wins over any quads still buffered
        if let Some(error) = this.current_error() {
            this.close();
            return Poll::Ready(Some(Err(error)));
        }

        // 2. Open a cursor on every source discovered since the last poll
        while let Some(sources) = this.sources.as_mut() {
            match sources.poll_next_unpin(cx) {
                Poll::Ready(Some(source)) => this.others.push(source.query(&this.pattern)),
                Poll::Ready(None) => this.sources = None,
                Poll::Pending => break,
            }
        }

        // 3. The aggregated store first, then the per-document sources
        if !this.aggregated_done {
            match this.aggregated.poll_next_unpin(cx) {
                Poll::Ready(Some(quad)) => return Poll::Ready(Some(Ok(quad))),
                Poll::Ready(None) => this.aggregated_done = true,
                Poll::Pending => {}
            }
        }

        // an empty SelectAll reports Ready(None), which is not the end for us
        if !this.others.is_empty() {
            if let Poll::Ready(Some(quad)) = this.others.poll_next_unpin(cx) {
                return Poll::Ready(Some(Ok(quad)));
            }
        }

        // 4. Only done when every half is done
        if this.aggregated_done && this.sources.is_none() && this.others.is_empty() {
            // the failure path sets the error before ending the store
            if let Some(error) = this.current_error() {
                this.close();
                return Poll::Ready(Some(Err(error)));
            }
            this.done = true;
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why implement Stream by hand for UnionCursor?
//    - The set of inner cursors grows while we are being polled
//    - SelectAll handles the per-document cursors, but it reports the end as
//      soon as it is empty, which is not our end
//    - A hand-written poll_next decides when all halves are really finished
//
// 2. Why is the aggregated cursor opened before the traversal starts?
//    - Quads imported before the cursor exists would still be found, but the
//      early-stop observer needs a running cursor to watch
//
// 3. Where do errors come from?
//    - The manager records the fetch failure before it ends the store
//    - Every UnionCursor reads it from there, however the manager was started
// -----------------------------------------------------------------------------
