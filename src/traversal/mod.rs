// src/traversal/mod.rs
// =============================================================================
// The traversal manager: drives the crawl from seeds to completion.
//
// How it works:
// 1. Push every seed into the link queue (each seed is its own parent)
// 2. Pop links and dereference up to `concurrency` of them at once
// 3. Import each document's quads into the aggregated store, or keep the
//    document as a separate query source if it can answer queries itself
// 4. Extract follow-up links and push them with the document as parent
// 5. Repeat until the queue is empty and nothing is in flight
//
// It also stops early:
// - When every cursor on the store has closed while links are still queued
//   (nobody is reading any more). If the queue happens to be empty at that
//   moment, the manager remembers that its readers left and stops as soon as
//   an in-flight fetch queues new links
// - When a dereference fails, which ends the traversal with that error
//
// Stopping never interrupts a fetch that is already running: it finishes in
// the background and its result is thrown away.
//
// Lifecycle: Idle -> Running -> Stopped. Stopped is final.
// =============================================================================

mod discovery;

pub use discovery::{DiscoveryEdge, DiscoveryRecorder, DiscoverySink};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, BoxStream, FuturesUnordered, StreamExt};
use tokio::sync::watch;

use crate::dereference::{Dereferencer, Document};
use crate::error::{Result, TraversalError};
use crate::extract::{normalize_link_url, AllIrisExtractor, ExtractInput, LinkExtractor};
use crate::link::{Link, QueryContext};
use crate::queue::{FifoQueue, LinkQueue};
use crate::rdf::Quad;
use crate::source::QuerySource;
use crate::store::AggregatedStore;

pub const DEFAULT_CONCURRENCY: usize = 10;

// Documents that answer queries themselves, in discovery order
#[derive(Default)]
struct SourceList {
    sources: Vec<Arc<dyn QuerySource>>,
    closed: bool,
}

struct ManagerInner {
    seeds: Vec<Link>,
    queue: Mutex<Box<dyn LinkQueue>>,
    store: AggregatedStore,
    dereferencer: Arc<dyn Dereferencer>,
    extractor: Arc<dyn LinkExtractor>,
    discovery: Option<Arc<dyn DiscoverySink>>,
    concurrency: usize,
    started: AtomicBool,
    in_flight: AtomicUsize,
    // every cursor closed while the queue was empty; cleared by a new cursor
    detached: AtomicBool,
    // the first fetch failure, kept for anyone who asks after the fact
    failure: Mutex<Option<TraversalError>>,
    stopped: watch::Sender<bool>,
    // set once the driver task is gone (or will never run)
    finished: watch::Sender<bool>,
    sources: watch::Sender<SourceList>,
}

impl ManagerInner {
    fn lock_queue(&self) -> MutexGuard<'_, Box<dyn LinkQueue>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    fn stop(&self) {
        let was_stopped = self.stopped.send_replace(true);
        self.store.end();
        self.sources.send_modify(|list| list.closed = true);
        if !self.started.load(Ordering::SeqCst) {
            self.finished.send_replace(true);
        }

        if !was_stopped {
            tracing::info!(
                queued = self.lock_queue().len(),
                sources = self.store.contained_sources().len(),
                quads = self.store.len(),
                "Traversal stopped"
            );
        }
    }

    // The handler runs before the store ends, so whoever reads the store
    // learns about the error before their cursor finishes
    fn fail(&self, error: TraversalError, on_reject: impl FnOnce(TraversalError)) {
        // 1. Mark stopped so no new work starts
        self.stopped.send_replace(true);
        tracing::error!(error = %error, "Traversal failed");

        // 2. Record the failure and tell the caller
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
        on_reject(error);

        // 3. Only now end the store, which lets cursors finish
        self.stop();
    }

    // Stops when all readers are gone but there is still queued work
    fn stop_if_abandoned(&self, trigger: &str) -> bool {
        if self.is_stopped() || self.store.has_running_cursors() {
            return false;
        }
        let queued = self.lock_queue().len();
        if queued == 0 {
            return false;
        }
        tracing::info!(queued, trigger, "No cursors left, stopping traversal early");
        self.stop();
        true
    }

    fn add_source(&self, source: Arc<dyn QuerySource>) {
        self.sources.send_modify(|list| {
            if !list.closed {
                list.sources.push(source);
            }
        });
    }

    async fn drive(
        self: Arc<Self>,
        context: QueryContext,
        on_reject: Box<dyn FnOnce(TraversalError) + Send>,
    ) {
        let mut stopped = self.stopped.subscribe();
        // FnOnce behind an Option: taking it guarantees a single call
        let mut on_reject = Some(on_reject);
        // a link counts as claimed the moment it is popped
        let mut visited: HashSet<String> = HashSet::new();
        // the fetches currently running, at most `concurrency` of them
        let mut running = FuturesUnordered::new();

        loop {
            // Fill every free slot with a link nobody has claimed yet
            while !self.is_stopped() && running.len() < self.concurrency {
                let next = self.lock_queue().pop();
                let Some(link) = next else {
                    break;
                };
                if self.store.contains_source(&link.url) || !visited.insert(link.url.clone()) {
                    tracing::debug!(url = %link.url, "Skipping already visited link");
                    continue;
                }
                running.push(self.clone().process(link, context.clone()));
            }
            self.in_flight.store(running.len(), Ordering::SeqCst);

            // Nothing running after a refill means the queue is exhausted
            if self.is_stopped() || running.is_empty() {
                break;
            }

            // Wait for the next fetch to finish, or for someone to stop us
            tokio::select! {
                biased;
                _ = wait_until_stopped(&mut stopped) => break,
                Some(result) = running.next() => {
                    if let Err(error) = result {
                        if let Some(on_reject) = on_reject.take() {
                            self.fail(error, on_reject);
                        }
                        break;
                    }
                    // readers left earlier while the queue was empty; this
                    // fetch may just have queued more work nobody wants
                    if self.detached.load(Ordering::SeqCst)
                        && self.stop_if_abandoned("fetch completed")
                    {
                        break;
                    }
                }
            }
        }

        // In-flight fetches run to completion in the background. `process`
        // checks the stopped flag and throws their results away.
        self.in_flight.store(0, Ordering::SeqCst);
        if !running.is_empty() {
            tracing::debug!(in_flight = running.len(), "Letting in-flight fetches finish");
            tokio::spawn(running.for_each(|_| async {}));
        }

        if !self.is_stopped() {
            tracing::info!(visited = visited.len(), "Traversal completed, link queue exhausted");
        }
        self.stop();
        self.finished.send_replace(true);
    }

    // Dereference, import, extract and enqueue for one link
    async fn process(self: Arc<Self>, link: Link, context: QueryContext) -> Result<()> {
        let context = context.for_link(&link);
        tracing::debug!(url = %link.url, depth = ?link.metadata.depth, "Dereferencing link");

        let document = self
            .dereferencer
            .dereference(&link, &context)
            .await
            .map_err(|e| TraversalError::fetch(&link.url, &e))?;
        if self.is_stopped() {
            tracing::debug!(url = %link.url, "Discarding document fetched after stop");
            return Ok(());
        }

        let Document {
            url,
            quads,
            headers,
            source,
        } = document;
        let quads = match &link.transform {
            Some(transform) => transform(quads),
            None => quads,
        };
        let quads: Vec<Quad> = quads.collect().await;

        let input = ExtractInput {
            url: &url,
            quads: &quads,
            headers: &headers,
            context: &context,
        };
        let children = match self.extractor.extract(&input) {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!(url = %link.url, error = %e, "Link extraction failed");
                Vec::new()
            }
        };

        match source {
            Some(source) => {
                tracing::debug!(url = %link.url, "Registered document as its own query source");
                self.add_source(source);
            }
            None => {
                let added = self.store.import_source(&link.url, stream::iter(quads)).await;
                tracing::debug!(url = %link.url, added, "Imported document");
            }
        }

        if self.is_stopped() {
            return Ok(());
        }

        let mut queue = self.lock_queue();
        for child in children {
            if let Some(discovery) = &self.discovery {
                discovery.link_discovered(&child, &link);
            }
            let url = child.url.clone();
            if !queue.push(child, &link) {
                tracing::debug!(url = %url, parent = %link.url, "Link not accepted by queue");
            }
        }
        Ok(())
    }
}

async fn wait_until_stopped(stopped: &mut watch::Receiver<bool>) {
    let _ = stopped.wait_for(|stopped| *stopped).await;
}

/// Drives a traversal. Cheap to clone: clones share the same traversal.
#[derive(Clone)]
pub struct TraversalManager {
    inner: Arc<ManagerInner>,
}

impl TraversalManager {
    pub fn builder() -> TraversalManagerBuilder {
        TraversalManagerBuilder::default()
    }

    /// Starts traversing in a background task.
    ///
    /// `on_reject` is called once if a dereference fails. Must be called from
    /// within a tokio runtime. Starting twice is a caller bug and returns
    /// `TraversalError::AlreadyStarted`. Starting a stopped manager does
    /// nothing.
    pub fn start(
        &self,
        context: QueryContext,
        on_reject: impl FnOnce(TraversalError) + Send + 'static,
    ) -> Result<()> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(TraversalError::AlreadyStarted);
        }
        if inner.is_stopped() {
            tracing::debug!("Traversal stopped before it started, nothing to do");
            inner.finished.send_replace(true);
            return Ok(());
        }

        // Early stop: no reader left but links still queued. With an empty
        // queue, remember that the readers left and let the driver re-check
        // after each fetch.
        let weak = Arc::downgrade(inner);
        inner.store.on_all_cursors_closed(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.stop_if_abandoned("all cursors closed") && !inner.is_stopped() {
                inner.detached.store(true, Ordering::SeqCst);
            }
        });
        // a new reader means someone wants results again
        let weak = Arc::downgrade(inner);
        inner.store.on_cursor_created(move || {
            if let Some(inner) = weak.upgrade() {
                inner.detached.store(false, Ordering::SeqCst);
            }
        });

        // Seeds have no real parent, so each one is its own
        {
            let mut queue = inner.lock_queue();
            for seed in &inner.seeds {
                queue.push(seed.clone(), seed);
            }
        }

        tracing::info!(
            seeds = inner.seeds.len(),
            concurrency = inner.concurrency,
            "Traversal started"
        );
        tokio::spawn(inner.clone().drive(context, Box::new(on_reject)));
        Ok(())
    }

    /// Stops for good and ends the store. Safe to call any number of times.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Resolves once the traversal has finished: queue exhausted, stopped or
    /// failed.
    pub async fn wait(&self) {
        let mut finished = self.inner.finished.subscribe();
        let _ = finished.wait_for(|finished| *finished).await;
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// The fetch failure that ended the traversal, if any.
    pub fn failure(&self) -> Option<TraversalError> {
        self.inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    pub fn seeds(&self) -> &[Link] {
        &self.inner.seeds
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock_queue().len()
    }

    pub fn store(&self) -> &AggregatedStore {
        &self.inner.store
    }

    // Pushes fresh priorities into the queue, e.g. from a relevance scorer
    pub fn update_priorities(&self, priorities: &HashMap<String, f64>) -> usize {
        self.inner.lock_queue().update_all_priorities(priorities)
    }

    /// The aggregated store, as a query source.
    pub fn query_source_aggregated(&self) -> AggregatedStore {
        self.inner.store.clone()
    }

    /// Every document that exposed its own query capability, as it is
    /// discovered. The stream ends once traversal stops.
    pub fn query_sources_non_aggregated(&self) -> BoxStream<'static, Arc<dyn QuerySource>> {
        let receiver = self.inner.sources.subscribe();
        stream::unfold((receiver, 0usize), |(mut receiver, index)| async move {
            loop {
                let next = {
                    let list = receiver.borrow_and_update();
                    match list.sources.get(index) {
                        Some(source) => Some(Some(source.clone())),
                        None if list.closed => Some(None),
                        None => None,
                    }
                };
                match next {
                    Some(Some(source)) => return Some((source, (receiver, index + 1))),
                    Some(None) => return None,
                    None => {}
                }
                if receiver.changed().await.is_err() {
                    return None;
                }
            }
        })
        .boxed()
    }
}

pub struct TraversalManagerBuilder {
    seeds: Vec<Link>,
    queue: Option<Box<dyn LinkQueue>>,
    store: Option<AggregatedStore>,
    dereferencer: Option<Arc<dyn Dereferencer>>,
    extractor: Option<Arc<dyn LinkExtractor>>,
    discovery: Option<Arc<dyn DiscoverySink>>,
    concurrency: usize,
}

impl Default for TraversalManagerBuilder {
    fn default() -> Self {
        TraversalManagerBuilder {
            seeds: Vec::new(),
            queue: None,
            store: None,
            dereferencer: None,
            extractor: None,
            discovery: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl TraversalManagerBuilder {
    pub fn seed(mut self, seed: Link) -> Self {
        self.seeds.push(seed);
        self
    }

    pub fn seeds(mut self, seeds: impl IntoIterator<Item = Link>) -> Self {
        self.seeds.extend(seeds);
        self
    }

    pub fn queue(mut self, queue: impl LinkQueue + 'static) -> Self {
        self.queue = Some(Box::new(queue));
        self
    }

    pub fn store(mut self, store: AggregatedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn dereferencer(mut self, dereferencer: Arc<dyn Dereferencer>) -> Self {
        self.dereferencer = Some(dereferencer);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn discovery(mut self, discovery: Arc<dyn DiscoverySink>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    // Defaults: FIFO queue, fresh store, AllIrisExtractor
    pub fn build(self) -> Result<TraversalManager> {
        let dereferencer = self
            .dereferencer
            .ok_or_else(|| TraversalError::Config("a dereferencer is required".into()))?;
        if self.concurrency == 0 {
            return Err(TraversalError::Config(
                "concurrency must be at least 1".into(),
            ));
        }

        // Seeds go through the same normalization as extracted links, so a
        // document linking back to a seed finds it already visited. Urls that
        // don't parse are kept as given.
        let seeds = self
            .seeds
            .into_iter()
            .map(|mut seed| {
                if let Some(url) = normalize_link_url(&seed.url) {
                    seed.url = url;
                }
                seed
            })
            .collect();

        let inner = ManagerInner {
            seeds,
            queue: Mutex::new(
                self.queue
                    .unwrap_or_else(|| Box::new(FifoQueue::new()) as Box<dyn LinkQueue>),
            ),
            store: self.store.unwrap_or_default(),
            dereferencer,
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(AllIrisExtractor) as Arc<dyn LinkExtractor>),
            discovery: self.discovery,
            concurrency: self.concurrency,
            started: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            detached: AtomicBool::new(false),
            failure: Mutex::new(None),
            stopped: watch::channel(false).0,
            finished: watch::channel(false).0,
            sources: watch::channel(SourceList::default()).0,
        };

        Ok(TraversalManager {
            inner: Arc::new(inner),
        })
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why FuturesUnordered instead of spawning a task per link?
//    - One driver task owns the visited set and the concurrency count
//    - FuturesUnordered polls up to `concurrency` fetches at once and hands
//      back whichever finishes first
//    - On stop, the leftovers are handed to a background task that just
//      polls them to the end; nothing waits on them
//
// 2. Why a watch channel for "stopped"?
//    - It is a flag anyone can read synchronously (borrow)
//    - And something the driver can await next to its fetches (wait_for)
//
// 3. Why Weak in the early-stop observer?
//    - The store keeps its observers alive, and the manager keeps the store
//      alive; a strong reference would be a cycle that never gets freed
//
// 4. What does `detached` track?
//    - The last reader can leave while a fetch is running and the queue is
//      empty, so there is nothing to stop yet
//    - The flag remembers that, and the driver looks again after every
//      finished fetch; a new cursor clears it
// -----------------------------------------------------------------------------
