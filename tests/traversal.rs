// tests/traversal.rs
// =============================================================================
// End-to-end traversal scenarios against an in-memory web.
//
// MockWeb plays the role of the network: every URL maps to a list of quads,
// optional delays make fetches overlap, and counters record how the manager
// used it.
// =============================================================================

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use link_traversal::dereference::{Dereferencer, Document};
use link_traversal::extract::{ExtractInput, LinkExtractor};
use link_traversal::queue::{DepthLimitQueue, FifoQueue, PriorityQueue};
use link_traversal::traversal::DiscoveryRecorder;
use link_traversal::{
    AggregatedStore, Cardinality, Link, Quad, QueryContext, QuadPattern, StaticSource, Term,
    TraversalError, TraversalManager, TraversalSource,
};

const NEXT: &str = "https://vocab.example/next";
const PREV: &str = "https://vocab.example/prev";
const NAME: &str = "https://vocab.example/name";

fn url(chain: &str, i: usize) -> String {
    format!("https://web.example/{}{}", chain, i)
}

#[derive(Default)]
struct MockWeb {
    docs: HashMap<String, Vec<Quad>>,
    // served as separate query sources instead of being aggregated
    native: HashSet<String>,
    failing: HashSet<String>,
    delay: Duration,
    calls: AtomicUsize,
    // fetches that ran all the way to the end
    completed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    contexts: Mutex<Vec<(String, QueryContext)>>,
}

impl MockWeb {
    // chain0 -> chain1 -> ... -> chain{len-1}
    fn add_chain(&mut self, chain: &str, len: usize, link_back: bool) {
        for i in 0..len {
            let me = Term::iri(url(chain, i));
            let mut quads = vec![Quad::triple(
                me.clone(),
                Term::iri(NAME),
                Term::literal(format!("{} {}", chain, i)),
            )];
            if i + 1 < len {
                quads.push(Quad::triple(me.clone(), Term::iri(NEXT), Term::iri(url(chain, i + 1))));
            }
            if link_back && i > 0 {
                quads.push(Quad::triple(me.clone(), Term::iri(PREV), Term::iri(url(chain, i - 1))));
            }
            self.docs.insert(url(chain, i), quads);
        }
    }

    // one document linking to every child
    fn add_fanout(&mut self, parent: &str, children: &[String]) {
        let quads = children
            .iter()
            .map(|child| Quad::triple(Term::iri(parent), Term::iri(NEXT), Term::iri(child.as_str())))
            .collect();
        self.docs.insert(parent.to_string(), quads);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    // urls in the order they were dereferenced
    fn fetch_order(&self) -> Vec<String> {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl Dereferencer for MockWeb {
    async fn dereference(&self, link: &Link, context: &QueryContext) -> anyhow::Result<Document> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.contexts
            .lock()
            .unwrap()
            .push((link.url.clone(), context.clone()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&link.url) {
            return Err(anyhow!("HTTP 404"));
        }
        let quads = self.docs.get(&link.url).cloned().unwrap_or_default();
        let document = Document::new(link.url.clone(), quads.clone(), BTreeMap::new());
        if self.native.contains(&link.url) {
            return Ok(document.with_source(Arc::new(StaticSource::new(quads))));
        }
        Ok(document)
    }
}

fn chains(web: &Arc<MockWeb>, concurrency: usize) -> TraversalManager {
    TraversalManager::builder()
        .seeds([Link::new(url("a", 0)), Link::new(url("b", 0))])
        .dereferencer(web.clone())
        .concurrency(concurrency)
        .build()
        .unwrap()
}

async fn drain(source: &TraversalSource) -> (Vec<Quad>, Vec<TraversalError>) {
    let mut quads = Vec::new();
    let mut errors = Vec::new();
    let mut results = source.query(&QuadPattern::any());
    while let Some(result) = results.next().await {
        match result {
            Ok(quad) => quads.push(quad),
            Err(e) => errors.push(e),
        }
    }
    (quads, errors)
}

#[tokio::test]
async fn test_two_chains_are_fully_traversed() {
    let mut web = MockWeb::default();
    web.add_chain("a", 10, false);
    web.add_chain("b", 10, false);
    let web = Arc::new(web);

    let manager = chains(&web, 2);
    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let (quads, errors) = drain(&source).await;
    manager.wait().await;

    assert!(errors.is_empty());
    let sources = manager.store().contained_sources();
    assert_eq!(sources.len(), 20);
    for i in 0..10 {
        assert!(sources.contains(&url("a", i)));
        assert!(sources.contains(&url("b", i)));
    }
    // 20 names + 18 next links
    assert_eq!(quads.len(), 38);
    assert_eq!(web.calls(), 20);
    assert!(manager.store().is_ended());
    assert_eq!(manager.queue_len(), 0);
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test]
async fn test_links_back_to_parents_are_not_revisited() {
    let mut web = MockWeb::default();
    web.add_chain("a", 10, true);
    web.add_chain("b", 10, true);
    let web = Arc::new(web);

    let manager = chains(&web, 2);
    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let (_, errors) = drain(&source).await;

    assert!(errors.is_empty());
    assert_eq!(manager.store().contained_sources().len(), 20);
    assert_eq!(web.calls(), 20);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let mut web = MockWeb {
        delay: Duration::from_millis(10),
        ..MockWeb::default()
    };
    for i in 0..12 {
        web.docs.insert(url("s", i), Vec::new());
    }
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seeds((0..12).map(|i| Link::new(url("s", i))))
        .dereferencer(web.clone())
        .concurrency(3)
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();
    while !manager.is_stopped() {
        assert!(manager.in_flight() <= 3);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    manager.wait().await;

    assert_eq!(web.calls(), 12);
    let max_active = web.max_active.load(Ordering::SeqCst);
    assert!(max_active <= 3, "max active was {}", max_active);
    assert!(max_active >= 1);
}

#[tokio::test]
async fn test_depth_limit_cuts_the_chain() {
    let mut web = MockWeb::default();
    web.add_chain("a", 10, false);
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .queue(DepthLimitQueue::new(FifoQueue::new(), 3))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();
    manager.wait().await;

    let sources = manager.store().contained_sources();
    assert_eq!(sources.len(), 3);
    assert!(sources.contains(&url("a", 2)));
    assert!(!sources.contains(&url("a", 3)));
}

#[tokio::test]
async fn test_fetch_failure_surfaces_on_the_result_stream() {
    let mut web = MockWeb::default();
    web.add_chain("a", 10, false);
    web.failing.insert(url("a", 3));
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .concurrency(1)
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let (_, errors) = drain(&source).await;
    manager.wait().await;

    assert_eq!(errors.len(), 1);
    match &errors[0] {
        TraversalError::Fetch { url: failed, message } => {
            assert_eq!(failed, &url("a", 3));
            assert!(message.contains("HTTP 404"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(source.error().is_some());
    assert!(manager.is_stopped());
    assert!(manager.store().is_ended());
    assert!(!manager.store().contains_source(&url("a", 4)));
}

#[tokio::test]
async fn test_closing_the_last_cursor_stops_early() {
    let mut web = MockWeb {
        delay: Duration::from_millis(20),
        ..MockWeb::default()
    };
    for i in 0..50 {
        web.docs.insert(url("s", i), Vec::new());
    }
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seeds((0..50).map(|i| Link::new(url("s", i))))
        .dereferencer(web.clone())
        .concurrency(1)
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());

    let mut results = source.query(&QuadPattern::any());
    assert!(manager.store().has_running_cursors());
    results.close();
    manager.wait().await;

    assert!(manager.is_stopped());
    assert!(!manager.store().has_running_cursors());
    assert!(manager.queue_len() > 0);
    assert!(manager.store().contained_sources().len() < 50);
    assert!(results.next().await.is_none());
}

#[tokio::test]
async fn test_native_sources_are_queried_separately() {
    let mut web = MockWeb::default();
    web.add_chain("a", 3, false);
    web.native.insert(url("a", 1));
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let (quads, errors) = drain(&source).await;

    assert!(errors.is_empty());
    // the native document was still followed
    assert!(manager.store().contains_source(&url("a", 2)));
    assert!(!manager.store().contains_source(&url("a", 1)));

    let name_of_native = Quad::triple(
        Term::iri(url("a", 1)),
        Term::iri(NAME),
        Term::literal("a 1"),
    );
    assert!(quads.contains(&name_of_native));
    // a0 and a2 are aggregated, a1 answers for itself
    assert_eq!(manager.store().len(), 3);
    assert_eq!(quads.len(), 5);
}

#[tokio::test]
async fn test_transform_runs_before_import_and_extraction() {
    let mut web = MockWeb::default();
    web.add_chain("a", 3, false);
    let web = Arc::new(web);

    let drop_next: link_traversal::StreamTransform = Arc::new(|quads: BoxStream<'static, Quad>| {
        quads
            .filter(|quad: &Quad| {
                let keep = quad.predicate != Term::iri(NEXT);
                async move { keep }
            })
            .boxed()
    });
    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)).with_transform(drop_next))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();
    manager.wait().await;

    assert_eq!(manager.store().len(), 1);
    assert_eq!(web.calls(), 1);
}

#[tokio::test]
async fn test_link_context_overrides_the_ambient_one() {
    let mut web = MockWeb::default();
    web.add_chain("a", 2, false);
    let web = Arc::new(web);

    let seed = Link::new(url("a", 0)).with_context(QueryContext::new().with("lang", "de"));
    let manager = TraversalManager::builder()
        .seed(seed)
        .dereferencer(web.clone())
        .build()
        .unwrap();
    let ambient = QueryContext::new().with("lang", "en").with("user", "test");
    manager.start(ambient, |_| {}).unwrap();
    manager.wait().await;

    let contexts = web.contexts.lock().unwrap().clone();
    let of = |u: String| {
        contexts
            .iter()
            .find(|(visited, _)| *visited == u)
            .map(|(_, context)| context.clone())
            .unwrap()
    };
    let seed_context = of(url("a", 0));
    assert_eq!(seed_context.get("lang"), Some(&serde_json::json!("de")));
    assert_eq!(seed_context.get("user"), Some(&serde_json::json!("test")));
    assert_eq!(of(url("a", 1)).get("lang"), Some(&serde_json::json!("en")));
}

#[tokio::test]
async fn test_discovery_edges_are_recorded() {
    let mut web = MockWeb::default();
    web.add_chain("a", 3, false);
    let web = Arc::new(web);
    let recorder = Arc::new(DiscoveryRecorder::new());

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .discovery(recorder.clone())
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();
    manager.wait().await;

    let edges: HashSet<(String, String)> = recorder
        .edges()
        .into_iter()
        .map(|edge| (edge.parent, edge.child))
        .collect();
    assert!(edges.contains(&(url("a", 0), url("a", 1))));
    assert!(edges.contains(&(url("a", 1), url("a", 2))));
}

#[tokio::test]
async fn test_cardinality_becomes_exact_at_the_end() {
    let mut web = MockWeb::default();
    web.add_chain("a", 4, false);
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .store(AggregatedStore::new(true))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let pattern = QuadPattern::new(None, Some(Term::iri(NAME)), None, None);
    let mut results = source.query(&pattern);

    let mut last = 0;
    let mut count = 0;
    while let Some(result) = results.next().await {
        result.unwrap();
        count += 1;
        let value = results.metadata().cardinality.value;
        assert!(value >= last);
        last = value;
    }
    assert_eq!(count, 4);
    assert_eq!(results.metadata().cardinality, Cardinality::exact(4));
}

#[tokio::test]
async fn test_imported_stream_feeds_open_cursors() {
    let store = AggregatedStore::new(false);
    let mut cursor = store.match_pattern(QuadPattern::any());
    let quad = Quad::triple(Term::iri(url("x", 0)), Term::iri(NAME), Term::literal("x"));

    store.import_source(&url("x", 0), stream::iter(vec![quad.clone()])).await;
    store.end();

    assert_eq!(cursor.next().await, Some(quad));
    assert_eq!(cursor.next().await, None);
}

#[tokio::test]
async fn test_seed_linked_back_to_is_not_fetched_again() {
    let mut web = MockWeb::default();
    // documents link to the seed without the trailing slash the parser adds
    web.docs.insert(
        "https://web.example/".to_string(),
        vec![Quad::triple(
            Term::iri("https://web.example"),
            Term::iri(NEXT),
            Term::iri("https://web.example"),
        )],
    );
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new("https://web.example"))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();
    manager.wait().await;

    assert_eq!(web.calls(), 1);
    assert_eq!(web.fetch_order(), vec!["https://web.example/".to_string()]);
    let sources = manager.store().contained_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources.contains("https://web.example/"));
}

#[tokio::test]
async fn test_readers_leaving_during_a_fetch_stop_the_crawl() {
    let mut web = MockWeb {
        delay: Duration::from_millis(30),
        ..MockWeb::default()
    };
    let children: Vec<String> = (0..29).map(|i| url("c", i)).collect();
    web.add_fanout(&url("s", 0), &children);
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("s", 0)))
        .dereferencer(web.clone())
        .concurrency(1)
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());

    // the seed fetch is running and the queue is empty when the reader leaves
    let mut results = source.query(&QuadPattern::any());
    tokio::time::sleep(Duration::from_millis(5)).await;
    results.close();
    manager.wait().await;

    assert!(manager.is_stopped());
    assert!(!manager.store().has_running_cursors());
    // the children were queued but never fetched
    assert_eq!(web.calls(), 1);
    assert!(manager.queue_len() > 0);
    assert!(manager.store().contained_sources().len() <= 1);
}

#[tokio::test]
async fn test_a_new_reader_keeps_the_crawl_going() {
    let mut web = MockWeb {
        delay: Duration::from_millis(20),
        ..MockWeb::default()
    };
    web.add_chain("a", 3, false);
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .concurrency(1)
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());

    let mut first = source.query(&QuadPattern::any());
    tokio::time::sleep(Duration::from_millis(5)).await;
    first.close();
    // somebody else starts reading before the seed fetch completes
    let (quads, errors) = drain(&source).await;

    assert!(errors.is_empty());
    assert_eq!(manager.store().contained_sources().len(), 3);
    assert_eq!(quads.len(), 5);
}

struct BrokenExtractor;

impl LinkExtractor for BrokenExtractor {
    fn extract(&self, _input: &ExtractInput<'_>) -> anyhow::Result<Vec<Link>> {
        Err(anyhow!("extractor exploded"))
    }
}

#[tokio::test]
async fn test_failed_extraction_still_imports_the_document() {
    let mut web = MockWeb::default();
    web.add_chain("a", 3, false);
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .extractor(Arc::new(BrokenExtractor))
        .build()
        .unwrap();
    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let (quads, errors) = drain(&source).await;

    assert!(errors.is_empty());
    assert!(manager.failure().is_none());
    assert!(manager.store().contains_source(&url("a", 0)));
    // name + next link of the seed, and nothing followed
    assert_eq!(quads.len(), 2);
    assert_eq!(manager.store().len(), 2);
    assert_eq!(web.calls(), 1);
}

// Follows NEXT links only, with a fixed priority per target
struct Prioritized(HashMap<String, f64>);

impl LinkExtractor for Prioritized {
    fn extract(&self, input: &ExtractInput<'_>) -> anyhow::Result<Vec<Link>> {
        Ok(input
            .quads
            .iter()
            .filter(|quad| quad.predicate == Term::iri(NEXT))
            .filter_map(|quad| quad.object.as_iri())
            .map(|target| {
                let priority = self.0.get(target).copied().unwrap_or(0.0);
                Link::new(target).with_priority(priority)
            })
            .collect())
    }
}

#[tokio::test]
async fn test_priority_crawl_follows_updated_priorities() {
    let mut web = MockWeb {
        delay: Duration::from_millis(20),
        ..MockWeb::default()
    };
    let children: Vec<String> = (0..3).map(|i| url("c", i)).collect();
    web.add_fanout(&url("s", 0), &children);
    let web = Arc::new(web);

    let priorities = HashMap::from([
        (url("c", 0), 3.0),
        (url("c", 1), 2.0),
        (url("c", 2), 1.0),
    ]);
    let manager = TraversalManager::builder()
        .seed(Link::new(url("s", 0)))
        .queue(PriorityQueue::new())
        .extractor(Arc::new(Prioritized(priorities)))
        .dereferencer(web.clone())
        .concurrency(1)
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();

    // wait until the highest-priority child is being fetched
    while web.calls() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let boost = HashMap::from([(url("c", 2), 10.0), (url("gone", 0), 5.0)]);
    assert_eq!(manager.update_priorities(&boost), 1);
    manager.wait().await;

    assert_eq!(
        web.fetch_order(),
        vec![url("s", 0), url("c", 0), url("c", 2), url("c", 1)]
    );
}

#[tokio::test]
async fn test_stop_lets_a_running_fetch_finish() {
    let mut web = MockWeb {
        delay: Duration::from_millis(30),
        ..MockWeb::default()
    };
    web.add_chain("a", 3, false);
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    manager.stop();
    manager.wait().await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    // the fetch ran to the end, but its result was thrown away
    assert_eq!(web.completed.load(Ordering::SeqCst), 1);
    assert_eq!(web.calls(), 1);
    assert!(manager.store().is_empty());
    assert!(manager.store().contained_sources().is_empty());
}

#[tokio::test]
async fn test_failure_reaches_a_source_over_an_already_started_manager() {
    let mut web = MockWeb::default();
    web.add_chain("a", 3, false);
    web.failing.insert(url("a", 1));
    let web = Arc::new(web);

    let manager = TraversalManager::builder()
        .seed(Link::new(url("a", 0)))
        .dereferencer(web.clone())
        .build()
        .unwrap();
    manager.start(QueryContext::new(), |_| {}).unwrap();

    let source = TraversalSource::new(manager.clone(), QueryContext::new());
    let (_, errors) = drain(&source).await;

    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_fetch());
    assert!(source.error().is_some());
}
