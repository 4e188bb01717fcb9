// src/queue/filter.rs
// =============================================================================
// Queue decorator that drops unwanted links.
//
// Each filter is a predicate over a link: true means "keep". Filtering
// happens on pop, so links already sitting in the inner queue are covered too.
// A rejected link is discarded for good, never re-queued.
// =============================================================================

use std::collections::HashMap;

use super::LinkQueue;
use crate::link::Link;

pub type LinkFilter = Box<dyn Fn(&Link) -> bool + Send>;

pub struct FilterQueue<Q> {
    inner: Q,
    filters: Vec<LinkFilter>,
}

impl<Q: LinkQueue> FilterQueue<Q> {
    pub fn new(inner: Q, filters: Vec<LinkFilter>) -> Self {
        FilterQueue { inner, filters }
    }

    pub fn add_filter(&mut self, filter: LinkFilter) {
        self.filters.push(filter);
    }

    pub fn inner(&self) -> &Q {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Q {
        &mut self.inner
    }

    fn accepts(&self, link: &Link) -> bool {
        self.filters.iter().all(|filter| filter(link))
    }
}

impl<Q: LinkQueue> LinkQueue for FilterQueue<Q> {
    fn push(&mut self, link: Link, parent: &Link) -> bool {
        self.inner.push(link, parent)
    }

    fn pop(&mut self) -> Option<Link> {
        while let Some(link) = self.inner.pop() {
            if self.accepts(&link) {
                return Some(link);
            }
            tracing::debug!(url = %link.url, "Link dropped by queue filter");
        }
        None
    }

    // Counts links not yet filtered, so this may overestimate
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn update_all_priorities(&mut self, priorities: &HashMap<String, f64>) -> usize {
        self.inner.update_all_priorities(priorities)
    }
}
