// src/queue/limit.rs
// =============================================================================
// Queue decorators that bound how much gets traversed.
//
// - CountLimitQueue: a budget of pushes; once spent, every push is refused
// - DepthLimitQueue: depth(child) = depth(parent) + 1, refused past the limit
//
// Depth needs the real parent at push time. Seeds are pushed with themselves
// as parent and end up at depth 1.
// =============================================================================

use std::collections::HashMap;

use super::LinkQueue;
use crate::link::Link;

pub struct CountLimitQueue<Q> {
    inner: Q,
    remaining: usize,
}

impl<Q: LinkQueue> CountLimitQueue<Q> {
    pub fn new(inner: Q, limit: usize) -> Self {
        CountLimitQueue {
            inner,
            remaining: limit,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<Q: LinkQueue> LinkQueue for CountLimitQueue<Q> {
    // The budget is spent even if the inner queue refuses the link
    fn push(&mut self, link: Link, parent: &Link) -> bool {
        if self.remaining == 0 {
            tracing::debug!(url = %link.url, "Link refused, push budget spent");
            return false;
        }
        self.remaining -= 1;
        self.inner.push(link, parent)
    }

    fn pop(&mut self) -> Option<Link> {
        self.inner.pop()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn update_all_priorities(&mut self, priorities: &HashMap<String, f64>) -> usize {
        self.inner.update_all_priorities(priorities)
    }
}

pub struct DepthLimitQueue<Q> {
    inner: Q,
    max_depth: usize,
}

impl<Q: LinkQueue> DepthLimitQueue<Q> {
    pub fn new(inner: Q, max_depth: usize) -> Self {
        DepthLimitQueue { inner, max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl<Q: LinkQueue> LinkQueue for DepthLimitQueue<Q> {
    fn push(&mut self, mut link: Link, parent: &Link) -> bool {
        let depth = parent.depth() + 1;
        if depth > self.max_depth {
            tracing::debug!(url = %link.url, depth, "Link refused, too deep");
            return false;
        }
        link.metadata.depth = Some(depth);
        self.inner.push(link, parent)
    }

    fn pop(&mut self) -> Option<Link> {
        self.inner.pop()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn update_all_priorities(&mut self, priorities: &HashMap<String, f64>) -> usize {
        self.inner.update_all_priorities(priorities)
    }
}
