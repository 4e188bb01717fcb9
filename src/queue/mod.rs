// src/queue/mod.rs
// =============================================================================
// This module holds the pending-links queue and its variants.
//
// Disciplines (where links come out in which order):
// - fifo: arrival order, like a plain breadth-first crawl
// - priority: binary max-heap keyed on link priority
//
// Decorators (wrap any queue and intercept pushes or pops):
// - filter: drops links rejected by a predicate
// - count limit: accepts at most N pushes
// - depth limit: rejects links too far from a seed
//
// Queue operations are synchronous and never await, so a worker holding the
// queue lock can't race another worker on the heap structure.
// =============================================================================

mod fifo;
mod filter;
mod limit;
mod priority;

pub use fifo::FifoQueue;
pub use filter::{FilterQueue, LinkFilter};
pub use limit::{CountLimitQueue, DepthLimitQueue};
pub use priority::{PriorityQueue, PriorityUpdate};

use std::collections::HashMap;

use crate::link::Link;

/// An ordered multiset of links waiting to be dereferenced.
pub trait LinkQueue: Send {
    /// Offers `link`, discovered while processing `parent`.
    ///
    /// Returns false when the queue (or a decorator) refuses the link. That is
    /// not an error: the link is simply not traversed. Seeds are pushed with
    /// themselves as parent.
    fn push(&mut self, link: Link, parent: &Link) -> bool;

    /// Removes the next link, or `None` when nothing is left.
    fn pop(&mut self) -> Option<Link>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-prioritizes queued links in bulk (url -> new priority) and returns
    /// how many moved. Urls that aren't queued are ignored, and disciplines
    /// without priorities ignore the whole call.
    fn update_all_priorities(&mut self, _priorities: &HashMap<String, f64>) -> usize {
        0
    }
}

// Lets decorators wrap a queue whose concrete type is only known at runtime
// (for example one built from a config file)
impl LinkQueue for Box<dyn LinkQueue> {
    fn push(&mut self, link: Link, parent: &Link) -> bool {
        (**self).push(link, parent)
    }

    fn pop(&mut self) -> Option<Link> {
        (**self).pop()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn update_all_priorities(&mut self, priorities: &HashMap<String, f64>) -> usize {
        (**self).update_all_priorities(priorities)
    }
}
