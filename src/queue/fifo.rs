// src/queue/fifo.rs
// =============================================================================
// Arrival-order queue: the breadth-first discipline.
//
// Links come out in exactly the order they went in. Both operations are O(1)
// thanks to VecDeque.
// =============================================================================

use std::collections::VecDeque;

use super::LinkQueue;
use crate::link::Link;

#[derive(Debug, Default)]
pub struct FifoQueue {
    links: VecDeque<Link>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkQueue for FifoQueue {
    fn push(&mut self, link: Link, _parent: &Link) -> bool {
        self.links.push_back(link);
        true
    }

    fn pop(&mut self) -> Option<Link> {
        self.links.pop_front()
    }

    fn len(&self) -> usize {
        self.links.len()
    }
}
