// src/queue/priority.rs
// =============================================================================
// Priority-order queue backed by a binary max-heap.
//
// How it works:
// - Entries live in a Vec laid out as a heap: the parent of slot i is
//   (i - 1) / 2, its children are 2i + 1 and 2i + 2
// - The highest priority is always at slot 0
// - A side table maps url -> slot so priorities can be changed in O(log n)
//   without scanning the heap
//
// Every structural change (push, pop, any swap) keeps each entry's `index`
// equal to its real slot. update_priority trusts that bookkeeping.
//
// The same url may be queued more than once. The side table then tracks one
// copy (the latest pushed); when that copy is popped, tracking moves to a
// copy that is still queued.
// =============================================================================

use std::collections::HashMap;

use super::LinkQueue;
use crate::link::Link;

#[derive(Debug)]
struct PriorityEntry {
    link: Link,
    priority: f64,
    index: usize,
}

/// Outcome of [`PriorityQueue::update_priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityUpdate {
    Increased,
    Decreased,
    /// The new priority equals the current one
    Unchanged,
    /// No queued link has this url
    NotFound,
}

#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: Vec<PriorityEntry>,
    // url -> slot of the tracked entry for that url
    positions: HashMap<String, usize>,
    // url -> how many entries for it are queued
    copies: HashMap<String, usize>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<&Link> {
        self.entries.first().map(|entry| &entry.link)
    }

    pub fn priority_of(&self, url: &str) -> Option<f64> {
        self.positions
            .get(url)
            .map(|&index| self.entries[index].priority)
    }

    // Moves the link for `url` to `priority` and restores the heap around it
    pub fn update_priority(&mut self, url: &str, priority: f64) -> PriorityUpdate {
        let Some(&index) = self.positions.get(url) else {
            return PriorityUpdate::NotFound;
        };

        let entry = &mut self.entries[index];
        let delta = priority - entry.priority;
        if delta > 0.0 {
            entry.priority = priority;
            entry.link.metadata.priority = Some(priority);
            self.up_heap(index);
            PriorityUpdate::Increased
        } else if delta < 0.0 {
            entry.priority = priority;
            entry.link.metadata.priority = Some(priority);
            self.down_heap(index);
            PriorityUpdate::Decreased
        } else {
            PriorityUpdate::Unchanged
        }
    }

    fn up_heap(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.entries[index].priority > self.entries[parent].priority {
                self.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    // The right child only wins when it is strictly greater than the left one
    fn down_heap(&mut self, mut index: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * index + 1;
            let right = 2 * index + 2;
            let mut largest = index;

            if left < len && self.entries[left].priority > self.entries[largest].priority {
                largest = left;
            }
            if right < len && self.entries[right].priority > self.entries[largest].priority {
                largest = right;
            }
            if largest == index {
                break;
            }

            self.swap(index, largest);
            index = largest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        // Decide which side-table slots follow the move before touching the Vec,
        // two entries can share a url and only one of them is tracked
        let a_tracked = self.positions.get(&self.entries[a].link.url) == Some(&a);
        let b_tracked = self.positions.get(&self.entries[b].link.url) == Some(&b);

        self.entries.swap(a, b);
        self.entries[a].index = a;
        self.entries[b].index = b;

        if a_tracked {
            self.positions.insert(self.entries[b].link.url.clone(), b);
        }
        if b_tracked {
            self.positions.insert(self.entries[a].link.url.clone(), a);
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for (i, entry) in self.entries.iter().enumerate() {
            assert_eq!(entry.index, i, "stale index for {}", entry.link.url);
            if i > 0 {
                let parent = &self.entries[(i - 1) / 2];
                assert!(
                    parent.priority >= entry.priority,
                    "heap violated at slot {}",
                    i
                );
            }
        }
        for (url, &slot) in &self.positions {
            assert_eq!(&self.entries[slot].link.url, url);
        }
        // every queued url is tracked
        for entry in &self.entries {
            assert!(self.positions.contains_key(&entry.link.url));
        }
        assert_eq!(self.positions.len(), self.copies.len());
    }
}

impl LinkQueue for PriorityQueue {
    // Links without a priority get 0, keeping the rest of their metadata
    fn push(&mut self, mut link: Link, _parent: &Link) -> bool {
        let priority = *link.metadata.priority.get_or_insert(0.0);
        let index = self.entries.len();

        self.positions.insert(link.url.clone(), index);
        *self.copies.entry(link.url.clone()).or_insert(0) += 1;
        self.entries.push(PriorityEntry {
            link,
            priority,
            index,
        });
        self.up_heap(index);
        true
    }

    fn pop(&mut self) -> Option<Link> {
        let last = self.entries.len().checked_sub(1)?;
        if last > 0 {
            self.swap(0, last);
        }

        let entry = self.entries.pop()?;
        let url = &entry.link.url;
        let was_tracked = self.positions.get(url) == Some(&last);
        if was_tracked {
            self.positions.remove(url);
        }
        if !self.entries.is_empty() {
            self.down_heap(0);
        }

        // one copy fewer; if others remain and the popped one was the tracked
        // one, track a remaining copy instead
        let remaining = match self.copies.get_mut(url) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.copies.remove(url);
        } else if was_tracked {
            if let Some(other) = self.entries.iter().find(|other| &other.link.url == url) {
                self.positions.insert(url.clone(), other.index);
            }
        }
        Some(entry.link)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    // Applies every priority whose url is queued; other urls are ignored.
    // Returns how many links actually moved.
    fn update_all_priorities(&mut self, priorities: &HashMap<String, f64>) -> usize {
        priorities
            .iter()
            .filter(|&(url, &priority)| {
                matches!(
                    self.update_priority(url, priority),
                    PriorityUpdate::Increased | PriorityUpdate::Decreased
                )
            })
            .count()
    }
}
