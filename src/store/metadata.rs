// src/store/metadata.rs
// =============================================================================
// Metadata handed out alongside every cursor.
//
// A MetadataHandle is a snapshot: a cardinality plus a validation state. When
// the data behind a snapshot changes, the store invalidates its validation
// state (once, for good) and publishes a new handle. Consumers notice via
// `is_valid()` or by awaiting `invalidated()`, then ask the cursor for a
// fresh handle.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityKind {
    /// More data may still arrive
    Estimate,
    /// The store has ended, the count is final
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    #[serde(rename = "type")]
    pub kind: CardinalityKind,
    pub value: u64,
}

impl Cardinality {
    pub fn estimate(value: u64) -> Self {
        Cardinality {
            kind: CardinalityKind::Estimate,
            value,
        }
    }

    pub fn exact(value: u64) -> Self {
        Cardinality {
            kind: CardinalityKind::Exact,
            value,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.kind == CardinalityKind::Exact
    }

    // Sums two cardinalities; exact only when both sides are
    pub fn combine(self, other: Cardinality) -> Cardinality {
        let kind = if self.is_exact() && other.is_exact() {
            CardinalityKind::Exact
        } else {
            CardinalityKind::Estimate
        };
        Cardinality {
            kind,
            value: self.value + other.value,
        }
    }
}

/// One-shot invalidation flag.
#[derive(Debug, Default)]
pub struct ValidationState {
    invalid: AtomicBool,
    notify: Notify,
}

impl ValidationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid.load(Ordering::Acquire)
    }

    // Safe to call more than once; only the first call has an effect
    pub fn invalidate(&self) {
        if !self.invalid.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    // Resolves once this state has been invalidated
    pub async fn invalidated(&self) {
        // notify_waiters reaches a Notified future as soon as it is created,
        // so creating it before the flag check can't miss a wakeup
        let notified = self.notify.notified();
        if !self.is_valid() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Clone)]
pub struct MetadataHandle {
    pub cardinality: Cardinality,
    pub state: Arc<ValidationState>,
}

impl MetadataHandle {
    pub fn new(cardinality: Cardinality) -> Self {
        MetadataHandle {
            cardinality,
            state: Arc::new(ValidationState::new()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_is_exact_only_if_both_are() {
        let sum = Cardinality::exact(2).combine(Cardinality::estimate(3));
        assert_eq!(sum, Cardinality::estimate(5));

        let sum = Cardinality::exact(2).combine(Cardinality::exact(3));
        assert_eq!(sum, Cardinality::exact(5));
    }

    #[test]
    fn test_invalidate_is_one_shot() {
        let state = ValidationState::new();
        assert!(state.is_valid());
        state.invalidate();
        state.invalidate();
        assert!(!state.is_valid());
    }

    #[tokio::test]
    async fn test_invalidated_resolves_for_waiting_task() {
        let handle = MetadataHandle::new(Cardinality::estimate(0));
        let state = handle.state.clone();
        let waiter = tokio::spawn(async move { state.invalidated().await });

        tokio::task::yield_now().await;
        handle.state.invalidate();
        waiter.await.unwrap();
        assert!(!handle.is_valid());

        // already invalid: returns right away
        handle.state.invalidated().await;
    }

    #[test]
    fn test_cardinality_json_shape() {
        let json = serde_json::to_value(Cardinality::estimate(7)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "estimate", "value": 7 }));
    }
}
