//! Domain events published by the services.
//!
//! Delivery is fire-and-forget; a sink that drops events never blocks or
//! fails the workflow that produced them.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use practice_core::model::{DifficultyTier, ItemId, LearnerId};

/// Events raised by the practice workflows.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DomainEvent {
    /// A learner crossed an unlock threshold and gained a difficulty tier.
    TierUnlocked {
        learner_id: LearnerId,
        tier: DifficultyTier,
        at: DateTime<Utc>,
    },
    /// The assessment pipeline produced a result for a free-text answer.
    AssessmentCompleted {
        learner_id: LearnerId,
        item_id: ItemId,
        score: f64,
        max_score: f64,
        at: DateTime<Utc>,
    },
}

/// Receiver for [`DomainEvent`]s.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn publish(&self, _event: DomainEvent) {}
}

/// Sink that stores events in memory so tests can assert on them.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in publish order.
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
