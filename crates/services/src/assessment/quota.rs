//! Quota oracle consulted before every pipeline assessment.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use practice_core::model::LearnerId;

use crate::error::ProviderError;

/// External authority over per-learner assessment budgets.
///
/// The pipeline checks the budget before doing any work and debits it only
/// after producing a result that reflects a real scoring attempt.
#[async_trait]
pub trait QuotaOracle: Send + Sync {
    /// Whether the learner can cover `units` more quota units.
    ///
    /// # Errors
    ///
    /// Returns an error when the oracle cannot be consulted at all; the
    /// assessment is then rejected before any side effect.
    async fn has_budget(&self, learner_id: LearnerId, units: u32) -> Result<bool, ProviderError>;

    /// Charges `units` against the learner's budget.
    ///
    /// # Errors
    ///
    /// Returns an error when the charge cannot be recorded.
    async fn debit(&self, learner_id: LearnerId, units: u32, reason: &str)
    -> Result<(), ProviderError>;
}

/// In-memory quota with a fixed per-learner limit.
///
/// Backs tests and embedded deployments where no external metering service
/// exists.
#[derive(Debug)]
pub struct FixedQuota {
    limit: u32,
    used: Mutex<HashMap<LearnerId, u32>>,
}

impl FixedQuota {
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: Mutex::new(HashMap::new()),
        }
    }

    /// Units already charged to a learner.
    #[must_use]
    pub fn used_by(&self, learner_id: LearnerId) -> u32 {
        self.used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&learner_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuotaOracle for FixedQuota {
    async fn has_budget(&self, learner_id: LearnerId, units: u32) -> Result<bool, ProviderError> {
        Ok(self.used_by(learner_id).saturating_add(units) <= self.limit)
    }

    async fn debit(
        &self,
        learner_id: LearnerId,
        units: u32,
        _reason: &str,
    ) -> Result<(), ProviderError> {
        let mut used = self.used.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = used.entry(learner_id).or_insert(0);
        *entry = entry.saturating_add(units);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_runs_out_after_debits() {
        let quota = FixedQuota::new(4);
        let learner = LearnerId::new(1);

        assert!(quota.has_budget(learner, 3).await.unwrap());
        quota.debit(learner, 3, "essay").await.unwrap();

        assert!(quota.has_budget(learner, 1).await.unwrap());
        assert!(!quota.has_budget(learner, 2).await.unwrap());
        assert_eq!(quota.used_by(learner), 3);
    }

    #[tokio::test]
    async fn learners_are_metered_independently() {
        let quota = FixedQuota::new(1);

        quota.debit(LearnerId::new(1), 1, "short answer").await.unwrap();

        assert!(!quota.has_budget(LearnerId::new(1), 1).await.unwrap());
        assert!(quota.has_budget(LearnerId::new(2), 1).await.unwrap());
    }
}
