//! In-memory implementation of SagaStore.
//!
//! Thread-safe and dependency-free; the reference store for non-durable
//! deployments, tests, and local development. All state is lost on process
//! exit, and the store is single-process by definition.

use crate::saga::{Saga, SagaId, SagaStatus, StepStatus};
use crate::store::{SagaStore, SagaStoreError};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// In-memory saga store.
///
/// Uses a `parking_lot::RwLock` over a `HashMap` keyed by saga id. Each
/// write takes the lock for the duration of the update, so per-record
/// atomicity holds trivially: a reader observes either the record before or
/// after an update, never a partial write.
#[derive(Debug, Default)]
pub struct InMemorySagaStore {
    sagas: RwLock<HashMap<SagaId, Saga>>,
}

impl InMemorySagaStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            sagas: RwLock::new(HashMap::new()),
        }
    }

    /// Number of saga records held.
    pub fn saga_count(&self) -> usize {
        self.sagas.read().len()
    }

    /// Drop all records (useful for testing).
    pub fn clear(&self) {
        self.sagas.write().clear();
    }
}

/// The in-memory store has no backend failure modes; misses are reported
/// through [`SagaStoreError`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryStoreError {}

#[async_trait::async_trait]
impl SagaStore for InMemorySagaStore {
    type Error = InMemoryStoreError;

    async fn save(&self, saga: &Saga) -> Result<(), SagaStoreError<Self::Error>> {
        self.sagas
            .write()
            .insert(saga.saga_id.clone(), saga.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        saga_id: &SagaId,
        status: SagaStatus,
        error: Option<String>,
    ) -> Result<(), SagaStoreError<Self::Error>> {
        let mut sagas = self.sagas.write();
        let saga = sagas
            .get_mut(saga_id)
            .ok_or_else(|| SagaStoreError::not_found(saga_id.clone()))?;

        saga.status = status;
        if error.is_some() {
            saga.error = error;
        }
        saga.updated_at = Utc::now();
        Ok(())
    }

    async fn update_step_status(
        &self,
        saga_id: &SagaId,
        step_name: &str,
        status: StepStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), SagaStoreError<Self::Error>> {
        let mut sagas = self.sagas.write();
        let saga = sagas
            .get_mut(saga_id)
            .ok_or_else(|| SagaStoreError::not_found(saga_id.clone()))?;

        // Later duplicates shadow earlier ones, same as result lookup.
        let step = saga
            .steps
            .iter_mut()
            .rev()
            .find(|s| s.name == step_name)
            .ok_or_else(|| SagaStoreError::unknown_step(saga_id.clone(), step_name))?;

        step.status = status;
        if result.is_some() {
            step.result = result;
        }
        if error.is_some() {
            step.error = error;
        }
        saga.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_id(&self, saga_id: &SagaId) -> Result<Saga, SagaStoreError<Self::Error>> {
        self.sagas
            .read()
            .get(saga_id)
            .cloned()
            .ok_or_else(|| SagaStoreError::not_found(saga_id.clone()))
    }

    async fn find_by_status(
        &self,
        status: SagaStatus,
    ) -> Result<Vec<Saga>, SagaStoreError<Self::Error>> {
        Ok(self
            .sagas
            .read()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saga::StepRecord;
    use serde_json::json;

    fn sample_saga() -> Saga {
        Saga::new(
            "order-fulfillment",
            vec![
                StepRecord::pending("reserve-inventory", "inventory"),
                StepRecord::pending("charge-payment", "billing"),
            ],
            json!({"order_id": "ORD-001"}),
            3,
        )
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let store = InMemorySagaStore::new();
        let saga = sample_saga();

        store.save(&saga).await.unwrap();
        assert_eq!(store.saga_count(), 1);

        let loaded = store.find_by_id(&saga.saga_id).await.unwrap();
        assert_eq!(loaded.saga_type, "order-fulfillment");
        assert_eq!(loaded.steps.len(), 2);
    }

    #[tokio::test]
    async fn find_missing_saga_is_not_found() {
        let store = InMemorySagaStore::new();
        let err = store.find_by_id(&SagaId::from("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_status_refreshes_updated_at() {
        let store = InMemorySagaStore::new();
        let saga = sample_saga();
        store.save(&saga).await.unwrap();

        store
            .update_status(&saga.saga_id, SagaStatus::Running, None)
            .await
            .unwrap();

        let loaded = store.find_by_id(&saga.saga_id).await.unwrap();
        assert_eq!(loaded.status, SagaStatus::Running);
        assert!(loaded.updated_at >= saga.updated_at);
    }

    #[tokio::test]
    async fn update_status_records_error() {
        let store = InMemorySagaStore::new();
        let saga = sample_saga();
        store.save(&saga).await.unwrap();

        store
            .update_status(
                &saga.saga_id,
                SagaStatus::Failed,
                Some("carrier unavailable".to_string()),
            )
            .await
            .unwrap();

        let loaded = store.find_by_id(&saga.saga_id).await.unwrap();
        assert_eq!(loaded.status, SagaStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("carrier unavailable"));
    }

    #[tokio::test]
    async fn update_step_status_preserves_prior_outcome() {
        let store = InMemorySagaStore::new();
        let saga = sample_saga();
        store.save(&saga).await.unwrap();

        store
            .update_step_status(
                &saga.saga_id,
                "reserve-inventory",
                StepStatus::Completed,
                Some(json!({"reservation_id": "R-1"})),
                None,
            )
            .await
            .unwrap();

        // A later status-only transition keeps the recorded result.
        store
            .update_step_status(
                &saga.saga_id,
                "reserve-inventory",
                StepStatus::Compensating,
                None,
                None,
            )
            .await
            .unwrap();

        let loaded = store.find_by_id(&saga.saga_id).await.unwrap();
        let step = loaded.step("reserve-inventory").unwrap();
        assert_eq!(step.status, StepStatus::Compensating);
        assert_eq!(step.result, Some(json!({"reservation_id": "R-1"})));
    }

    #[tokio::test]
    async fn update_unknown_step_fails() {
        let store = InMemorySagaStore::new();
        let saga = sample_saga();
        store.save(&saga).await.unwrap();

        let err = store
            .update_step_status(&saga.saga_id, "no-such-step", StepStatus::Running, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaStoreError::UnknownStep { step, .. } if step == "no-such-step"));
    }

    #[tokio::test]
    async fn find_by_status_filters() {
        let store = InMemorySagaStore::new();

        let pending = sample_saga();
        store.save(&pending).await.unwrap();

        let mut failed = sample_saga();
        failed.status = SagaStatus::Failed;
        store.save(&failed).await.unwrap();

        let found = store.find_by_status(SagaStatus::Failed).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].saga_id, failed.saga_id);

        assert!(store
            .find_by_status(SagaStatus::Completed)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let store = InMemorySagaStore::new();
        store.save(&sample_saga()).await.unwrap();
        assert_eq!(store.saga_count(), 1);

        store.clear();
        assert_eq!(store.saga_count(), 0);
    }
}
