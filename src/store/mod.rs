//! SagaStore port trait definition.
//!
//! The engine requires only this narrow contract from its persistence
//! backend: one record per saga, atomic per-record updates, and two
//! lookups. The bundled [`memory::InMemorySagaStore`] is the reference
//! implementation for non-durable deployments; production deployments plug
//! a durable document/key-value backend into the same trait.

pub mod memory;

use crate::saga::{Saga, SagaId, SagaStatus, StepStatus};
use async_trait::async_trait;
use serde_json::Value;

/// Errors that can occur when operating on the saga store.
#[derive(Debug, thiserror::Error)]
pub enum SagaStoreError<E> {
    /// The requested saga record does not exist.
    #[error("saga not found: {saga_id}")]
    NotFound {
        /// The saga ID that was not found.
        saga_id: SagaId,
    },

    /// The saga record has no step with the given name.
    #[error("saga {saga_id} has no step named '{step}'")]
    UnknownStep { saga_id: SagaId, step: String },

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(E),
}

impl<E> SagaStoreError<E> {
    /// Create a not found error.
    pub fn not_found(saga_id: SagaId) -> Self {
        Self::NotFound { saga_id }
    }

    /// Create an unknown step error.
    pub fn unknown_step(saga_id: SagaId, step: impl Into<String>) -> Self {
        Self::UnknownStep {
            saga_id,
            step: step.into(),
        }
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl<E> From<E> for SagaStoreError<E> {
    fn from(err: E) -> Self {
        SagaStoreError::Backend(err)
    }
}

/// Trait for saga record storage.
///
/// Every operation must be atomic with respect to a single saga record: no
/// partially applied update may become visible to a concurrent reader.
/// Update operations refresh the record's `updated_at`.
///
/// # Multi-process deployments
///
/// Several orchestrator processes may share one durable store only if the
/// backend guarantees atomic per-saga updates. This contract defines no
/// per-saga lease; if two processes must be prevented from driving the same
/// saga, a conditional write on a version field belongs at this seam.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// The error type for this implementation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a saga record, replacing any existing record with the same
    /// id wholesale.
    async fn save(&self, saga: &Saga) -> Result<(), SagaStoreError<Self::Error>>;

    /// Update saga-level status, optionally recording a failure message.
    async fn update_status(
        &self,
        saga_id: &SagaId,
        status: SagaStatus,
        error: Option<String>,
    ) -> Result<(), SagaStoreError<Self::Error>>;

    /// Update one step's status and outcome inside the saga record.
    ///
    /// `result` and `error` are applied only when present, so a status-only
    /// transition does not erase a previously recorded outcome.
    async fn update_step_status(
        &self,
        saga_id: &SagaId,
        step_name: &str,
        status: StepStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), SagaStoreError<Self::Error>>;

    /// Fetch a saga record by id.
    async fn find_by_id(&self, saga_id: &SagaId) -> Result<Saga, SagaStoreError<Self::Error>>;

    /// Fetch all saga records currently in the given status.
    async fn find_by_status(
        &self,
        status: SagaStatus,
    ) -> Result<Vec<Saga>, SagaStoreError<Self::Error>>;
}
