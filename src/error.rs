//! Error taxonomy for the orchestration engine.
//!
//! Step handler failures never surface here: they are recorded on the step
//! and drive the retry/compensation path, with the outcome reported in the
//! [`SagaExecutionResult`](crate::orchestrator::SagaExecutionResult). These
//! variants cover caller errors and store failures only.

use crate::saga::{SagaId, SagaStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SagaError {
    /// Caller error: the saga type was never registered. Nothing is
    /// persisted and nothing is retried.
    #[error("saga type not registered: {0}")]
    UnregisteredSagaType(String),

    /// A definition with no steps was offered for registration.
    #[error("saga definition '{0}' has no steps")]
    EmptyDefinition(String),

    #[error("saga not found: {0}")]
    NotFound(SagaId),

    /// A second execution was requested for a saga id that is still
    /// running. One instance is never executed concurrently with itself.
    #[error("saga already running: {0}")]
    AlreadyRunning(SagaId),

    /// The operation is not valid in the saga's current status.
    #[error("saga {saga_id} is {status}, expected {expected}")]
    InvalidState {
        saga_id: SagaId,
        status: SagaStatus,
        expected: SagaStatus,
    },

    /// A state transition could not be persisted. The run aborts here:
    /// consistency cannot be guaranteed past a failed write.
    #[error("saga store failure: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_identity() {
        let err = SagaError::UnregisteredSagaType("order-fulfillment".to_string());
        assert!(err.to_string().contains("order-fulfillment"));

        let err = SagaError::NotFound(SagaId::from("saga-42"));
        assert!(err.to_string().contains("saga-42"));

        let err = SagaError::InvalidState {
            saga_id: SagaId::from("saga-7"),
            status: SagaStatus::Running,
            expected: SagaStatus::Failed,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("saga-7"));
        assert!(rendered.contains("RUNNING"));
        assert!(rendered.contains("FAILED"));
    }
}
