//! Step handler seam.
//!
//! The engine treats the business logic behind each step as an opaque pair
//! of operations: a forward `execute` and a backward `compensate`. Calling
//! code implements [`StepHandler`] and wires it into a
//! [`StepDefinition`](crate::definition::StepDefinition).

use crate::context::SagaContext;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a step handler.
///
/// The orchestrator never propagates this to its caller; it is recorded on
/// the step and drives the retry/compensation path.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StepHandlerError(pub String);

impl StepHandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for StepHandlerError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StepHandlerError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Forward and backward operations for one saga step.
///
/// `execute` is awaited under a deadline. On expiry the orchestrator
/// abandons the race and takes the failure path, but the in-flight
/// invocation is not forcibly cancelled: handlers must be idempotent or
/// handle their own cancellation to avoid orphaned side effects.
///
/// `compensate` is best-effort and invoked exactly once per completed step
/// in the rollback path; it is never retried.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Perform the step's forward action.
    async fn execute(
        &self,
        payload: &Value,
        context: &SagaContext,
    ) -> Result<Value, StepHandlerError>;

    /// Undo a previously completed invocation of this step.
    async fn compensate(
        &self,
        payload: &Value,
        context: &SagaContext,
    ) -> Result<(), StepHandlerError>;
}
