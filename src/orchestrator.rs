//! The saga orchestrator: forward execution, retry, timeout, compensation.
//!
//! [`SagaOrchestrator::execute`] walks a registered saga's steps in order,
//! writing every state transition through the store before proceeding. A
//! crash mid-saga therefore leaves recoverable state: the last persisted
//! status is always consistent with "this step was entered", and a step
//! stuck in `Running` must be treated as unknown/failed by recovery.

use crate::context::SagaContext;
use crate::definition::{SagaDefinition, SagaRegistry};
use crate::error::SagaError;
use crate::saga::{Saga, SagaId, SagaStatus, StepRecord, StepStatus};
use crate::store::{SagaStore, SagaStoreError};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of one saga execution, returned to the caller.
///
/// Business-level failures are reported here, never as an `Err`: `status`
/// reflects the outcome, `failed_step` names the step that triggered
/// compensation, and `compensated_steps` lists only the steps whose
/// compensation *succeeded*, so partial rollback is detectable.
#[derive(Debug, Clone, Serialize)]
pub struct SagaExecutionResult {
    pub saga_id: SagaId,
    pub saga_type: String,
    pub status: SagaStatus,
    /// Step name to step output; present only on completion.
    pub result: Option<HashMap<String, Value>>,
    pub error: Option<String>,
    /// Steps that reached `Completed`, in completion order.
    pub completed_steps: Vec<String>,
    pub failed_step: Option<String>,
    /// Steps successfully compensated, in compensation (reverse) order.
    pub compensated_steps: Vec<String>,
    pub duration: Duration,
}

/// Coordinates multi-step distributed transactions against a
/// [`SagaStore`] backend.
///
/// Each saga instance runs as a single logical task: steps execute
/// sequentially, compensations run in reverse completion order, and no
/// ordering exists between different instances. The orchestrator never
/// starts two concurrent executions for one saga id.
pub struct SagaOrchestrator<S: SagaStore> {
    registry: Arc<SagaRegistry>,
    store: Arc<S>,
    in_flight: DashMap<SagaId, ()>,
}

impl<S: SagaStore> SagaOrchestrator<S> {
    pub fn new(registry: Arc<SagaRegistry>, store: Arc<S>) -> Self {
        Self {
            registry,
            store,
            in_flight: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &SagaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute a registered saga type against the given payload.
    ///
    /// Returns `Err` only for caller errors (unregistered type, duplicate
    /// execution) and store failures; handler failures and timeouts are
    /// folded into the returned [`SagaExecutionResult`].
    pub async fn execute(
        &self,
        saga_type: &str,
        payload: Value,
        metadata: Option<Value>,
    ) -> Result<SagaExecutionResult, SagaError> {
        let definition = self
            .registry
            .get(saga_type)
            .ok_or_else(|| SagaError::UnregisteredSagaType(saga_type.to_string()))?;

        let steps = definition
            .steps
            .iter()
            .map(|s| StepRecord::pending(s.name.clone(), s.service.clone()))
            .collect();
        let saga = Saga::new(
            saga_type,
            steps,
            payload,
            definition.options.max_retries,
        );

        self.run_instance(definition, saga, metadata.unwrap_or(Value::Null))
            .await
    }

    /// Re-run a terminally failed saga from step 0.
    ///
    /// The failed record is kept as an immutable audit trail (only its
    /// `retry_count` is bumped); the re-run is a brand-new instance sharing
    /// the original payload. There is no partial resume: steps that
    /// succeeded in the failed run execute again.
    pub async fn retry_saga(&self, saga_id: &SagaId) -> Result<SagaExecutionResult, SagaError> {
        let mut failed = self
            .store
            .find_by_id(saga_id)
            .await
            .map_err(store_error)?;

        if failed.status != SagaStatus::Failed {
            return Err(SagaError::InvalidState {
                saga_id: saga_id.clone(),
                status: failed.status,
                expected: SagaStatus::Failed,
            });
        }

        let definition = self
            .registry
            .get(&failed.saga_type)
            .ok_or_else(|| SagaError::UnregisteredSagaType(failed.saga_type.clone()))?;

        failed.retry_count += 1;
        failed.touch();
        self.store.save(&failed).await.map_err(store_error)?;

        let steps = definition
            .steps
            .iter()
            .map(|s| StepRecord::pending(s.name.clone(), s.service.clone()))
            .collect();
        let saga = Saga::new(
            failed.saga_type.clone(),
            steps,
            failed.payload.clone(),
            definition.options.max_retries,
        );

        info!(
            original_saga_id = %saga_id,
            new_saga_id = %saga.saga_id,
            saga_type = %saga.saga_type,
            "retrying failed saga from step 0"
        );

        self.run_instance(definition, saga, Value::Null).await
    }

    /// Fetch the persisted record for a saga.
    pub async fn get_saga_status(&self, saga_id: &SagaId) -> Result<Saga, SagaError> {
        self.store.find_by_id(saga_id).await.map_err(store_error)
    }

    /// All sagas currently in `Failed` status.
    pub async fn get_failed_sagas(&self) -> Result<Vec<Saga>, SagaError> {
        self.store
            .find_by_status(SagaStatus::Failed)
            .await
            .map_err(store_error)
    }

    async fn run_instance(
        &self,
        definition: Arc<SagaDefinition>,
        mut saga: Saga,
        metadata: Value,
    ) -> Result<SagaExecutionResult, SagaError> {
        let started = Instant::now();
        let _guard = InFlightGuard::acquire(&self.in_flight, &saga.saga_id)?;
        let persist = definition.options.persist_state;

        info!(
            saga_id = %saga.saga_id,
            saga_type = %saga.saga_type,
            steps = definition.steps.len(),
            "starting saga"
        );

        if persist {
            self.store.save(&saga).await.map_err(store_error)?;
        }

        saga.status = SagaStatus::Running;
        saga.touch();
        if persist {
            self.store
                .update_status(&saga.saga_id, SagaStatus::Running, None)
                .await
                .map_err(store_error)?;
        }

        let mut results: HashMap<String, Value> = HashMap::new();
        let mut completed: Vec<String> = Vec::new();

        let mut index = 0;
        while index < definition.steps.len() {
            let step = &definition.steps[index];
            let context = SagaContext::new(
                saga.saga_id.clone(),
                saga.saga_type.clone(),
                step.name.clone(),
                results.clone(),
                metadata.clone(),
            );

            saga.record_step(&step.name, StepStatus::Running, None, None);
            if persist {
                self.store
                    .update_step_status(&saga.saga_id, &step.name, StepStatus::Running, None, None)
                    .await
                    .map_err(store_error)?;
            }

            let deadline = step.timeout.unwrap_or(definition.options.timeout);
            // The deadline timer is owned by this race and dropped with it,
            // whichever side wins. The handler's own future is abandoned on
            // expiry, not cancelled; see the StepHandler contract.
            let outcome =
                match tokio::time::timeout(deadline, step.handler.execute(&saga.payload, &context))
                    .await
                {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err(format!(
                        "step '{}' timed out after {}ms",
                        step.name,
                        deadline.as_millis()
                    )),
                };

            match outcome {
                Ok(output) => {
                    debug!(saga_id = %saga.saga_id, step = %step.name, "step completed");
                    saga.record_step(
                        &step.name,
                        StepStatus::Completed,
                        Some(output.clone()),
                        None,
                    );
                    if persist {
                        self.store
                            .update_step_status(
                                &saga.saga_id,
                                &step.name,
                                StepStatus::Completed,
                                Some(output.clone()),
                                None,
                            )
                            .await
                            .map_err(store_error)?;
                    }
                    results.insert(step.name.clone(), output);
                    completed.push(step.name.clone());
                    index += 1;
                }
                Err(message) => {
                    warn!(
                        saga_id = %saga.saga_id,
                        step = %step.name,
                        error = %message,
                        "step failed"
                    );
                    saga.record_step(&step.name, StepStatus::Failed, None, Some(message.clone()));
                    if persist {
                        self.store
                            .update_step_status(
                                &saga.saga_id,
                                &step.name,
                                StepStatus::Failed,
                                None,
                                Some(message.clone()),
                            )
                            .await
                            .map_err(store_error)?;
                    }

                    let budget = step.max_retries.unwrap_or(definition.options.max_retries);
                    if step.retryable && saga.retry_count < budget {
                        saga.retry_count += 1;
                        saga.touch();
                        if persist {
                            self.store.save(&saga).await.map_err(store_error)?;
                        }
                        // Linear backoff scaled by attempt count, not
                        // exponential.
                        let delay = definition.options.retry_delay * saga.retry_count;
                        info!(
                            saga_id = %saga.saga_id,
                            step = %step.name,
                            attempt = saga.retry_count,
                            delay_ms = delay.as_millis() as u64,
                            "retrying step"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let compensated = self
                        .compensate(&definition, &mut saga, &completed, &results, &metadata)
                        .await?;

                    saga.status = SagaStatus::Failed;
                    saga.error = Some(message.clone());
                    saga.touch();
                    if persist {
                        self.store
                            .update_status(&saga.saga_id, SagaStatus::Failed, Some(message.clone()))
                            .await
                            .map_err(store_error)?;
                    }

                    warn!(
                        saga_id = %saga.saga_id,
                        failed_step = %step.name,
                        compensated = compensated.len(),
                        "saga failed"
                    );

                    return Ok(SagaExecutionResult {
                        saga_id: saga.saga_id,
                        saga_type: saga.saga_type,
                        status: SagaStatus::Failed,
                        result: None,
                        error: Some(message),
                        completed_steps: completed,
                        failed_step: Some(step.name.clone()),
                        compensated_steps: compensated,
                        duration: started.elapsed(),
                    });
                }
            }
        }

        saga.result = Some(results.clone());
        saga.status = SagaStatus::Completed;
        saga.touch();
        if persist {
            // Final write carries the merged result map.
            self.store.save(&saga).await.map_err(store_error)?;
        }

        info!(
            saga_id = %saga.saga_id,
            steps = completed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "saga completed"
        );

        Ok(SagaExecutionResult {
            saga_id: saga.saga_id,
            saga_type: saga.saga_type,
            status: SagaStatus::Completed,
            result: Some(results),
            error: None,
            completed_steps: completed,
            failed_step: None,
            compensated_steps: Vec::new(),
            duration: started.elapsed(),
        })
    }

    /// Compensate every completed step, in reverse completion order.
    ///
    /// Best-effort: a failed compensation is logged and excluded from the
    /// returned list, but the loop always continues to the earlier steps.
    /// Compensation itself is never retried.
    async fn compensate(
        &self,
        definition: &SagaDefinition,
        saga: &mut Saga,
        completed: &[String],
        results: &HashMap<String, Value>,
        metadata: &Value,
    ) -> Result<Vec<String>, SagaError> {
        let persist = definition.options.persist_state;
        let mut compensated = Vec::new();

        for name in completed.iter().rev() {
            let Some(step) = definition.step(name) else {
                continue;
            };

            saga.record_step(name, StepStatus::Compensating, None, None);
            if persist {
                self.store
                    .update_step_status(&saga.saga_id, name, StepStatus::Compensating, None, None)
                    .await
                    .map_err(store_error)?;
            }

            let context = SagaContext::new(
                saga.saga_id.clone(),
                saga.saga_type.clone(),
                name.clone(),
                results.clone(),
                metadata.clone(),
            );

            match step.handler.compensate(&saga.payload, &context).await {
                Ok(()) => {
                    debug!(saga_id = %saga.saga_id, step = %name, "step compensated");
                    saga.record_step(name, StepStatus::Compensated, None, None);
                    if persist {
                        self.store
                            .update_step_status(
                                &saga.saga_id,
                                name,
                                StepStatus::Compensated,
                                None,
                                None,
                            )
                            .await
                            .map_err(store_error)?;
                    }
                    compensated.push(name.clone());
                }
                Err(err) => {
                    // Best-effort: keep compensating the earlier steps. The
                    // caller detects the gap via compensated_steps.
                    error!(
                        saga_id = %saga.saga_id,
                        step = %name,
                        error = %err,
                        "compensation failed, continuing with earlier steps"
                    );
                }
            }
        }

        Ok(compensated)
    }
}

/// Removes the saga id from the in-flight set when execution leaves scope,
/// on any path.
#[derive(Debug)]
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<SagaId, ()>,
    saga_id: SagaId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a DashMap<SagaId, ()>, saga_id: &SagaId) -> Result<Self, SagaError> {
        if in_flight.insert(saga_id.clone(), ()).is_some() {
            return Err(SagaError::AlreadyRunning(saga_id.clone()));
        }
        Ok(Self {
            in_flight,
            saga_id: saga_id.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.saga_id);
    }
}

fn store_error<E: std::error::Error>(err: SagaStoreError<E>) -> SagaError {
    match err {
        SagaStoreError::NotFound { saga_id } => SagaError::NotFound(saga_id),
        other => SagaError::Store(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStoreError;

    #[test]
    fn in_flight_guard_blocks_duplicates_and_releases() {
        let in_flight: DashMap<SagaId, ()> = DashMap::new();
        let saga_id = SagaId::from("saga-1");

        let guard = InFlightGuard::acquire(&in_flight, &saga_id).unwrap();
        let err = InFlightGuard::acquire(&in_flight, &saga_id).unwrap_err();
        assert!(matches!(err, SagaError::AlreadyRunning(id) if id == saga_id));

        drop(guard);
        assert!(InFlightGuard::acquire(&in_flight, &saga_id).is_ok());
    }

    #[test]
    fn store_not_found_maps_to_saga_not_found() {
        let err: SagaStoreError<InMemoryStoreError> =
            SagaStoreError::not_found(SagaId::from("saga-9"));
        assert!(matches!(store_error(err), SagaError::NotFound(id) if id.as_str() == "saga-9"));

        let err: SagaStoreError<InMemoryStoreError> =
            SagaStoreError::unknown_step(SagaId::from("saga-9"), "ghost");
        assert!(matches!(store_error(err), SagaError::Store(_)));
    }
}
