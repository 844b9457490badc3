//! Durable saga data model.
//!
//! A [`Saga`] is the persisted record of one distributed transaction: the
//! ordered [`StepRecord`]s, the opaque business payload, and the lifecycle
//! status. Once created, the record is owned by the
//! [`SagaStore`](crate::store::SagaStore); the orchestrator mutates it only
//! through store operations, mirroring every change in its local copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Unique identifier for a saga instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SagaId(pub String);

impl SagaId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SagaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SagaId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SagaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Saga-level lifecycle status.
///
/// Forward path: `Pending → Running → {Completed | Failed}`. Terminal
/// states are left only by a manual retry, which re-enters at `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SagaStatus {
    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: SagaStatus) -> bool {
        matches!(
            (self, next),
            (SagaStatus::Pending, SagaStatus::Running)
                | (SagaStatus::Running, SagaStatus::Completed)
                | (SagaStatus::Running, SagaStatus::Failed)
                | (SagaStatus::Completed, SagaStatus::Pending)
                | (SagaStatus::Failed, SagaStatus::Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Failed)
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SagaStatus::Pending => write!(f, "PENDING"),
            SagaStatus::Running => write!(f, "RUNNING"),
            SagaStatus::Completed => write!(f, "COMPLETED"),
            SagaStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Per-step lifecycle status.
///
/// Forward path: `Pending → Running → Completed`. Failure path:
/// `Running → Failed`. Compensation path:
/// `Completed → Compensating → Compensated` (best-effort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "PENDING"),
            StepStatus::Running => write!(f, "RUNNING"),
            StepStatus::Completed => write!(f, "COMPLETED"),
            StepStatus::Failed => write!(f, "FAILED"),
            StepStatus::Compensating => write!(f, "COMPENSATING"),
            StepStatus::Compensated => write!(f, "COMPENSATED"),
        }
    }
}

/// One unit of work within a saga, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub service: String,
    pub status: StepStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn pending(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// The durable saga record. Persisted as one document per saga, keyed by
/// [`SagaId`], with the step records nested inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saga {
    pub saga_id: SagaId,
    pub saga_type: String,
    pub status: SagaStatus,
    /// Ordered step records; length and order are fixed at creation and
    /// define both the forward and the compensation (reverse) order.
    pub steps: Vec<StepRecord>,
    /// Opaque business input, immutable after creation.
    pub payload: Value,
    /// Step name to step output, populated only on completion.
    pub result: Option<HashMap<String, Value>>,
    pub error: Option<String>,
    /// Saga-level retry counter (manual retries and in-run step retries
    /// both draw from this).
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Saga {
    /// Build a new `Pending` saga with a fresh id.
    pub fn new(
        saga_type: impl Into<String>,
        steps: Vec<StepRecord>,
        payload: Value,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            saga_id: SagaId::new(),
            saga_type: saga_type.into(),
            status: SagaStatus::Pending,
            steps,
            payload,
            result: None,
            error: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a step record by name. With duplicate names the later step
    /// shadows the earlier one.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().rev().find(|s| s.name == name)
    }

    /// Record a step transition in this local copy, refreshing `updated_at`.
    pub fn record_step(
        &mut self,
        name: &str,
        status: StepStatus,
        result: Option<Value>,
        error: Option<String>,
    ) {
        if let Some(step) = self.steps.iter_mut().rev().find(|s| s.name == name) {
            step.status = status;
            if result.is_some() {
                step.result = result;
            }
            if error.is_some() {
                step.error = error;
            }
        }
        self.touch();
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Names of steps currently `Completed`, in step order.
    pub fn completed_step_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_step_saga() -> Saga {
        Saga::new(
            "test-saga",
            vec![
                StepRecord::pending("first", "svc-a"),
                StepRecord::pending("second", "svc-b"),
            ],
            json!({"order": 1}),
            3,
        )
    }

    #[test]
    fn new_saga_starts_pending() {
        let saga = two_step_saga();
        assert_eq!(saga.status, SagaStatus::Pending);
        assert_eq!(saga.retry_count, 0);
        assert!(saga.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert!(saga.result.is_none());
    }

    #[test]
    fn status_transitions() {
        assert!(SagaStatus::Pending.can_transition_to(SagaStatus::Running));
        assert!(SagaStatus::Running.can_transition_to(SagaStatus::Completed));
        assert!(SagaStatus::Running.can_transition_to(SagaStatus::Failed));
        // Manual retry re-enters at Pending.
        assert!(SagaStatus::Failed.can_transition_to(SagaStatus::Pending));

        assert!(!SagaStatus::Pending.can_transition_to(SagaStatus::Completed));
        assert!(!SagaStatus::Completed.can_transition_to(SagaStatus::Running));
        assert!(!SagaStatus::Failed.can_transition_to(SagaStatus::Running));
    }

    #[test]
    fn record_step_updates_matching_record() {
        let mut saga = two_step_saga();
        let before = saga.updated_at;

        saga.record_step(
            "first",
            StepStatus::Completed,
            Some(json!({"ok": true})),
            None,
        );

        let step = saga.step("first").unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.result, Some(json!({"ok": true})));
        assert!(saga.updated_at >= before);
        assert_eq!(saga.completed_step_names(), vec!["first".to_string()]);
    }

    #[test]
    fn duplicate_step_names_shadow_earlier() {
        let mut saga = Saga::new(
            "dup",
            vec![
                StepRecord::pending("step", "svc-a"),
                StepRecord::pending("step", "svc-b"),
            ],
            Value::Null,
            0,
        );
        saga.record_step("step", StepStatus::Running, None, None);
        assert_eq!(saga.steps[0].status, StepStatus::Pending);
        assert_eq!(saga.steps[1].status, StepStatus::Running);
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(SagaStatus::Running.to_string(), "RUNNING");
        assert_eq!(StepStatus::Compensating.to_string(), "COMPENSATING");
    }
}
