//! Ephemeral per-invocation context passed to step handlers.

use crate::saga::SagaId;
use serde_json::Value;
use std::collections::HashMap;

/// Data handed to a [`StepHandler`](crate::handler::StepHandler) for one
/// invocation. Built fresh per step attempt and never persisted.
///
/// During compensation the context is rebuilt with `current_step` rebound to
/// the step being compensated; `previous_results` then holds everything the
/// forward run produced.
#[derive(Debug, Clone)]
pub struct SagaContext {
    pub saga_id: SagaId,
    pub saga_type: String,
    /// Name of the step this invocation belongs to.
    pub current_step: String,
    /// Read-only snapshot of the outputs of steps that completed before
    /// this one (steps `0..n-1` for step `n`).
    pub previous_results: HashMap<String, Value>,
    /// Caller-supplied, opaque to the engine. `Value::Null` when absent.
    pub metadata: Value,
}

impl SagaContext {
    pub(crate) fn new(
        saga_id: SagaId,
        saga_type: String,
        current_step: String,
        previous_results: HashMap<String, Value>,
        metadata: Value,
    ) -> Self {
        Self {
            saga_id,
            saga_type,
            current_step,
            previous_results,
            metadata,
        }
    }

    /// Output of an earlier step, by name.
    pub fn previous_result(&self, step: &str) -> Option<&Value> {
        self.previous_results.get(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn previous_result_lookup() {
        let mut results = HashMap::new();
        results.insert("reserve".to_string(), json!({"reservation_id": "R-1"}));

        let ctx = SagaContext::new(
            SagaId::from("saga-1"),
            "order-fulfillment".to_string(),
            "charge".to_string(),
            results,
            Value::Null,
        );

        assert_eq!(
            ctx.previous_result("reserve"),
            Some(&json!({"reservation_id": "R-1"}))
        );
        assert!(ctx.previous_result("charge").is_none());
    }
}
