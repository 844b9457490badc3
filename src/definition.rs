//! Saga definitions and the type registry.
//!
//! A [`SagaDefinition`] is the registered shape of a saga type: the ordered
//! [`StepDefinition`]s plus saga-level [`SagaOptions`]. The
//! [`SagaRegistry`] maps type names to definitions and is an explicit
//! instance owned by (or shared with) the orchestrator, so multiple
//! independently configured orchestrators can coexist in one process.

use crate::error::SagaError;
use crate::handler::StepHandler;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// One step of a registered saga type.
#[derive(Clone)]
pub struct StepDefinition {
    /// Step name; key for result and compensation lookup.
    pub name: String,
    /// Owning service, recorded on the step for audit.
    pub service: String,
    pub handler: Arc<dyn StepHandler>,
    /// Whether transient failures of this step are retried before
    /// compensation is triggered.
    pub retryable: bool,
    /// Retry budget for this step; falls back to the saga-level budget.
    pub max_retries: Option<u32>,
    /// Deadline for one `execute` attempt; falls back to the saga-level
    /// timeout.
    pub timeout: Option<Duration>,
}

impl StepDefinition {
    pub fn new(
        name: impl Into<String>,
        service: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            handler,
            retryable: false,
            max_retries: None,
            timeout: None,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("retryable", &self.retryable)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Saga-level execution options.
#[derive(Debug, Clone)]
pub struct SagaOptions {
    /// Default retry budget for retryable steps.
    pub max_retries: u32,
    /// Base delay between retries; the actual delay is
    /// `retry_delay * retry_count` (linear backoff).
    pub retry_delay: Duration,
    /// Default per-step execution deadline.
    pub timeout: Duration,
    /// Whether saga state is written through the store. When off, nothing
    /// is persisted and the saga is invisible to the query API.
    pub persist_state: bool,
}

impl Default for SagaOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            persist_state: true,
        }
    }
}

impl SagaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_persist_state(mut self, persist_state: bool) -> Self {
        self.persist_state = persist_state;
        self
    }
}

/// The registered shape of a saga type.
///
/// Step order is significant: it defines both the forward execution order
/// and the reverse compensation order. Duplicate step names are permitted
/// but discouraged; result and compensation lookup key on the name, so the
/// later step shadows the earlier one.
#[derive(Debug, Clone)]
pub struct SagaDefinition {
    pub saga_type: String,
    pub steps: Vec<StepDefinition>,
    pub options: SagaOptions,
}

impl SagaDefinition {
    pub fn new(saga_type: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            saga_type: saga_type.into(),
            steps,
            options: SagaOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SagaOptions) -> Self {
        self.options = options;
        self
    }

    /// Find a step definition by name, later duplicates shadowing earlier.
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().rev().find(|s| s.name == name)
    }
}

/// Registry of saga definitions, keyed by type name.
#[derive(Debug, Default)]
pub struct SagaRegistry {
    definitions: DashMap<String, Arc<SagaDefinition>>,
}

impl SagaRegistry {
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
        }
    }

    /// Register a saga type, overwriting any prior definition of the same
    /// name. The only validation is a non-empty step list.
    pub fn register(&self, definition: SagaDefinition) -> Result<(), SagaError> {
        if definition.steps.is_empty() {
            return Err(SagaError::EmptyDefinition(definition.saga_type));
        }
        self.definitions
            .insert(definition.saga_type.clone(), Arc::new(definition));
        Ok(())
    }

    /// Look up a definition by type name.
    pub fn get(&self, saga_type: &str) -> Option<Arc<SagaDefinition>> {
        self.definitions.get(saga_type).map(|r| r.value().clone())
    }

    pub fn contains(&self, saga_type: &str) -> bool {
        self.definitions.contains_key(saga_type)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// All registered type names.
    pub fn saga_types(&self) -> Vec<String> {
        self.definitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SagaContext;
    use crate::handler::StepHandlerError;
    use async_trait::async_trait;
    use serde_json::Value;

    #[derive(Debug)]
    struct NoopHandler;

    #[async_trait]
    impl StepHandler for NoopHandler {
        async fn execute(
            &self,
            _payload: &Value,
            _context: &SagaContext,
        ) -> Result<Value, StepHandlerError> {
            Ok(Value::Null)
        }

        async fn compensate(
            &self,
            _payload: &Value,
            _context: &SagaContext,
        ) -> Result<(), StepHandlerError> {
            Ok(())
        }
    }

    fn one_step_definition(saga_type: &str, step_name: &str) -> SagaDefinition {
        SagaDefinition::new(
            saga_type,
            vec![StepDefinition::new(step_name, "svc", Arc::new(NoopHandler))],
        )
    }

    #[test]
    fn register_and_lookup() {
        let registry = SagaRegistry::new();
        registry
            .register(one_step_definition("order-fulfillment", "reserve"))
            .unwrap();

        assert!(registry.contains("order-fulfillment"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn re_registration_overwrites() {
        let registry = SagaRegistry::new();
        registry
            .register(one_step_definition("order-fulfillment", "old-step"))
            .unwrap();
        registry
            .register(one_step_definition("order-fulfillment", "new-step"))
            .unwrap();

        let definition = registry.get("order-fulfillment").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(definition.steps[0].name, "new-step");
    }

    #[test]
    fn empty_definition_rejected() {
        let registry = SagaRegistry::new();
        let err = registry
            .register(SagaDefinition::new("empty", vec![]))
            .unwrap_err();
        assert!(matches!(err, SagaError::EmptyDefinition(t) if t == "empty"));
        assert!(registry.is_empty());
    }

    #[test]
    fn options_builder() {
        let options = SagaOptions::new()
            .with_max_retries(5)
            .with_retry_delay(Duration::from_millis(200))
            .with_timeout(Duration::from_secs(10))
            .with_persist_state(false);

        assert_eq!(options.max_retries, 5);
        assert_eq!(options.retry_delay, Duration::from_millis(200));
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert!(!options.persist_state);
    }

    #[test]
    fn step_definition_builder() {
        let step = StepDefinition::new("charge", "billing", Arc::new(NoopHandler))
            .retryable(true)
            .with_max_retries(2)
            .with_timeout(Duration::from_millis(50));

        assert!(step.retryable);
        assert_eq!(step.max_retries, Some(2));
        assert_eq!(step.timeout, Some(Duration::from_millis(50)));
    }
}
