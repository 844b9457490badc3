//! # saga-orchestrator
//!
//! Coordinator for multi-step distributed transactions. A saga is a linear,
//! ordered sequence of compensatable steps: either every step completes, or
//! the steps that did complete are compensated in reverse order.
//!
//! ## Architecture
//!
//! - [`definition`]: [`SagaDefinition`], [`StepDefinition`], [`SagaOptions`],
//!   and the explicit [`SagaRegistry`] instance (no process-global state).
//! - [`handler`]: the [`StepHandler`] seam — opaque, injected
//!   execute/compensate pairs owned by calling code.
//! - [`saga`]: the durable data model persisted one document per saga.
//! - [`store`]: the narrow [`SagaStore`] contract plus the in-memory
//!   reference implementation.
//! - [`orchestrator`]: [`SagaOrchestrator`] — forward walk with write-through
//!   persistence, per-step timeouts, linear-backoff retry, and best-effort
//!   reverse compensation.
//!
//! ## Usage
//!
//! ```rust
//! use saga_orchestrator::{
//!     InMemorySagaStore, SagaContext, SagaDefinition, SagaOrchestrator, SagaRegistry,
//!     SagaStatus, StepDefinition, StepHandler, StepHandlerError,
//! };
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct ReserveInventory;
//!
//! #[async_trait::async_trait]
//! impl StepHandler for ReserveInventory {
//!     async fn execute(
//!         &self,
//!         _payload: &Value,
//!         _context: &SagaContext,
//!     ) -> Result<Value, StepHandlerError> {
//!         Ok(json!({"reservation_id": "R-1"}))
//!     }
//!
//!     async fn compensate(
//!         &self,
//!         _payload: &Value,
//!         _context: &SagaContext,
//!     ) -> Result<(), StepHandlerError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), saga_orchestrator::SagaError> {
//! let registry = Arc::new(SagaRegistry::new());
//! registry.register(SagaDefinition::new(
//!     "order-fulfillment",
//!     vec![StepDefinition::new(
//!         "reserve-inventory",
//!         "inventory",
//!         Arc::new(ReserveInventory),
//!     )],
//! ))?;
//!
//! let orchestrator = SagaOrchestrator::new(registry, Arc::new(InMemorySagaStore::new()));
//! let result = orchestrator
//!     .execute("order-fulfillment", json!({"order_id": "ORD-1"}), None)
//!     .await?;
//! assert_eq!(result.status, SagaStatus::Completed);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod definition;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod saga;
pub mod store;

pub use context::SagaContext;
pub use definition::{SagaDefinition, SagaOptions, SagaRegistry, StepDefinition};
pub use error::SagaError;
pub use handler::{StepHandler, StepHandlerError};
pub use orchestrator::{SagaExecutionResult, SagaOrchestrator};
pub use saga::{Saga, SagaId, SagaStatus, StepRecord, StepStatus};
pub use store::memory::{InMemorySagaStore, InMemoryStoreError};
pub use store::{SagaStore, SagaStoreError};
