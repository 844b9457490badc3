//! # Order Fulfillment Example
//!
//! Runs one successful saga and one that fails at the last step, showing
//! compensation in reverse order against the in-memory store.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use async_trait::async_trait;
use saga_orchestrator::{
    InMemorySagaStore, SagaContext, SagaDefinition, SagaOptions, SagaOrchestrator, SagaRegistry,
    StepDefinition, StepHandler, StepHandlerError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct ReserveInventory;

#[async_trait]
impl StepHandler for ReserveInventory {
    async fn execute(
        &self,
        payload: &Value,
        _context: &SagaContext,
    ) -> Result<Value, StepHandlerError> {
        println!("   reserving inventory for {}", payload["order_id"]);
        Ok(json!({"reservation_id": "RES-001"}))
    }

    async fn compensate(
        &self,
        _payload: &Value,
        _context: &SagaContext,
    ) -> Result<(), StepHandlerError> {
        println!("   releasing inventory reservation");
        Ok(())
    }
}

struct ChargePayment;

#[async_trait]
impl StepHandler for ChargePayment {
    async fn execute(
        &self,
        _payload: &Value,
        context: &SagaContext,
    ) -> Result<Value, StepHandlerError> {
        println!(
            "   charging payment (reservation: {})",
            context.previous_result("reserve-inventory").unwrap()["reservation_id"]
        );
        Ok(json!({"transaction_id": "TXN-001"}))
    }

    async fn compensate(
        &self,
        _payload: &Value,
        _context: &SagaContext,
    ) -> Result<(), StepHandlerError> {
        println!("   refunding payment");
        Ok(())
    }
}

struct ShipOrder {
    carrier_available: bool,
}

#[async_trait]
impl StepHandler for ShipOrder {
    async fn execute(
        &self,
        _payload: &Value,
        _context: &SagaContext,
    ) -> Result<Value, StepHandlerError> {
        if self.carrier_available {
            println!("   handing parcel to carrier");
            Ok(json!({"tracking_number": "TRK-001"}))
        } else {
            Err(StepHandlerError::new("CarrierUnavailable"))
        }
    }

    async fn compensate(
        &self,
        _payload: &Value,
        _context: &SagaContext,
    ) -> Result<(), StepHandlerError> {
        Ok(())
    }
}

fn order_fulfillment(carrier_available: bool) -> SagaDefinition {
    SagaDefinition::new(
        "order-fulfillment",
        vec![
            StepDefinition::new("reserve-inventory", "inventory", Arc::new(ReserveInventory)),
            StepDefinition::new("charge-payment", "billing", Arc::new(ChargePayment)),
            StepDefinition::new("ship-order", "shipping", Arc::new(ShipOrder { carrier_available })),
        ],
    )
    .with_options(SagaOptions::new().with_timeout(Duration::from_secs(5)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saga_orchestrator=info".into()),
        )
        .init();

    let registry = Arc::new(SagaRegistry::new());
    let store = Arc::new(InMemorySagaStore::new());
    let orchestrator = SagaOrchestrator::new(registry.clone(), store.clone());

    println!("1. Happy path: all three steps succeed");
    registry.register(order_fulfillment(true))?;
    let result = orchestrator
        .execute("order-fulfillment", json!({"order_id": "ORD-001"}), None)
        .await?;
    println!(
        "   -> {} in {:?}, steps: {:?}\n",
        result.status, result.duration, result.completed_steps
    );

    println!("2. Carrier outage: ship-order fails, earlier steps roll back");
    registry.register(order_fulfillment(false))?;
    let result = orchestrator
        .execute("order-fulfillment", json!({"order_id": "ORD-002"}), None)
        .await?;
    println!(
        "   -> {} (failed step: {:?}, compensated: {:?})\n",
        result.status, result.failed_step, result.compensated_steps
    );

    println!("3. Manual retry of the failed saga (restarts from step 0)");
    registry.register(order_fulfillment(true))?;
    let retried = orchestrator.retry_saga(&result.saga_id).await?;
    println!("   -> {} as new saga {}\n", retried.status, retried.saga_id);

    println!("Store now holds {} saga record(s)", store.saga_count());
    for saga in orchestrator.get_failed_sagas().await? {
        println!("   failed: {} ({})", saga.saga_id, saga.error.unwrap_or_default());
    }

    Ok(())
}
