//! Cash register demo
//!
//! Runs one shift against the in-memory store, then shows a second writer
//! losing the race on a stale `ETag`.
//!
//! `RUST_LOG=debug` shows the executor and store events.
//! `EVENTGUARD_OPERATION_TIMEOUT_MS` bounds each store operation.

use eventguard::{
    expected_revision_from_if_match, CommandEnvelope, CommandExecutor, ExecutorConfig,
};
use eventguard_examples::cash_register::{
    EndShift, PlaceAtWorkstation, RegisterTransaction, StartShift,
};
use eventguard_examples::transport::respond;
use eventguard_memory::InMemoryEventStore;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn transaction(amount: Decimal) -> CommandEnvelope<RegisterTransaction> {
    CommandEnvelope::new(RegisterTransaction {
        cash_register_id: "cr-1".to_string(),
        amount,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ExecutorConfig::from_env()?;
    let executor = CommandExecutor::with_config(InMemoryEventStore::new(), config);

    executor
        .handle(CommandEnvelope::new(PlaceAtWorkstation {
            cash_register_id: "cr-1".to_string(),
            workstation: "front-desk".to_string(),
        }))
        .await?;
    executor
        .handle(CommandEnvelope::new(StartShift {
            cash_register_id: "cr-1".to_string(),
            cashier_id: "alice".to_string(),
        }))
        .await?;

    let sale = executor.handle(transaction(Decimal::new(2450, 2))).await?;
    info!(etag = %sale.etag(), "sale booked");

    // Both tills saw the same tag; only the first refund lands.
    let seen = expected_revision_from_if_match(Some(&sale.etag()))?;
    let first = respond(
        executor
            .handle(transaction(Decimal::new(-500, 2)).with_expected_revision(seen))
            .await,
    );
    let second = respond(
        executor
            .handle(transaction(Decimal::new(-500, 2)).with_expected_revision(seen))
            .await,
    );
    info!(status = first.status, etag = ?first.etag, "first refund");
    info!(status = second.status, code = ?second.code, "second refund");

    let closed = executor
        .handle(CommandEnvelope::new(EndShift {
            cash_register_id: "cr-1".to_string(),
        }))
        .await?;
    info!(stream = %closed.stream_name, etag = %closed.etag(), "shift ended");

    Ok(())
}
