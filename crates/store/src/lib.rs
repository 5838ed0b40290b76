//! Infrastructure layer: durable ledger storage and the movement processor.

pub mod ledger_store;
pub mod processor;

#[cfg(test)]
mod integration_tests;

pub use ledger_store::{CommittedMovement, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};
pub use processor::MovementProcessor;
