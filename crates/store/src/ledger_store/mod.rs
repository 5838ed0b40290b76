//! Ledger store boundary.
//!
//! This module defines the infrastructure-facing abstraction over durable
//! product and movement storage without making any storage assumptions. The
//! store is the **sole authority** for mutating a product's stock counter:
//! the only mutation path is the atomic movement append.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{CommittedMovement, LedgerStore};
