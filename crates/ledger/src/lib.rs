//! Stock ledger domain module.
//!
//! This crate contains the business rules of the stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//! products, immutable movements, validated movement intents, and the
//! reconciliation function tying the denormalized stock counter back to the
//! movement history.

pub mod movement;
pub mod product;

pub use movement::{Direction, Movement, MovementIntent, reconcile};
pub use product::{NewProduct, Product};
