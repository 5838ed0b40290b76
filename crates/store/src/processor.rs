//! Movement processing (application-level orchestration).
//!
//! The `MovementProcessor` is the boundary external collaborators (an HTTP
//! layer, a CLI) call to change stock. It validates an incoming movement
//! intent and delegates to the injected [`LedgerStore`] under the correct
//! concurrency discipline.
//!
//! ## Request Flow
//!
//! ```text
//! (product, direction, quantity)
//!   ↓
//! 1. Validate shape (strictly positive quantity)   Received → Validated
//!   ↓
//! 2. Store's atomic append: re-read stock, check   Validated → Committed
//!    sufficiency, persist movement + adjust                  | Rejected
//!    counter in one unit of work
//! ```
//!
//! There is no externally observable state between `Validated` and
//! `Committed`/`Rejected`: the processor performs **no** read-then-check-
//! then-write sequence of its own. Reading stock here and deciding before
//! the append would reopen the time-of-check/time-of-use gap the store's
//! critical section closes; sufficiency is decided only inside
//! [`LedgerStore::append_movement`], against the commit-time value.

use tracing::instrument;

use stockbook_core::{LedgerResult, ProductId};
use stockbook_ledger::{Movement, MovementIntent};

use crate::ledger_store::{CommittedMovement, LedgerStore};

/// Validates movement intents and applies them through a ledger store.
///
/// The store is an explicitly owned, injected dependency: the composing
/// application constructs it once and shares it (typically as an `Arc`)
/// between the processor and whatever else needs read access.
#[derive(Debug, Clone)]
pub struct MovementProcessor<S> {
    store: S,
}

impl<S> MovementProcessor<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record an inbound movement (stock increase).
    ///
    /// Fails with `InvalidQuantity` for `quantity <= 0` before touching the
    /// store, `NotFound` for an unknown product; otherwise always succeeds
    /// in increasing stock.
    #[instrument(skip(self), fields(product_id = %product_id, quantity), err)]
    pub async fn record_inbound(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> LedgerResult<CommittedMovement> {
        let intent = MovementIntent::inbound(product_id, quantity)?;
        let committed = self.store.append_movement(intent).await?;
        tracing::debug!(
            movement_id = %committed.movement.id,
            new_stock = committed.new_stock,
            "inbound movement committed"
        );
        Ok(committed)
    }

    /// Record an outbound movement (stock decrease).
    ///
    /// Fails with `InvalidQuantity` for `quantity <= 0`, `NotFound` for an
    /// unknown product, or `InsufficientStock` when the store's commit-time
    /// check rejects the decrement.
    #[instrument(skip(self), fields(product_id = %product_id, quantity), err)]
    pub async fn record_outbound(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> LedgerResult<CommittedMovement> {
        let intent = MovementIntent::outbound(product_id, quantity)?;
        let committed = self.store.append_movement(intent).await?;
        tracing::debug!(
            movement_id = %committed.movement.id,
            new_stock = committed.new_stock,
            "outbound movement committed"
        );
        Ok(committed)
    }

    /// Movement history, newest first, optionally scoped to one product.
    pub async fn list_movements(
        &self,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<Movement>> {
        self.store.list_movements(product_id).await
    }

    /// Current stock for a product (authoritative store value).
    pub async fn stock_on_hand(&self, product_id: ProductId) -> LedgerResult<i64> {
        self.store.stock_on_hand(product_id).await
    }
}
