use serde::{Deserialize, Serialize};
use std::sync::Arc;

use stockbook_core::{LedgerResult, MovementId, ProductId};
use stockbook_ledger::{Movement, MovementIntent, NewProduct, Product};

/// A movement that has been committed together with its stock adjustment.
///
/// Returned by [`LedgerStore::append_movement`]: the persisted movement
/// (id and timestamp assigned at commit) and the stock value that resulted
/// from it in the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedMovement {
    pub movement: Movement,
    pub new_stock: i64,
}

impl CommittedMovement {
    pub fn movement_id(&self) -> MovementId {
        self.movement.id
    }
}

/// Durable storage of products and movements.
///
/// ## Design Principles
///
/// - **No storage assumptions**: works with the in-memory implementation
///   (tests/dev) and the Postgres backend (production)
/// - **Append-only ledger**: movements cannot be modified or deleted
/// - **Single mutation path**: the stock counter changes only through
///   `append_movement`, in the same unit of work as the ledger append
///
/// ## Append Semantics
///
/// `append_movement` must be indivisible with respect to other concurrent
/// invocations on the same product:
///
/// 1. Re-read the current stock under a per-product critical section
///    (row-level lock, per-product mutex) — never a snapshot taken earlier
/// 2. For outbound intents, reject with `InsufficientStock` if the quantity
///    exceeds current stock, performing no mutation
/// 3. Otherwise persist the movement and adjust the counter atomically
/// 4. Return the committed movement and resulting stock
///
/// No two concurrent calls may both read the same prior stock and
/// independently decide an outbound movement is safe: the per-product
/// serialization point makes the lost-update double-spend impossible.
/// Calls targeting *different* products may proceed fully in parallel.
///
/// ## Failure Semantics
///
/// - `NotFound`: the product row is absent. A product at zero stock is
///   found and checked against the requested quantity.
/// - `InsufficientStock`: commit-time rejection, state unchanged.
/// - `StorageUnavailable`: persistence failed; no partial state is visible
///   (ledger entry without counter adjustment, or vice versa, cannot occur),
///   so retrying is always safe.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Register a new product with its initial stock.
    ///
    /// Validates the payload (non-empty name/sku, non-negative initial
    /// stock). Registration is not a movement; the ledger starts empty.
    async fn insert_product(&self, new: NewProduct) -> LedgerResult<Product>;

    /// Look up a product by id. `NotFound` for absent rows.
    async fn get_product(&self, product_id: ProductId) -> LedgerResult<Product>;

    /// Current stock for a product. `NotFound` if the product does not
    /// exist. No side effects.
    async fn stock_on_hand(&self, product_id: ProductId) -> LedgerResult<i64>;

    /// Atomically append a movement and adjust the stock counter.
    ///
    /// See the trait-level append semantics. The intent is already shape-
    /// validated (strictly positive quantity); sufficiency is decided here,
    /// against the authoritative stock value at commit time.
    async fn append_movement(
        &self,
        intent: MovementIntent,
    ) -> LedgerResult<CommittedMovement>;

    /// Movements ordered by timestamp descending (movement id descending as
    /// tie-break), optionally filtered to one product.
    ///
    /// Snapshot at call time; unbounded but finite. Filtering on an unknown
    /// product yields an empty sequence, not `NotFound`.
    async fn list_movements(
        &self,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<Movement>>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn insert_product(&self, new: NewProduct) -> LedgerResult<Product> {
        (**self).insert_product(new).await
    }

    async fn get_product(&self, product_id: ProductId) -> LedgerResult<Product> {
        (**self).get_product(product_id).await
    }

    async fn stock_on_hand(&self, product_id: ProductId) -> LedgerResult<i64> {
        (**self).stock_on_hand(product_id).await
    }

    async fn append_movement(
        &self,
        intent: MovementIntent,
    ) -> LedgerResult<CommittedMovement> {
        (**self).append_movement(intent).await
    }

    async fn list_movements(
        &self,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<Movement>> {
        (**self).list_movements(product_id).await
    }
}
