use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{LedgerError, LedgerResult, MovementId, ProductId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increases stock.
    Inbound,
    /// Decreases stock.
    Outbound,
}

impl Direction {
    /// Signed stock delta for a quantity moved in this direction.
    pub fn signed(self, quantity: i64) -> i64 {
        match self {
            Direction::Inbound => quantity,
            Direction::Outbound => -quantity,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            other => Err(LedgerError::validation(format!(
                "unknown movement direction '{other}'"
            ))),
        }
    }
}

/// An immutable record of a single stock change for one product.
///
/// Created and persisted exactly once by a store's atomic append, never
/// updated or deleted; the ordered collection of movements forms the ledger.
/// `id` is assigned at commit and is monotonically ordered by creation time
/// (UUIDv7); `recorded_at` is the commit timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub direction: Direction,
    pub quantity: i64,
    pub recorded_at: DateTime<Utc>,
}

impl Movement {
    /// Signed stock delta this movement contributed.
    pub fn signed_quantity(&self) -> i64 {
        self.direction.signed(self.quantity)
    }
}

/// A validated movement request: product reference, direction, and a
/// strictly positive quantity.
///
/// Construction is the `Received -> Validated` transition; an intent with a
/// non-positive quantity cannot exist. The store's atomic append takes it
/// from `Validated` to `Committed` or `Rejected` with nothing observable in
/// between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementIntent {
    product_id: ProductId,
    direction: Direction,
    quantity: i64,
}

impl MovementIntent {
    pub fn new(
        product_id: ProductId,
        direction: Direction,
        quantity: i64,
    ) -> LedgerResult<Self> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        Ok(Self {
            product_id,
            direction,
            quantity,
        })
    }

    pub fn inbound(product_id: ProductId, quantity: i64) -> LedgerResult<Self> {
        Self::new(product_id, Direction::Inbound, quantity)
    }

    pub fn outbound(product_id: ProductId, quantity: i64) -> LedgerResult<Self> {
        Self::new(product_id, Direction::Outbound, quantity)
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Signed stock delta this intent would apply.
    pub fn signed_quantity(&self) -> i64 {
        self.direction.signed(self.quantity)
    }
}

/// Recompute current stock from initial stock plus the signed quantities of
/// a product's movements.
///
/// This is the correctness property the denormalized counter is held to:
/// after any sequence of committed movements,
/// `stock == reconcile(initial_stock, movements)`.
pub fn reconcile(initial_stock: i64, movements: &[Movement]) -> i64 {
    movements
        .iter()
        .fold(initial_stock, |stock, m| stock + m.signed_quantity())
}
