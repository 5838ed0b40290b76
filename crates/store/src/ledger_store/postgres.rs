//! Postgres-backed ledger store implementation.
//!
//! This module provides a persistent ledger store using PostgreSQL as the
//! backing storage. It enforces the non-negative-stock invariant and the
//! append/adjust atomicity at the database level.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE products (
//!     id          UUID PRIMARY KEY,
//!     sku         TEXT NOT NULL,
//!     name        TEXT NOT NULL,
//!     description TEXT,
//!     category    TEXT,
//!     price_cents BIGINT,
//!     stock       BIGINT NOT NULL CHECK (stock >= 0)
//! );
//!
//! CREATE TABLE movements (
//!     id          UUID PRIMARY KEY,
//!     product_id  UUID NOT NULL REFERENCES products (id),
//!     direction   TEXT NOT NULL CHECK (direction IN ('inbound', 'outbound')),
//!     quantity    BIGINT NOT NULL CHECK (quantity > 0),
//!     recorded_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE INDEX movements_recorded_at_idx ON movements (recorded_at DESC, id DESC);
//! CREATE INDEX movements_product_idx ON movements (product_id);
//! ```
//!
//! ## Atomicity
//!
//! `append_movement` runs one transaction per movement:
//!
//! 1. `SELECT ... FOR UPDATE` on the product row — the row-level lock is the
//!    per-product serialization point; concurrent appends for the same
//!    product queue behind it, appends for different products do not
//! 2. Sufficiency check against the just-read stock (outbound only)
//! 3. `INSERT` of the movement row
//! 4. `UPDATE` of the stock counter
//! 5. Commit
//!
//! A failure at any step rolls the transaction back, so a ledger entry
//! without its counter adjustment (or vice versa) is never visible. The
//! `stock >= 0` CHECK constraint backstops the in-transaction check.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `LedgerError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (check constraint) | `23514` | `InsufficientStock` (on the stock update) | Constraint backstop fired |
//! | Database (foreign key) | `23503` | `NotFound` | Movement references an absent product |
//! | Database (other) | Any other | `StorageUnavailable` | Other database errors |
//! | PoolClosed / Io / other | N/A | `StorageUnavailable` | Pool closed, network failure, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresLedgerStore` is `Send + Sync` and can be shared across threads.
//! All operations use the SQLx connection pool which handles thread-safe
//! connection management.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Span, instrument};

use stockbook_core::{LedgerError, LedgerResult, MovementId, ProductId};
use stockbook_ledger::{Direction, Movement, MovementIntent, NewProduct, Product};

use super::r#trait::{CommittedMovement, LedgerStore};

/// Postgres-backed ledger store.
///
/// The stock counter on the product row is denormalized for read
/// performance; every mutation goes through the transactional append so the
/// counter always reconciles with the movement history.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    /// Create a new store over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, new), fields(sku = %new.sku), err)]
    pub async fn insert_product(&self, new: NewProduct) -> LedgerResult<Product> {
        new.validate()?;
        let product = Product::from_parts(ProductId::new(), new);

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, description, category, price_cents, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.description())
        .bind(product.category())
        .bind(product.price_cents().map(|p| p as i64))
        .bind(product.stock())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn get_product(&self, product_id: ProductId) -> LedgerResult<Product> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, description, category, price_cents, stock
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        // Absent row is the only NotFound; a row at stock 0 resolves normally.
        let row = row.ok_or(LedgerError::NotFound)?;
        ProductRow::read(&row)?.into_product()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn stock_on_hand(&self, product_id: ProductId) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_on_hand", e))?;

        let row = row.ok_or(LedgerError::NotFound)?;
        row.try_get("stock")
            .map_err(|e| LedgerError::storage(format!("failed to read stock column: {e}")))
    }

    /// Append a movement and adjust the stock counter in one transaction.
    ///
    /// The `FOR UPDATE` row lock strictly serializes concurrent appends for
    /// the same product, so the sufficiency check always sees the stock
    /// value the update will be applied to.
    #[instrument(
        skip(self),
        fields(
            product_id = %intent.product_id(),
            direction = %intent.direction(),
            quantity = intent.quantity(),
            new_stock = tracing::field::Empty
        ),
        err
    )]
    pub async fn append_movement(
        &self,
        intent: MovementIntent,
    ) -> LedgerResult<CommittedMovement> {
        let span = Span::current();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Authoritative re-read under the row lock.
        let row = sqlx::query("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(intent.product_id().as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product_row", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerError::NotFound);
        };

        let available: i64 = row
            .try_get("stock")
            .map_err(|e| LedgerError::storage(format!("failed to read stock column: {e}")))?;

        if intent.direction() == Direction::Outbound && intent.quantity() > available {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerError::insufficient_stock(intent.quantity(), available));
        }

        let movement = Movement {
            id: MovementId::new(),
            product_id: intent.product_id(),
            direction: intent.direction(),
            quantity: intent.quantity(),
            recorded_at: Utc::now(),
        };
        let new_stock = available + intent.signed_quantity();

        sqlx::query(
            r#"
            INSERT INTO movements (id, product_id, direction, quantity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(movement.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(movement.product_id.as_uuid())
            .bind(new_stock)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_check_violation(&e) {
                    // CHECK (stock >= 0) backstop; unreachable while the
                    // row lock and in-transaction check hold.
                    LedgerError::insufficient_stock(intent.quantity(), available)
                } else {
                    map_sqlx_error("update_stock", e)
                }
            })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        span.record("new_stock", new_stock);
        Ok(CommittedMovement {
            movement,
            new_stock,
        })
    }

    /// List movements, newest first, optionally filtered to one product.
    ///
    /// The optional filter uses a NULL-tolerant predicate so one
    /// parameterized query serves both shapes.
    #[instrument(skip(self), fields(product_id = ?product_id.map(|p| p.to_string())), err)]
    pub async fn list_movements(
        &self,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<Movement>> {
        let filter: Option<uuid::Uuid> = product_id.map(|id| *id.as_uuid());

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, direction, quantity, recorded_at
            FROM movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(filter)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            movements.push(MovementRow::read(&row)?.into_movement()?);
        }
        Ok(movements)
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert_product(&self, new: NewProduct) -> LedgerResult<Product> {
        self.insert_product(new).await
    }

    async fn get_product(&self, product_id: ProductId) -> LedgerResult<Product> {
        self.get_product(product_id).await
    }

    async fn stock_on_hand(&self, product_id: ProductId) -> LedgerResult<i64> {
        self.stock_on_hand(product_id).await
    }

    async fn append_movement(
        &self,
        intent: MovementIntent,
    ) -> LedgerResult<CommittedMovement> {
        self.append_movement(intent).await
    }

    async fn list_movements(
        &self,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<Movement>> {
        self.list_movements(product_id).await
    }
}

/// Map SQLx errors to LedgerError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // Foreign key violation: the referenced product is absent.
                Some("23503") => LedgerError::NotFound,
                _ => LedgerError::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerError::storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            // Queries use fetch_optional/fetch_all; this should not happen.
            LedgerError::storage(format!("unexpected row not found in {operation}"))
        }
        _ => LedgerError::storage(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a CHECK constraint violation.
fn is_check_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23514";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price_cents: Option<i64>,
    stock: i64,
}

impl ProductRow {
    fn read(row: &sqlx::postgres::PgRow) -> LedgerResult<Self> {
        let read = |e: sqlx::Error| LedgerError::storage(format!("failed to read product row: {e}"));
        Ok(ProductRow {
            id: row.try_get("id").map_err(read)?,
            sku: row.try_get("sku").map_err(read)?,
            name: row.try_get("name").map_err(read)?,
            description: row.try_get("description").map_err(read)?,
            category: row.try_get("category").map_err(read)?,
            price_cents: row.try_get("price_cents").map_err(read)?,
            stock: row.try_get("stock").map_err(read)?,
        })
    }

    fn into_product(self) -> LedgerResult<Product> {
        Ok(Product::from_parts(
            ProductId::from_uuid(self.id),
            NewProduct {
                sku: self.sku,
                name: self.name,
                description: self.description,
                category: self.category,
                price_cents: self.price_cents.map(|p| p as u64),
                initial_stock: self.stock,
            },
        ))
    }
}

#[derive(Debug)]
struct MovementRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    direction: String,
    quantity: i64,
    recorded_at: DateTime<Utc>,
}

impl MovementRow {
    fn read(row: &sqlx::postgres::PgRow) -> LedgerResult<Self> {
        let read =
            |e: sqlx::Error| LedgerError::storage(format!("failed to read movement row: {e}"));
        Ok(MovementRow {
            id: row.try_get("id").map_err(read)?,
            product_id: row.try_get("product_id").map_err(read)?,
            direction: row.try_get("direction").map_err(read)?,
            quantity: row.try_get("quantity").map_err(read)?,
            recorded_at: row.try_get("recorded_at").map_err(read)?,
        })
    }

    fn into_movement(self) -> LedgerResult<Movement> {
        let direction: Direction = self
            .direction
            .parse()
            .map_err(|_| LedgerError::storage(format!("corrupt direction '{}'", self.direction)))?;
        Ok(Movement {
            id: MovementId::from_uuid(self.id),
            product_id: ProductId::from_uuid(self.product_id),
            direction,
            quantity: self.quantity,
            recorded_at: self.recorded_at,
        })
    }
}
