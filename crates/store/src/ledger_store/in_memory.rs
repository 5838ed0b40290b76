use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::Mutex;

use stockbook_core::{LedgerError, LedgerResult, MovementId, ProductId};
use stockbook_ledger::{Direction, Movement, MovementIntent, NewProduct, Product};

use super::r#trait::{CommittedMovement, LedgerStore};

/// Per-product state guarded by one async mutex: the product record and its
/// slice of the ledger. Holding the mutex *is* the per-product critical
/// section, so the sufficiency check and the append/adjust pair cannot
/// interleave with another movement on the same product.
#[derive(Debug)]
struct ProductSlot {
    product: Product,
    movements: Vec<Movement>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. The registry lock is held only to resolve a
/// product's slot; appends for different products run fully in parallel,
/// each serialized by its own slot mutex.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    products: RwLock<HashMap<ProductId, Arc<Mutex<ProductSlot>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, product_id: ProductId) -> LedgerResult<Arc<Mutex<ProductSlot>>> {
        let products = self
            .products
            .read()
            .map_err(|_| LedgerError::storage("product registry lock poisoned"))?;
        products.get(&product_id).cloned().ok_or(LedgerError::NotFound)
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_product(&self, new: NewProduct) -> LedgerResult<Product> {
        new.validate()?;
        let product = Product::from_parts(ProductId::new(), new);

        let mut products = self
            .products
            .write()
            .map_err(|_| LedgerError::storage("product registry lock poisoned"))?;
        products.insert(
            product.id(),
            Arc::new(Mutex::new(ProductSlot {
                product: product.clone(),
                movements: Vec::new(),
            })),
        );

        Ok(product)
    }

    async fn get_product(&self, product_id: ProductId) -> LedgerResult<Product> {
        let slot = self.slot(product_id)?;
        let guard = slot.lock().await;
        Ok(guard.product.clone())
    }

    async fn stock_on_hand(&self, product_id: ProductId) -> LedgerResult<i64> {
        let slot = self.slot(product_id)?;
        let guard = slot.lock().await;
        Ok(guard.product.stock())
    }

    async fn append_movement(
        &self,
        intent: MovementIntent,
    ) -> LedgerResult<CommittedMovement> {
        let slot = self.slot(intent.product_id())?;
        let mut guard = slot.lock().await;

        // Authoritative re-read under the slot mutex.
        let available = guard.product.stock();
        if intent.direction() == Direction::Outbound && intent.quantity() > available {
            return Err(LedgerError::insufficient_stock(intent.quantity(), available));
        }

        guard.product.apply_delta(intent.signed_quantity())?;
        let movement = Movement {
            id: MovementId::new(),
            product_id: intent.product_id(),
            direction: intent.direction(),
            quantity: intent.quantity(),
            recorded_at: Utc::now(),
        };
        guard.movements.push(movement.clone());

        Ok(CommittedMovement {
            movement,
            new_stock: guard.product.stock(),
        })
    }

    async fn list_movements(
        &self,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<Movement>> {
        let mut movements = match product_id {
            Some(id) => {
                // Listing an unknown product yields an empty sequence.
                let slot = {
                    let products = self
                        .products
                        .read()
                        .map_err(|_| LedgerError::storage("product registry lock poisoned"))?;
                    products.get(&id).cloned()
                };
                match slot {
                    Some(slot) => slot.lock().await.movements.clone(),
                    None => Vec::new(),
                }
            }
            None => {
                let slots: Vec<Arc<Mutex<ProductSlot>>> = {
                    let products = self
                        .products
                        .read()
                        .map_err(|_| LedgerError::storage("product registry lock poisoned"))?;
                    products.values().cloned().collect()
                };

                let mut all = Vec::new();
                for slot in slots {
                    let guard = slot.lock().await;
                    all.extend(guard.movements.iter().cloned());
                }
                all
            }
        };

        // Newest first; UUIDv7 ids break equal-timestamp ties deterministically.
        movements.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then(b.id.cmp(&a.id))
        });
        Ok(movements)
    }
}
