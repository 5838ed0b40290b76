use serde::{Deserialize, Serialize};

use stockbook_core::{LedgerError, LedgerResult, ProductId};

/// A product tracked by the ledger.
///
/// Descriptive fields (name, description, category, price) are opaque to the
/// core: the ledger never interprets them. `stock` is the denormalized
/// current-stock counter, mutated only through the store's atomic movement
/// append, with the invariant `stock >= 0` after any committed movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    /// Price in smallest currency unit (e.g. cents).
    price_cents: Option<u64>,
    stock: i64,
}

impl Product {
    /// Materialize a product record (used by stores when loading rows or
    /// committing registrations; not a public registration entry point).
    pub fn from_parts(id: ProductId, new: NewProduct) -> Self {
        Self {
            id,
            sku: new.sku,
            name: new.name,
            description: new.description,
            category: new.category,
            price_cents: new.price_cents,
            stock: new.initial_stock,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn price_cents(&self) -> Option<u64> {
        self.price_cents
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    /// Apply a signed stock delta.
    ///
    /// Only stores may call this, inside their atomic append path after the
    /// sufficiency check. Panics are avoided: a delta that would drive stock
    /// negative is a store bug surfaced as an error, never committed.
    pub fn apply_delta(&mut self, delta: i64) -> LedgerResult<()> {
        let next = self.stock + delta;
        if next < 0 {
            return Err(LedgerError::insufficient_stock(-delta, self.stock));
        }
        self.stock = next;
        Ok(())
    }
}

/// Registration payload for a new product.
///
/// Validated once via [`NewProduct::validate`] before a store persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<u64>,
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation("name cannot be empty"));
        }
        if self.sku.trim().is_empty() {
            return Err(LedgerError::validation("sku cannot be empty"));
        }
        if self.initial_stock < 0 {
            return Err(LedgerError::validation("initial stock cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(initial_stock: i64) -> NewProduct {
        NewProduct {
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            description: None,
            category: Some("tools".to_string()),
            price_cents: Some(1_999),
            initial_stock,
        }
    }

    #[test]
    fn registration_requires_name_and_sku() {
        let mut p = new_product(0);
        p.name = "  ".to_string();
        assert!(matches!(p.validate(), Err(LedgerError::Validation(_))));

        let mut p = new_product(0);
        p.sku = String::new();
        assert!(matches!(p.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn registration_rejects_negative_initial_stock() {
        assert!(matches!(
            new_product(-1).validate(),
            Err(LedgerError::Validation(_))
        ));
        assert!(new_product(0).validate().is_ok());
    }

    #[test]
    fn apply_delta_never_commits_negative_stock() {
        let mut product = Product::from_parts(ProductId::new(), new_product(3));

        product.apply_delta(-3).unwrap();
        assert_eq!(product.stock(), 0);

        let err = product.apply_delta(-1).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
        // Failed delta leaves the counter untouched.
        assert_eq!(product.stock(), 0);
    }
}
