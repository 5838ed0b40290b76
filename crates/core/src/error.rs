//! Ledger error model.

use thiserror::Error;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure taxonomy for the stock ledger.
///
/// Every failure is reported synchronously to the immediate caller with a
/// machine-readable kind; none are silently swallowed. The first three are
/// deterministic (caller error or business-rule rejection, never retried
/// automatically); `StorageUnavailable` is transient and always safe to
/// retry because no partial write is ever visible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Movement quantity was not strictly positive (caller error).
    #[error("invalid quantity: {0} (must be strictly positive)")]
    InvalidQuantity(i64),

    /// The referenced product does not exist.
    ///
    /// A product legitimately at zero stock is *found*; this fires only for
    /// absent rows.
    #[error("product not found")]
    NotFound,

    /// Outbound quantity exceeds current stock, evaluated at commit time
    /// against the authoritative value. No mutation was performed.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// Underlying persistence unreachable or failed mid-operation.
    /// All-or-nothing: no partial state is visible, retry is safe.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A value failed validation (e.g. empty product name, negative
    /// initial stock, unknown direction text).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl LedgerError {
    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Whether the caller may safely retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(LedgerError::storage("connection refused").is_retryable());

        assert!(!LedgerError::InvalidQuantity(0).is_retryable());
        assert!(!LedgerError::NotFound.is_retryable());
        assert!(!LedgerError::insufficient_stock(6, 4).is_retryable());
        assert!(!LedgerError::validation("sku must not be empty").is_retryable());
        assert!(!LedgerError::invalid_id("not a uuid").is_retryable());
    }

    #[test]
    fn messages_carry_the_offending_values() {
        let err = LedgerError::insufficient_stock(6, 4);
        assert_eq!(
            err.to_string(),
            "insufficient stock: requested 6, available 4"
        );
    }
}
