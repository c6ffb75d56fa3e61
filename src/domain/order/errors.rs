use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;
use crate::store::StoreError;

// ============================================================================
// Order Errors
// ============================================================================
//
// Client-fixable failures (validation, not found, insufficient stock) versus
// server-side failures. Every workflow failure raised after the first item
// carries the stock decrements already applied to the catalog so an operator
// (or the compensation path) can reconcile them.
//
// ============================================================================

/// Input rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Order must contain at least one item")]
    EmptyItems,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    NonPositiveQuantity { product_id: i64, quantity: i32 },

    #[error("Invalid user id: {0}")]
    InvalidUserId(i64),

    #[error("Unknown order status: {0:?}")]
    InvalidStatus(String),
}

/// A stock decrement that reached the catalog during a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDecrement {
    pub product_id: i64,
    pub quantity: i32,
    pub previous_stock: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Product {product_id} not found")]
    ProductNotFound {
        product_id: i64,
        applied: Vec<AppliedDecrement>,
        compensated: bool,
    },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i32,
        available: i32,
        applied: Vec<AppliedDecrement>,
        compensated: bool,
    },

    #[error("Catalog unavailable while reading product {product_id}: {source}")]
    CatalogUnavailable {
        product_id: i64,
        source: CatalogError,
        applied: Vec<AppliedDecrement>,
        compensated: bool,
    },

    #[error("Failed to update stock for product {product_id}: {source}")]
    StockUpdateFailed {
        product_id: i64,
        source: CatalogError,
        applied: Vec<AppliedDecrement>,
        compensated: bool,
    },

    #[error("Failed to persist order: {source}")]
    OrderPersistFailed {
        source: StoreError,
        applied: Vec<AppliedDecrement>,
        compensated: bool,
    },

    /// The store did not answer in time; the order may or may not exist.
    /// Stock is never restored in this case.
    #[error("Timed out persisting order, outcome unknown")]
    PersistOutcomeUnknown { applied: Vec<AppliedDecrement> },

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Order store error: {0}")]
    Store(#[source] StoreError),
}

impl OrderError {
    /// True when the caller can fix the request and retry.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrderError::Validation(_)
                | OrderError::ProductNotFound { .. }
                | OrderError::InsufficientStock { .. }
                | OrderError::OrderNotFound(_)
        )
    }

    /// Stable machine-readable code, used for metrics labels and API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(ValidationError::InvalidStatus(_)) => "invalid_status",
            OrderError::Validation(_) => "validation_error",
            OrderError::ProductNotFound { .. } => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::CatalogUnavailable { .. } => "catalog_unavailable",
            OrderError::StockUpdateFailed { .. } => "stock_update_failed",
            OrderError::OrderPersistFailed { .. } => "order_persist_failed",
            OrderError::PersistOutcomeUnknown { .. } => "persist_outcome_unknown",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::Store(_) => "store_error",
        }
    }

    /// Decrements left on the catalog by the failed workflow, if reported.
    pub fn applied_decrements(&self) -> &[AppliedDecrement] {
        match self {
            OrderError::ProductNotFound { applied, .. }
            | OrderError::InsufficientStock { applied, .. }
            | OrderError::CatalogUnavailable { applied, .. }
            | OrderError::StockUpdateFailed { applied, .. }
            | OrderError::OrderPersistFailed { applied, .. }
            | OrderError::PersistOutcomeUnknown { applied } => applied,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_classified() {
        assert!(OrderError::from(ValidationError::EmptyItems).is_client_error());
        assert!(OrderError::ProductNotFound { product_id: 1, applied: vec![], compensated: false }
            .is_client_error());
        assert!(OrderError::InsufficientStock {
            product_id: 1,
            requested: 5,
            available: 3,
            applied: vec![],
            compensated: false,
        }
        .is_client_error());
        assert!(!OrderError::PersistOutcomeUnknown { applied: vec![] }.is_client_error());
        assert!(!OrderError::StockUpdateFailed {
            product_id: 1,
            source: CatalogError::Timeout,
            applied: vec![],
            compensated: false,
        }
        .is_client_error());
    }

    #[test]
    fn test_persist_failure_reports_applied_decrements() {
        let applied = vec![AppliedDecrement { product_id: 1, quantity: 2, previous_stock: 10 }];
        let err = OrderError::OrderPersistFailed {
            source: StoreError::Timeout,
            applied: applied.clone(),
            compensated: false,
        };

        assert_eq!(err.code(), "order_persist_failed");
        assert_eq!(err.applied_decrements(), applied.as_slice());
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = OrderError::InsufficientStock {
            product_id: 2,
            requested: 100,
            available: 5,
            applied: vec![],
            compensated: false,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 2: requested 100, available 5"
        );
    }

    #[test]
    fn test_client_errors_report_applied_decrements() {
        let applied = vec![AppliedDecrement { product_id: 1, quantity: 2, previous_stock: 10 }];
        let err = OrderError::InsufficientStock {
            product_id: 2,
            requested: 100,
            available: 5,
            applied: applied.clone(),
            compensated: false,
        };

        assert!(err.is_client_error());
        assert_eq!(err.applied_decrements(), applied.as_slice());
    }

    #[test]
    fn test_persist_outcome_unknown_code() {
        let err = OrderError::PersistOutcomeUnknown { applied: vec![] };
        assert_eq!(err.code(), "persist_outcome_unknown");
    }
}
