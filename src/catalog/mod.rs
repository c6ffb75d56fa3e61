// ============================================================================
// Product Catalog - Contract with the Inventory service
// ============================================================================
//
// The order workflow only needs two remote capabilities: read a product and
// write it back with a new stock count. Both are synchronous remote calls that
// can fail independently of local state.
//
// `decrement_if_available` and `restock` default to check-then-act built on
// those two calls. Implementations that can do better (a conditional update on
// the inventory side) override them.
//
// ============================================================================

mod grpc;
mod memory;

pub use grpc::{GrpcCatalog, InventoryClient};
pub use memory::InMemoryCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fresh product snapshot. Never cached by the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub stock: i32,
    pub price: f64,
}

/// Result of a successful stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: i64,
    pub previous_stock: i32,
    pub remaining_stock: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    NotFound(i64),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("Inventory service error: {0}")]
    Remote(String),

    #[error("Inventory call timed out")]
    Timeout,

    #[error("Circuit breaker open for inventory service")]
    CircuitOpen,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: i64) -> Result<Product, CatalogError>;

    /// Overwrite a product. All fields are sent; callers change only stock.
    async fn update_product(&self, product: &Product) -> Result<Product, CatalogError>;

    async fn decrement_if_available(
        &self,
        id: i64,
        quantity: i32,
    ) -> Result<StockDecrement, CatalogError> {
        let product = self.get_product(id).await?;
        if quantity > product.stock {
            return Err(CatalogError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available: product.stock,
            });
        }

        let previous_stock = product.stock;
        let updated = self
            .update_product(&Product {
                stock: previous_stock - quantity,
                ..product
            })
            .await?;

        Ok(StockDecrement {
            product_id: id,
            previous_stock,
            remaining_stock: updated.stock,
        })
    }

    /// Put `quantity` units back. Used by the compensation path.
    async fn restock(&self, id: i64, quantity: i32) -> Result<Product, CatalogError> {
        let product = self.get_product(id).await?;
        let stock = product.stock + quantity;
        self.update_product(&Product { stock, ..product }).await
    }
}
