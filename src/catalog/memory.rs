use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CatalogError, Product, ProductCatalog, StockDecrement};

// ============================================================================
// In-Memory Catalog
// ============================================================================
//
// Local stand-in for the inventory service. Conditional decrement and restock
// run under one lock, so they are atomic here. Update failures and latency can
// be injected per product.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

#[derive(Default)]
struct CatalogState {
    products: HashMap<i64, Product>,
    failing_updates: HashSet<i64>,
    latency: Option<Duration>,
    update_calls: u32,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            state: Mutex::new(CatalogState {
                products,
                ..CatalogState::default()
            }),
        }
    }

    /// Convenience constructor for a product with only id and stock set.
    pub fn product(id: i64, stock: i32) -> Product {
        Product {
            id,
            name: format!("product-{}", id),
            category: "general".to_string(),
            stock,
            price: 10.0,
        }
    }

    pub async fn insert(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn stock(&self, id: i64) -> Option<i32> {
        self.state.lock().await.products.get(&id).map(|p| p.stock)
    }

    /// Make every subsequent update of `id` fail with a remote error.
    pub async fn fail_updates_for(&self, id: i64) {
        self.state.lock().await.failing_updates.insert(id);
    }

    /// Delay every call by `latency` before answering.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    pub async fn update_calls(&self) -> u32 {
        self.state.lock().await.update_calls
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn get_product(&self, id: i64) -> Result<Product, CatalogError> {
        self.simulate_latency().await;
        self.state
            .lock()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    async fn update_product(&self, product: &Product) -> Result<Product, CatalogError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.update_calls += 1;

        if state.failing_updates.contains(&product.id) {
            return Err(CatalogError::Remote(format!(
                "update of product {} rejected",
                product.id
            )));
        }

        match state.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(existing.clone())
            }
            None => Err(CatalogError::NotFound(product.id)),
        }
    }

    async fn decrement_if_available(
        &self,
        id: i64,
        quantity: i32,
    ) -> Result<StockDecrement, CatalogError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.update_calls += 1;

        let failing = state.failing_updates.contains(&id);
        let product = state.products.get_mut(&id).ok_or(CatalogError::NotFound(id))?;

        if quantity > product.stock {
            return Err(CatalogError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available: product.stock,
            });
        }
        if failing {
            return Err(CatalogError::Remote(format!("update of product {} rejected", id)));
        }

        let previous_stock = product.stock;
        product.stock -= quantity;

        Ok(StockDecrement {
            product_id: id,
            previous_stock,
            remaining_stock: product.stock,
        })
    }

    async fn restock(&self, id: i64, quantity: i32) -> Result<Product, CatalogError> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        product.stock += quantity;
        Ok(product.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_missing_product() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(catalog.get_product(1).await, Err(CatalogError::NotFound(1))));
    }

    #[tokio::test]
    async fn test_update_overwrites_product() {
        let catalog = InMemoryCatalog::with_products([InMemoryCatalog::product(1, 10)]);
        let mut product = catalog.get_product(1).await.unwrap();
        product.stock = 4;

        let updated = catalog.update_product(&product).await.unwrap();

        assert_eq!(updated.stock, 4);
        assert_eq!(catalog.stock(1).await, Some(4));
    }

    #[tokio::test]
    async fn test_injected_update_failure() {
        let catalog = InMemoryCatalog::with_products([InMemoryCatalog::product(1, 10)]);
        catalog.fail_updates_for(1).await;

        let product = catalog.get_product(1).await.unwrap();
        assert!(matches!(catalog.update_product(&product).await, Err(CatalogError::Remote(_))));
        assert_eq!(catalog.stock(1).await, Some(10));
    }

    #[tokio::test]
    async fn test_conditional_decrement_never_oversells() {
        let catalog = Arc::new(InMemoryCatalog::with_products([InMemoryCatalog::product(1, 5)]));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move { catalog.decrement_if_available(1, 1).await }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                applied += 1;
            }
        }

        assert_eq!(applied, 5);
        assert_eq!(catalog.stock(1).await, Some(0));
    }

    #[tokio::test]
    async fn test_restock_adds_back() {
        let catalog = InMemoryCatalog::with_products([InMemoryCatalog::product(1, 3)]);
        catalog.restock(1, 2).await.unwrap();
        assert_eq!(catalog.stock(1).await, Some(5));
    }
}
