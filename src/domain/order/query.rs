use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{OrderRepository, StoreError};

use super::aggregate::Order;
use super::errors::OrderError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Queries
// ============================================================================
//
// Reads and status changes go straight to the store; the catalog is never
// involved. Every store call is bounded by the configured store timeout.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderQueryService {
    store: Arc<dyn OrderRepository>,
    store_timeout: Duration,
}

impl OrderQueryService {
    pub fn new(store: Arc<dyn OrderRepository>, store_timeout: Duration) -> Self {
        Self { store, store_timeout }
    }

    pub async fn get_order(&self, id: i64) -> Result<Order, OrderError> {
        self.bounded(self.store.get_by_id(id))
            .await?
            .ok_or(OrderError::OrderNotFound(id))
    }

    /// Set the status of an existing order and return it as stored.
    /// Applying the status it already has changes nothing.
    pub async fn update_order_status(&self, id: i64, status: &str) -> Result<Order, OrderError> {
        let status: OrderStatus = status.parse()?;

        if !self.bounded(self.store.update_status(id, status)).await? {
            return Err(OrderError::OrderNotFound(id));
        }

        tracing::info!(order_id = id, status = %status, "Order status updated");

        self.get_order(id).await
    }

    /// `None` and `Some(0)` list every order.
    pub async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>, OrderError> {
        match user_id {
            Some(user_id) if user_id != 0 => self.bounded(self.store.list_by_user(user_id)).await,
            _ => self.bounded(self.store.list_all()).await,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(OrderError::Store),
            Err(_) => Err(OrderError::Store(StoreError::Timeout)),
        }
    }
}
