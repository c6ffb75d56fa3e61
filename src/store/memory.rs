use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::{OrderRepository, StoreError};
use crate::domain::order::{NewOrder, Order, OrderStatus};

// ============================================================================
// In-Memory Order Repository
// ============================================================================
//
// Same contract as the Postgres repository: ids are assigned on commit, a
// create is all-or-nothing, lists are ordered by id. `fail_creates` makes
// every create fail before anything becomes visible; `set_latency` delays the
// answer to a create that has already committed.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderRepository {
    state: RwLock<RepositoryState>,
    fail_creates: AtomicBool,
    ack_latency: Mutex<Option<Duration>>,
}

#[derive(Default)]
struct RepositoryState {
    next_id: i64,
    orders: BTreeMap<i64, Order>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Delay every create acknowledgement by `latency`, after the commit.
    pub async fn set_latency(&self, latency: Duration) {
        *self.ack_latency.lock().await = Some(latency);
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }

        let order = {
            let mut state = self.state.write().await;
            state.next_id += 1;
            let id = state.next_id;

            let order = order.into_order(id, Utc::now());
            state.orders.insert(id, order.clone());
            order
        };

        let latency = *self.ack_latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(order)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.state.read().await.orders.values().cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
