// ============================================================================
// Order Persistence
// ============================================================================
//
// `create` owns the transaction boundary: the order row and every item row
// become visible together or not at all. Reads are plain, non-transactional
// queries; a status observed between the order read and the item read may be
// briefly stale, item identity never is.
//
// List operations fetch items per order (N+1). Acceptable at expected order
// volumes; batch by order id set if that changes.
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;

use async_trait::async_trait;

use crate::domain::order::{NewOrder, Order, OrderStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Stored order {order_id} has unknown status {status:?}")]
    CorruptStatus { order_id: i64, status: String },

    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    #[error("Order store call timed out")]
    Timeout,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Atomically insert the order and its items. Assigns id and created_at.
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;

    /// Returns false when no order has this id. Setting the current status
    /// again is a no-op in effect.
    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<bool, StoreError>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Order>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
