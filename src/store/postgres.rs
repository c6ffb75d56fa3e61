use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

use super::{OrderRepository, StoreError};
use crate::actors::{HealthProbe, HealthStatus};
use crate::config::DatabaseConfig;
use crate::domain::order::{NewOrder, Order, OrderItem, OrderStatus};

// ============================================================================
// Postgres Order Repository
// ============================================================================
//
// Tables (see migrations/0001_create_orders.sql):
//   orders      (id, user_id, status, created_at)
//   order_items (id, order_id, position, product_id, quantity)
//
// `position` preserves the caller's item order. `created_at` is taken with
// `clock_timestamp()`, the moment the row is written; `now()` would return
// the start of the transaction.
//
// ============================================================================

const INSERT_ORDER: &str = "INSERT INTO orders (user_id, status, created_at) \
     VALUES ($1, $2, clock_timestamp()) RETURNING id, created_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    product_id: i64,
    quantity: i32,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|_| StoreError::CorruptStatus {
                order_id: self.id,
                status: self.status.clone(),
            })?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(connect_options(config)?)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout_ms,
            "Connected to Postgres"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Order schema migrations applied");
        Ok(())
    }

    async fn load_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT product_id, quantity FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OrderItem::new(row.product_id, row.quantity))
            .collect())
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        // Dropping `tx` on any early return rolls the whole write back.
        let mut tx = self.pool.begin().await?;

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(INSERT_ORDER)
            .bind(order.user_id)
            .bind(order.status.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tracing::debug!(order_id = id, "Inserted order row");

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, quantity) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = id,
            user_id = order.user_id,
            item_count = order.items.len(),
            "✅ Committed order with line items"
        );

        Ok(order.into_order(id, created_at))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT id, user_id, status, created_at FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => {
                let items = self.load_items(row.id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, status, created_at FROM orders WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> =
            sqlx::query_as("SELECT id, user_id, status, created_at FROM orders ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        self.hydrate(rows).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Every connection runs with `statement_timeout`, so the server abandons a
/// stuck statement (and rolls back) instead of committing after the caller
/// has given up.
fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, StoreError> {
    let options = PgConnectOptions::from_str(&config.url)?
        .options([("statement_timeout", format!("{}ms", config.statement_timeout_ms))]);
    Ok(options)
}

#[async_trait]
impl HealthProbe for PgOrderRepository {
    fn component(&self) -> &'static str {
        "postgres"
    }

    async fn probe(&self) -> HealthStatus {
        match self.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}
