use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// An order owns its line items. Items are fixed at creation; afterwards only
// the status changes. Identifiers and timestamps are assigned by the store at
// commit time.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// An order that passed the workflow and is waiting to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn pending(user_id: i64, items: Vec<OrderItem>) -> Self {
        Self {
            user_id,
            status: OrderStatus::Pending,
            items,
        }
    }

    /// Attach the identity the store assigned on commit.
    pub fn into_order(self, id: i64, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: self.user_id,
            status: self.status,
            created_at,
            items: self.items,
        }
    }
}

impl Order {
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }
}
