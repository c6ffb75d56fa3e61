use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::domain::order::{AppliedDecrement, Order, OrderItem};

// ============================================================================
// Wire Models
// ============================================================================
//
// JSON shapes shared by the HTTP surface and the published events:
//   {id, userId, status, createdAt (RFC 3339), items: [{productId, quantity}]}
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub created_at: String,
    pub items: Vec<OrderItem>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status.to_string(),
            created_at: order.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            items: order.items.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub user_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderList {
    pub orders: Vec<OrderView>,
}

/// Error response. `applied` lists stock decrements an aborted order left on
/// the catalog, so they can be reconciled.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied: Vec<AppliedDecrement>,
}
