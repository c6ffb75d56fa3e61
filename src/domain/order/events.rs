use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::Order;
use crate::models::OrderView;

// ============================================================================
// Order Events
// ============================================================================
//
// Published best-effort (at most once) after an order commits. Consumers must
// tolerate missed events. The envelope carries a schema version so the payload
// can evolve.
//
// ============================================================================

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_EVENT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub schema_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub order: OrderView,
}

impl OrderEventEnvelope {
    pub fn order_created(order: &Order) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: ORDER_CREATED.to_string(),
            schema_version: ORDER_EVENT_SCHEMA_VERSION,
            occurred_at: Utc::now(),
            order: OrderView::from(order),
        }
    }

    /// Partition key: all events of one order land on the same partition.
    pub fn key(&self) -> String {
        self.order.id.to_string()
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
