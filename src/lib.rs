// ============================================================================
// Order Service
// ============================================================================
//
// Creates orders against a remote product catalog, persists them in Postgres
// and announces them on the event broker.
//
// Layout:
// - domain/     - Orders, the create-order workflow, order queries
// - catalog/    - Inventory service contract and clients
// - store/      - Order persistence
// - messaging/  - Event publication
// - actors/     - Health monitor and event dispatcher actors
// - api/        - JSON HTTP surface
// - metrics/    - Prometheus metrics and /health
//
// ============================================================================

pub mod actors;
pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod store;
pub mod utils;
