// ============================================================================
// Order Domain - Business Logic for Orders
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus)
// - Events (order.created envelope)
// - Commands (CreateOrder)
// - Errors (ValidationError, OrderError)
// - Aggregate (Order, NewOrder)
// - Workflow (OrderWorkflow - the create-order coordinator)
// - Queries (OrderQueryService)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod workflow;
pub mod query;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use workflow::OrderWorkflow;
pub use query::OrderQueryService;
