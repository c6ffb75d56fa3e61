// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Actors for system concerns around the order workflow:
// - Health monitoring of the database, inventory and broker
// - Fire-and-forget event dispatch
//
// ============================================================================

mod event_dispatcher;
mod health_monitor;

pub use event_dispatcher::EventDispatcher;
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
