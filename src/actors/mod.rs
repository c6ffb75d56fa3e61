// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - core/           - Health types and the HealthProbe trait
// - infrastructure/ - Concrete infrastructure actors (Health, EventDispatcher)
//
// Note: The order workflow itself is a plain async service, NOT an actor.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, HealthProbe, HealthStatus};
pub use infrastructure::{
    EventDispatcher,
    GetSystemHealth,
    HealthMonitorActor,
    SystemHealth,
    UpdateHealth,
};
