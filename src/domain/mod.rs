// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
// - Workflow and queries
//
// Remote collaborators (catalog, store, broker) are reached through traits
// only; this layer does not know about gRPC, SQL or Kafka.
//
// ============================================================================

pub mod order;
