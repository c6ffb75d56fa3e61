use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::CircuitState;

// ============================================================================
// Health Check Abstractions
// ============================================================================
//
// Anything the order service depends on (Postgres, the inventory service, the
// event broker) implements `HealthProbe`; the health monitor polls the probes
// and aggregates the results.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded(_))
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }

    /// Map a circuit breaker state onto a health status.
    pub fn from_circuit(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded("Circuit breaker half-open".to_string()),
            CircuitState::Open => HealthStatus::Unhealthy("Circuit breaker open".to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded(_) => "degraded",
            HealthStatus::Unhealthy(_) => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
        }
    }
}

/// A dependency that can report its own health.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &'static str;

    async fn probe(&self) -> HealthStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_mapping() {
        assert!(HealthStatus::from_circuit(CircuitState::Closed).is_healthy());
        assert!(HealthStatus::from_circuit(CircuitState::HalfOpen).is_degraded());
        assert!(HealthStatus::from_circuit(CircuitState::Open).is_unhealthy());
    }

    #[test]
    fn test_status_serializes_with_reason() {
        let json = serde_json::to_value(HealthStatus::Degraded("slow".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "degraded", "reason": "slow" }));
    }
}
