use chrono::Utc;
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::reply::{Reply, ReplyError};
use kameo::Actor;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthProbe, HealthStatus};

// ============================================================================
// Health Monitor Actor
// ============================================================================
//
// Responsibilities:
// - Periodically probe every registered dependency
// - Keep the latest status per component
// - Aggregate an overall status for GET /health
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
}

#[derive(Debug)]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub check_time: chrono::DateTime<Utc>,
}

impl SystemHealth {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.overall_status.label(),
            "service": "order-service",
            "checkedAt": self.check_time,
            "components": self.components,
        })
    }
}

impl Reply for SystemHealth {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: BTreeMap<String, ComponentHealth>,
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_interval: Duration,
}

impl HealthMonitorActor {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>, probe_interval: Duration) -> Self {
        Self {
            components: BTreeMap::new(),
            probes,
            probe_interval,
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => has_degraded = true,
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Actor for HealthMonitorActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!(probes = state.probes.len(), "HealthMonitorActor started");

        let probes = state.probes.clone();
        let interval = state.probe_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                for probe in &probes {
                    let status = probe.probe().await;
                    // Fire and forget - use tell
                    let sent = actor_ref
                        .tell(UpdateHealth {
                            component: probe.component().to_string(),
                            status,
                        })
                        .send()
                        .await;
                    if sent.is_err() {
                        tracing::debug!("Health monitor stopped, ending probe loop");
                        return;
                    }
                }
            }
        });

        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<UpdateHealth> for HealthMonitorActor {
    type Reply = ();

    async fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let changed = self
            .components
            .get(&msg.component)
            .map(|previous| previous.status != msg.status)
            .unwrap_or(true);

        if changed {
            match &msg.status {
                HealthStatus::Healthy => {
                    tracing::info!(component = %msg.component, "Component healthy")
                }
                status => {
                    tracing::warn!(component = %msg.component, status = ?status, "Component health changed")
                }
            }
        }

        self.components
            .insert(msg.component.clone(), ComponentHealth::new(msg.component, msg.status));
    }
}

impl Message<GetSystemHealth> for HealthMonitorActor {
    type Reply = SystemHealth;

    async fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProbe(&'static str, HealthStatus);

    #[async_trait]
    impl HealthProbe for FixedProbe {
        fn component(&self) -> &'static str {
            self.0
        }

        async fn probe(&self) -> HealthStatus {
            self.1.clone()
        }
    }

    fn monitor_with(statuses: &[(&str, HealthStatus)]) -> HealthMonitorActor {
        let mut monitor = HealthMonitorActor::new(vec![], Duration::from_secs(60));
        for (name, status) in statuses {
            monitor
                .components
                .insert(name.to_string(), ComponentHealth::new(*name, status.clone()));
        }
        monitor
    }

    #[test]
    fn test_overall_status_healthy_when_all_healthy() {
        let monitor = monitor_with(&[("postgres", HealthStatus::Healthy), ("kafka", HealthStatus::Healthy)]);
        assert!(monitor.compute_overall_status().is_healthy());
    }

    #[test]
    fn test_overall_status_prefers_unhealthy_over_degraded() {
        let monitor = monitor_with(&[
            ("inventory", HealthStatus::Degraded("half-open".to_string())),
            ("kafka", HealthStatus::Unhealthy("Circuit breaker open".to_string())),
        ]);

        assert_eq!(
            monitor.compute_overall_status(),
            HealthStatus::Unhealthy("kafka: Circuit breaker open".to_string())
        );
    }

    #[tokio::test]
    async fn test_probes_feed_system_health() {
        let probes: Vec<Arc<dyn HealthProbe>> = vec![
            Arc::new(FixedProbe("postgres", HealthStatus::Healthy)),
            Arc::new(FixedProbe("kafka", HealthStatus::Degraded("Circuit breaker half-open".to_string()))),
        ];
        let monitor = HealthMonitorActor::spawn(HealthMonitorActor::new(probes, Duration::from_millis(10)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let health = monitor.ask(GetSystemHealth).await.unwrap();

        assert_eq!(health.components.len(), 2);
        assert!(health.overall_status.is_degraded());
        assert_eq!(health.to_json()["status"], "degraded");
    }
}
