use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::metrics::Metrics;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards a remote dependency (inventory RPCs, the event broker). After
// `failure_threshold` consecutive failures calls are rejected without being
// attempted until `timeout` has passed; then a trial call is let through
// (HalfOpen) and `success_threshold` successes close the circuit again.
//
// The breaker never retries. Rejection is surfaced as `CircuitOpen`.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call
    pub timeout: Duration,
    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
    metrics: Option<Arc<Metrics>>,
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "Circuit breaker is open"),
            CircuitBreakerError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for CircuitBreakerError<E> {}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
            config,
            metrics: None,
        }
    }

    /// Publish state changes to the `circuit_breaker_state{breaker}` gauge.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.set_circuit_state(self.name, CircuitState::Closed);
        self.metrics = Some(metrics);
        self
    }

    /// Run `operation` unless the circuit is open.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock().await;
            if state.state == CircuitState::Open {
                let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed < self.config.timeout {
                    return Err(CircuitBreakerError::CircuitOpen);
                }
                state.success_count = 0;
                self.transition(&mut state, CircuitState::HalfOpen);
            }
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                    self.transition(&mut state, CircuitState::Closed);
                }
            }
            CircuitState::Closed => state.failure_count = 0,
            // A call admitted before another caller opened the circuit.
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.failure_count += 1;

        match state.state {
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                state.opened_at = Some(Instant::now());
                self.transition(&mut state, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                state.success_count = 0;
                state.opened_at = Some(Instant::now());
                self.transition(&mut state, CircuitState::Open);
            }
            _ => {}
        }
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                breaker = self.name,
                from = ?from,
                failures = state.failure_count,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(breaker = self.name, from = ?from, to = ?to, "Circuit breaker transition"),
        }

        if let Some(ref metrics) = self.metrics {
            metrics.set_circuit_state(self.name, to);
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    pub async fn get_failure_count(&self) -> u32 {
        self.state.lock().await.failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, timeout: Duration, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                timeout,
                success_threshold,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(1), 2);

        for _ in 0..3 {
            let result = cb.call(async { Err::<(), _>("error") }).await;
            assert!(matches!(result, Err(CircuitBreakerError::OperationFailed("error"))));
        }

        assert_eq!(cb.get_state().await, CircuitState::Open);

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(1), 1);

        let _ = cb.call(async { Err::<(), _>("error") }).await;
        let _ = cb.call(async { Err::<(), _>("error") }).await;
        let _ = cb.call(async { Ok::<_, &str>(()) }).await;

        assert_eq!(cb.get_failure_count().await, 0);
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_closes_circuit() {
        let cb = breaker(2, Duration::from_millis(50), 1);

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("error") }).await;
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(30), 2);

        let _ = cb.call(async { Err::<(), _>("error") }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cb.call(async { Err::<(), _>("still down") }).await;

        assert_eq!(cb.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_state_is_exported_to_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let cb = breaker(1, Duration::from_secs(5), 1).with_metrics(metrics.clone());

        let _ = cb.call(async { Err::<(), _>("error") }).await;

        assert_eq!(metrics.circuit_state("test"), CircuitState::Open.as_gauge());
    }
}
