//! Circuit breaker shared by the embedding, NER and LM I/O boundaries.
//!
//! Grounded on `beagle-hypergraph::resilience::retry`: a three-state breaker
//! (closed/open/half-open) behind a `tokio::sync::Mutex`, generalized to not
//! assume any particular error type.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub open_interval: Duration,
    pub half_open_success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            open_interval: Duration::from_secs(2),
            half_open_success_threshold: 1,
        }
    }
}

#[derive(Debug)]
enum BreakerState {
    Closed { consecutive_failures: usize },
    Open { opened_at: Instant },
    HalfOpen { consecutive_successes: usize },
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// `Ok(())` if the call may proceed; `Err(remaining)` if the circuit is open.
    pub async fn can_execute(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        match &mut *state {
            BreakerState::Closed { .. } => Ok(()),
            BreakerState::Open { opened_at } => {
                let elapsed = opened_at.elapsed();
                if elapsed >= self.config.open_interval {
                    *state = BreakerState::HalfOpen {
                        consecutive_successes: 0,
                    };
                    Ok(())
                } else {
                    Err(self.config.open_interval.saturating_sub(elapsed))
                }
            }
            BreakerState::HalfOpen { .. } => Ok(()),
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        match &mut *state {
            BreakerState::Closed {
                consecutive_failures,
            } => *consecutive_failures = 0,
            BreakerState::HalfOpen {
                consecutive_successes,
            } => {
                *consecutive_successes += 1;
                if *consecutive_successes >= self.config.half_open_success_threshold {
                    *state = BreakerState::Closed {
                        consecutive_failures: 0,
                    };
                }
            }
            BreakerState::Open { .. } => {
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
            }
        }
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        match &mut *state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= self.config.failure_threshold {
                    *state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            BreakerState::HalfOpen { .. } => {
                *state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold_and_rejects() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_interval: Duration::from_millis(50),
            half_open_success_threshold: 1,
        });
        breaker.record_failure().await;
        assert!(breaker.can_execute().await.is_ok());
        breaker.record_failure().await;
        assert!(breaker.can_execute().await.is_err());
    }

    #[tokio::test]
    async fn half_opens_after_interval_and_closes_on_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_interval: Duration::from_millis(20),
            half_open_success_threshold: 1,
        });
        breaker.record_failure().await;
        assert!(breaker.can_execute().await.is_err());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(breaker.can_execute().await.is_ok());
        breaker.record_success().await;
        assert!(breaker.can_execute().await.is_ok());
    }
}
