//! Circuit breaker, token-bucket rate limiter, and retry strategy wrapped
//! around every kubectl invocation. The breaker sheds load when the CLI or
//! cluster is failing; the limiter bounds global call rate.

use log::{debug, info, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Successes in half-open needed to close again.
    pub success_threshold: u32,
    /// Seconds the circuit stays open before probing half-open.
    pub timeout_seconds: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_seconds: 60.0,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Per-remote circuit breaker. One per collector type is sufficient.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    info!("Circuit breaker {} closed, service recovered", self.name);
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::HalfOpen => {
                warn!("Circuit breaker {} reopened", self.name);
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker {} opened after {} failures",
                        self.name, inner.failure_count
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Whether a call may proceed; an open circuit transitions to half-open
    /// once its timeout has elapsed.
    pub fn can_proceed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed_enough = inner
                    .last_failure
                    .map(|t| t.elapsed().as_secs_f64() >= self.config.timeout_seconds)
                    .unwrap_or(true);
                if elapsed_enough {
                    info!("Circuit breaker {} half-open, testing recovery", self.name);
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Sliding-window token bucket bounding kubectl invocations globally.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period_seconds: f64) -> Self {
        Self {
            max_calls,
            period: Duration::from_secs_f64(period_seconds),
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Acquire a slot, sleeping until the oldest call ages out of the window.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().unwrap();
                let now = Instant::now();
                while calls
                    .front()
                    .map(|&t| now.duration_since(t) > self.period)
                    .unwrap_or(false)
                {
                    calls.pop_front();
                }
                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    None
                } else {
                    let oldest = *calls.front().unwrap();
                    Some(self.period.saturating_sub(now.duration_since(oldest)))
                }
            };
            match wait {
                None => return,
                Some(delay) => {
                    debug!("Rate limit reached, waiting {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub fn calls_in_window(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        let now = Instant::now();
        calls
            .iter()
            .filter(|&&t| now.duration_since(t) <= self.period)
            .count()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100, 60.0)
    }
}

/// Exponential backoff parameters for transient-failure retries.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    pub max_retries: u32,
    pub base_delay: f64,
    pub max_delay: f64,
    pub exponential_base: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 0.5,
            max_delay: 10.0,
            exponential_base: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Delay before retrying after the given zero-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay * self.exponential_base.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay))
    }

    pub async fn execute<T, E, F, Fut>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        "Attempt {} failed ({}), backing off {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Circuit breaker {0} is open, rejecting request")]
pub struct CircuitOpen(pub String);

/// Compose breaker, limiter, and retry around one async operation.
/// The breaker is consulted first; a rejected call never consumes a token.
pub async fn with_resilience<T, E, F, Fut>(
    breaker: &CircuitBreaker,
    limiter: &RateLimiter,
    retry: &RetryStrategy,
    f: F,
) -> Result<T, anyhow::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    if !breaker.can_proceed() {
        return Err(CircuitOpen(breaker.name.clone()).into());
    }
    limiter.acquire().await;
    match retry.execute(f).await {
        Ok(v) => {
            breaker.record_success();
            Ok(v)
        }
        Err(e) => {
            breaker.record_failure();
            Err(e.into())
        }
    }
}
