//! Failsafe mechanisms: circuit breaker and retry with backoff

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStatus, CircuitState};
pub use retry::{RetryPolicy, with_retry};
