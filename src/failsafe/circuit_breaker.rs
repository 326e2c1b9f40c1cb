//! Circuit breaker implementation

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::CircuitBreakerConfig;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed (allowing requests)
    Closed,
    /// Circuit is open (blocking requests)
    Open,
    /// Circuit is half-open (allowing a single probe request)
    HalfOpen,
}

impl CircuitState {
    /// Lowercase name for logs and status messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

/// Read-only snapshot of breaker state
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerStatus {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures since the last reset
    pub failures: u32,
    /// Most recent recorded failure, if any
    pub last_failure: Option<Instant>,
}

/// Circuit breaker protecting the upstream API
///
/// Opens after `failure_threshold` consecutive failures. Once
/// `reset_timeout` has elapsed since the most recent failure, exactly one
/// probe request is admitted (half-open); a successful probe closes the
/// circuit and resets the failure count, a failed probe reopens it and
/// restarts the cooldown clock.
pub struct CircuitBreaker {
    /// Name used in log fields and status messages
    name: String,
    /// Configuration
    enabled: bool,
    failure_threshold: u32,
    success_threshold: u32,
    reset_timeout: Duration,
    /// State
    state: RwLock<CircuitState>,
    /// Consecutive failure count
    failures: AtomicU32,
    /// Success count (in half-open)
    successes: AtomicU32,
    /// Most recent failure; the cooldown is measured from here
    last_failure: Mutex<Option<Instant>>,
    /// Whether the half-open probe slot is taken
    probe_in_flight: AtomicBool,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: &str, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            enabled: config.enabled,
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            reset_timeout: config.reset_timeout,
            state: RwLock::new(CircuitState::Closed),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            probe_in_flight: AtomicBool::new(false),
        }
    }

    /// Check whether a request may proceed
    ///
    /// In the open state this also performs the open → half-open transition
    /// once the cooldown has elapsed. In half-open, only the first caller
    /// wins the probe slot; everyone else is rejected until the probe
    /// settles.
    pub fn can_proceed(&self) -> bool {
        if !self.enabled {
            return true;
        }

        let state = *self.state.read();

        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.cooldown_elapsed() {
                    debug!(breaker = %self.name, "Cooldown elapsed, transitioning to half-open");
                    self.transition_to(CircuitState::HalfOpen);
                    self.try_take_probe()
                } else {
                    warn!(breaker = %self.name, "Circuit open, rejecting request");
                    false
                }
            }
            CircuitState::HalfOpen => self.try_take_probe(),
        }
    }

    /// Record a successful request
    pub fn record_success(&self) {
        if !self.enabled {
            return;
        }

        let state = *self.state.read();

        match state {
            CircuitState::Closed => {
                // Failures are counted consecutively; any success resets
                self.failures.store(0, Ordering::Relaxed);
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight.store(false, Ordering::Release);
                let successes = self.successes.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    breaker = %self.name,
                    successes,
                    threshold = self.success_threshold,
                    "Probe succeeded"
                );
                if successes >= self.success_threshold {
                    self.transition_to(CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        if !self.enabled {
            return;
        }

        let state = *self.state.read();

        match state {
            CircuitState::Closed => {
                *self.last_failure.lock() = Some(Instant::now());
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    breaker = %self.name,
                    failures,
                    threshold = self.failure_threshold,
                    "Failure recorded"
                );
                if failures >= self.failure_threshold {
                    self.transition_to(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // Failed probe: reopen and restart the cooldown clock
                *self.last_failure.lock() = Some(Instant::now());
                self.probe_in_flight.store(false, Ordering::Release);
                warn!(breaker = %self.name, "Probe failed, reopening circuit");
                self.transition_to(CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Release the half-open probe slot without recording an outcome
    ///
    /// An admitted request that never reaches the network (cache hit, or a
    /// response that proves the backend is alive but carries no transient
    /// signal, like a 4xx) must hand the slot back, or the circuit stays
    /// half-open with its only probe consumed and never recovers. No-op
    /// when no probe is outstanding.
    pub fn release_probe(&self) {
        if self.probe_in_flight.swap(false, Ordering::AcqRel) {
            debug!(breaker = %self.name, "Probe released without outcome");
        }
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        *self.state.read()
    }

    /// Read-only snapshot of state, failure count, and last failure time
    pub fn status(&self) -> CircuitBreakerStatus {
        CircuitBreakerStatus {
            state: *self.state.read(),
            failures: self.failures.load(Ordering::Relaxed),
            last_failure: *self.last_failure.lock(),
        }
    }

    /// Human-readable status line for error messages and diagnostics
    pub fn status_message(&self) -> String {
        let status = self.status();
        match status.state {
            CircuitState::Open => {
                let retry_in = self
                    .last_failure
                    .lock()
                    .map(|t| self.reset_timeout.saturating_sub(t.elapsed()))
                    .unwrap_or_default();
                format!(
                    "'{}' circuit breaker is open after {} failures; retry in {} seconds",
                    self.name,
                    status.failures,
                    retry_in.as_secs()
                )
            }
            state => format!("'{}' circuit breaker is {}", self.name, state.as_str()),
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        self.last_failure
            .lock()
            .is_none_or(|t| t.elapsed() >= self.reset_timeout)
    }

    /// Claim the single half-open probe slot
    fn try_take_probe(&self) -> bool {
        let taken = self
            .probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if taken {
            debug!(breaker = %self.name, "Circuit half-open, admitting probe");
        }
        taken
    }

    /// Transition to a new state
    fn transition_to(&self, new_state: CircuitState) {
        let mut state = self.state.write();
        let old_state = *state;

        if old_state == new_state {
            return;
        }

        *state = new_state;

        match new_state {
            CircuitState::Closed => {
                self.failures.store(0, Ordering::Relaxed);
                self.successes.store(0, Ordering::Relaxed);
                info!(breaker = %self.name, "Circuit breaker closed");
            }
            CircuitState::Open => {
                warn!(
                    breaker = %self.name,
                    failures = self.failures.load(Ordering::Relaxed),
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                self.successes.store(0, Ordering::Relaxed);
                self.probe_in_flight.store(false, Ordering::Release);
                debug!(breaker = %self.name, "Circuit breaker half-open");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(reset_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            &CircuitBreakerConfig {
                enabled: true,
                failure_threshold: 5,
                success_threshold: 1,
                reset_timeout,
            },
        )
    }

    #[test]
    fn stays_closed_below_threshold() {
        let cb = breaker(Duration::from_secs(30));
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_proceed());
    }

    #[test]
    fn opens_at_threshold() {
        let cb = breaker(Duration::from_secs(30));
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_proceed());
    }

    #[test]
    fn success_resets_consecutive_count() {
        let cb = breaker(Duration::from_secs(30));
        for _ in 0..4 {
            cb.record_failure();
        }
        cb.record_success();
        assert_eq!(cb.status().failures, 0);

        // Needs the full threshold again to open
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..5 {
            cb.record_failure();
        }

        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_proceed()); // Probe slot
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.can_proceed()); // Second caller rejected while probe is out
    }

    #[test]
    fn probe_success_closes_and_resets() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_proceed());
        cb.record_success();

        let status = cb.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failures, 0);
        assert!(cb.can_proceed());
    }

    #[test]
    fn probe_failure_reopens_and_restarts_cooldown() {
        let cb = breaker(Duration::from_millis(40));
        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(50));

        assert!(cb.can_proceed());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Cooldown restarted from the probe failure, so still rejecting
        std::thread::sleep(Duration::from_millis(10));
        assert!(!cb.can_proceed());

        // After the fresh cooldown another probe is admitted
        std::thread::sleep(Duration::from_millis(50));
        assert!(cb.can_proceed());
    }

    #[test]
    fn released_probe_slot_admits_the_next_caller() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_proceed()); // Probe slot claimed
        assert!(!cb.can_proceed());

        // The admitted call ended without network I/O; the slot comes back
        cb.release_probe();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.can_proceed());
    }

    #[test]
    fn release_probe_without_outstanding_probe_is_a_noop() {
        let cb = breaker(Duration::from_secs(30));
        cb.release_probe();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_proceed());
    }

    #[test]
    fn disabled_breaker_never_blocks() {
        let cb = CircuitBreaker::new(
            "disabled",
            &CircuitBreakerConfig {
                enabled: false,
                ..CircuitBreakerConfig::default()
            },
        );
        for _ in 0..100 {
            cb.record_failure();
        }
        assert!(cb.can_proceed());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn status_message_reports_open_details() {
        let cb = breaker(Duration::from_secs(30));
        for _ in 0..5 {
            cb.record_failure();
        }

        let message = cb.status_message();
        assert!(message.contains("'test'"));
        assert!(message.contains("open"));
        assert!(message.contains("5 failures"));
        assert!(message.contains("retry in"));
    }
}
