//! Circuit breaker integration tests - custom configurations

use std::time::Duration;

use ea_api_client::config::CircuitBreakerConfig;
use ea_api_client::failsafe::{CircuitBreaker, CircuitState};

#[test]
fn test_circuit_breaker_with_custom_config() {
    // Stricter configuration
    let custom_config = CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 3, // Lower than default 5
        success_threshold: 2, // Higher than default 1
        reset_timeout: Duration::from_secs(60),
    };

    let cb = CircuitBreaker::new("strict", &custom_config);

    // Should open after 3 failures (not default 5)
    for _ in 0..2 {
        cb.record_failure();
    }
    assert!(cb.can_proceed());

    cb.record_failure(); // Third failure
    assert!(!cb.can_proceed());
}

#[test]
fn test_circuit_breaker_with_lenient_config() {
    // More lenient configuration for a flaky upstream
    let lenient_config = CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 10, // Higher than default 5
        success_threshold: 1,
        reset_timeout: Duration::from_secs(30),
    };

    let cb = CircuitBreaker::new("lenient", &lenient_config);

    // Should still be closed after 5 failures (default would open)
    for _ in 0..5 {
        cb.record_failure();
    }
    assert!(cb.can_proceed());

    // Should open after 10 failures
    for _ in 0..5 {
        cb.record_failure();
    }
    assert!(!cb.can_proceed());
}

#[test]
fn test_multi_success_threshold_keeps_half_open() {
    // With success_threshold 2, one successful probe is not enough
    let config = CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 2,
        success_threshold: 2,
        reset_timeout: Duration::from_millis(20),
    };

    let cb = CircuitBreaker::new("cautious", &config);
    cb.record_failure();
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);

    std::thread::sleep(Duration::from_millis(30));

    assert!(cb.can_proceed());
    cb.record_success();
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    // Second probe closes it
    assert!(cb.can_proceed());
    cb.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn test_status_message_format() {
    let config = CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 3,
        success_threshold: 1,
        reset_timeout: Duration::from_secs(30),
    };

    let cb = CircuitBreaker::new("api.example.com", &config);

    // Closed state
    let message = cb.status_message();
    assert!(message.contains("api.example.com"));
    assert!(message.contains("closed"));

    // Open state
    for _ in 0..3 {
        cb.record_failure();
    }
    let message = cb.status_message();
    assert!(message.contains("'api.example.com'"));
    assert!(message.contains("circuit breaker is open"));
    assert!(message.contains("3 failures"));
    assert!(message.contains("retry in"));
}

#[test]
fn test_disabled_circuit_breaker_config() {
    let disabled_config = CircuitBreakerConfig {
        enabled: false,
        failure_threshold: 3,
        success_threshold: 1,
        reset_timeout: Duration::from_secs(30),
    };

    let cb = CircuitBreaker::new("disabled", &disabled_config);

    // Should never open, even with many failures
    for _ in 0..100 {
        cb.record_failure();
    }
    assert!(cb.can_proceed());

    let message = cb.status_message();
    assert!(message.contains("closed")); // Should report as closed even with failures
}

#[test]
fn test_status_snapshot_is_read_only_view() {
    let cb = CircuitBreaker::new("snapshot", &CircuitBreakerConfig::default());

    let before = cb.status();
    assert_eq!(before.state, CircuitState::Closed);
    assert_eq!(before.failures, 0);
    assert!(before.last_failure.is_none());

    cb.record_failure();

    // The earlier snapshot is unaffected; a fresh one sees the failure
    assert_eq!(before.failures, 0);
    let after = cb.status();
    assert_eq!(after.failures, 1);
    assert!(after.last_failure.is_some());
}
