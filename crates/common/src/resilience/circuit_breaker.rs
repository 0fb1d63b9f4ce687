//! Named circuit breaker guarding one upstream dependency.
//!
//! All state (current state, counters, open timestamp, in-flight trial calls)
//! lives behind a single mutex. The mutex is taken to admit a call and again
//! to record its outcome; it is never held while the guarded operation runs.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Monotonic time source, swappable in tests.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so a test can keep one handle and
/// hand another to the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Raised when a breaker rejects a call without invoking it.
#[derive(Debug, Clone, Error)]
#[error("circuit '{}' is {}, call rejected", .snapshot.name, .snapshot.state)]
pub struct CircuitOpenError {
    /// Breaker state at the moment of rejection
    pub snapshot: CircuitSnapshot,
    /// Time left until the breaker admits a trial call, when known
    pub retry_after: Option<Duration>,
}

//==============================================================================
// State & Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited requests to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive closed-state failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to stay open before admitting a trial call
    pub recovery_time: Duration,
    /// Successful trial calls needed to close the circuit from half-open
    pub half_open_success_threshold: u32,
    /// Trial calls allowed in flight at once while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_time: Duration::from_secs(15),
            half_open_success_threshold: 2,
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }

        if self.half_open_success_threshold == 0 {
            return Err(ConfigError::invalid("half_open_success_threshold must be greater than 0"));
        }

        if self.half_open_max_calls == 0 {
            return Err(ConfigError::invalid("half_open_max_calls must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_time(mut self, recovery_time: Duration) -> Self {
        self.config.recovery_time = recovery_time;
        self
    }

    pub fn half_open_success_threshold(mut self, threshold: u32) -> Self {
        self.config.half_open_success_threshold = threshold;
        self
    }

    pub fn half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.config.half_open_max_calls = max_calls;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time view of a breaker, safe to log or serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub half_open_success_threshold: u32,
    pub recovery_time_ms: u64,
    /// How long the breaker has been open (zero unless open)
    pub open_for_ms: u64,
}

/// A state transition, delivered to subscribers after the lock is released.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: &'static str,
    pub snapshot: CircuitSnapshot,
}

/// Callback invoked on every state transition
pub type StateChangeListener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Admission token returned by [`CircuitBreaker::try_acquire`].
///
/// Settle it with [`success`](Self::success), [`failure`](Self::failure) or
/// [`ignore`](Self::ignore) once the guarded call finishes. A permit dropped
/// unsettled (a cancelled future, say) gives its half-open trial slot back
/// without touching the counters.
#[must_use = "settle the permit with success, failure or ignore"]
pub struct CallPermit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    trial: bool,
    settled: bool,
}

impl<C: Clock> CallPermit<'_, C> {
    /// Whether this call was admitted as a half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Report a successful call.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    /// Report a failed call that counts against the resource's health.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }

    /// Report a call whose failure says nothing about the resource (for
    /// example a rejected request). Counters are untouched.
    pub fn ignore(mut self) {
        self.settled = true;
        self.breaker.on_release(self.trial);
    }
}

impl<C: Clock> Drop for CallPermit<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_release(self.trial);
        }
    }
}

impl<C: Clock> fmt::Debug for CallPermit<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.name)
            .field("trial", &self.trial)
            .finish()
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            trials_in_flight: 0,
        }
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Circuit breaker for one named upstream resource.
///
/// Share one instance (behind an `Arc`) between every caller of the same
/// dependency; the breaker is `Send + Sync`.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    listeners: RwLock<Vec<StateChangeListener>>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::closed()),
            listeners: RwLock::new(Vec::new()),
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Register a callback for state transitions.
    pub fn subscribe(&self, listener: StateChangeListener) {
        self.listeners.write().push(listener);
    }

    /// Current state, applying no transitions.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Point-in-time snapshot of state and counters.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        self.snapshot_locked(&inner)
    }

    /// Ask the breaker to admit one call.
    ///
    /// An open breaker whose recovery time has elapsed moves to half-open
    /// here, before the call runs. While half-open at most
    /// `half_open_max_calls` trials are admitted at once.
    pub fn try_acquire(&self) -> Result<CallPermit<'_, C>, CircuitOpenError> {
        let mut inner = self.inner.lock();
        let mut transition = None;

        if inner.state == CircuitState::Open {
            let now = self.clock.now();
            let opened_at = inner.opened_at.unwrap_or(now);
            let open_for = now.saturating_duration_since(opened_at);
            if open_for < self.config.recovery_time {
                let error = CircuitOpenError {
                    snapshot: self.snapshot_locked(&inner),
                    retry_after: Some(self.config.recovery_time - open_for),
                };
                drop(inner);
                debug!(breaker = %self.name, "circuit open, rejecting call");
                return Err(error);
            }
            transition = Some(self.transition_locked(
                &mut inner,
                CircuitState::HalfOpen,
                "recovery_window_passed",
            ));
        }

        let result = match inner.state {
            CircuitState::Closed => Ok(CallPermit { breaker: self, trial: false, settled: false }),
            CircuitState::HalfOpen if inner.trials_in_flight < self.config.half_open_max_calls => {
                inner.trials_in_flight += 1;
                Ok(CallPermit { breaker: self, trial: true, settled: false })
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                Err(CircuitOpenError { snapshot: self.snapshot_locked(&inner), retry_after: None })
            }
        };
        drop(inner);

        if let Some(change) = transition {
            self.notify(&change);
        }
        result
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        Self::release_trial(&mut inner, trial);

        let transition = match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                None
            }
            // A call admitted before the breaker opened proves nothing about recovery.
            CircuitState::HalfOpen if !trial => None,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_success_threshold {
                    Some(self.transition_locked(&mut inner, CircuitState::Closed, "recovered"))
                } else {
                    None
                }
            }
            // Late result from a call admitted before the breaker reopened.
            CircuitState::Open => None,
        };
        drop(inner);

        if let Some(change) = transition {
            self.notify(&change);
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        Self::release_trial(&mut inner, trial);

        let transition = match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    Some(self.transition_locked(
                        &mut inner,
                        CircuitState::Open,
                        "failure_threshold_reached",
                    ))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                Some(self.transition_locked(&mut inner, CircuitState::Open, "half_open_trial_failed"))
            }
            CircuitState::Open => None,
        };
        drop(inner);

        if let Some(change) = transition {
            self.notify(&change);
        }
    }

    fn on_release(&self, trial: bool) {
        let mut inner = self.inner.lock();
        Self::release_trial(&mut inner, trial);
    }

    /// Force the breaker back to closed (admin/test action).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let transition = if inner.state == CircuitState::Closed {
            *inner = BreakerInner::closed();
            None
        } else {
            let change = self.transition_locked(&mut inner, CircuitState::Closed, "manual_reset");
            inner.trials_in_flight = 0;
            Some(change)
        };
        drop(inner);

        info!(breaker = %self.name, "circuit breaker manually reset to closed state");
        if let Some(change) = transition {
            self.notify(&change);
        }
    }

    fn release_trial(inner: &mut BreakerInner, trial: bool) {
        if trial && inner.state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    fn transition_locked(
        &self,
        inner: &mut BreakerInner,
        to: CircuitState,
        reason: &'static str,
    ) -> StateChange {
        let from = inner.state;
        inner.state = to;
        inner.failure_count = 0;
        inner.success_count = 0;
        match to {
            CircuitState::Open => {
                inner.opened_at = Some(self.clock.now());
                inner.trials_in_flight = 0;
            }
            CircuitState::HalfOpen => inner.trials_in_flight = 0,
            CircuitState::Closed => inner.opened_at = None,
        }
        StateChange { from, to, reason, snapshot: self.snapshot_locked(inner) }
    }

    fn notify(&self, change: &StateChange) {
        warn!(
            breaker = %self.name,
            from = %change.from,
            to = %change.to,
            reason = change.reason,
            "circuit breaker state change"
        );
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(change);
        }
    }

    fn snapshot_locked(&self, inner: &BreakerInner) -> CircuitSnapshot {
        let open_for = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                self.clock.now().saturating_duration_since(opened_at)
            }
            _ => Duration::ZERO,
        };
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            failure_threshold: self.config.failure_threshold,
            half_open_success_threshold: self.config.half_open_success_threshold,
            recovery_time_ms: duration_millis(self.config.recovery_time),
            open_for_ms: duration_millis(open_for),
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    //! Unit tests for the breaker state machine.
    //!
    //! Time is driven through `MockClock`, so recovery windows are crossed
    //! without sleeping.

    use super::*;

    fn breaker(clock: &MockClock) -> CircuitBreaker<MockClock> {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(5)
            .recovery_time(Duration::from_secs(15))
            .half_open_success_threshold(2)
            .build()
            .expect("valid config");
        CircuitBreaker::with_clock("vendor", config, clock.clone()).expect("valid breaker")
    }

    fn fail(cb: &CircuitBreaker<MockClock>) {
        if let Ok(permit) = cb.try_acquire() {
            permit.failure();
        }
    }

    fn succeed(cb: &CircuitBreaker<MockClock>) {
        cb.try_acquire().expect("call should be admitted").success();
    }

    /// Validates `MockClock::advance` moves `now()` forward.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
        clock.set_elapsed(Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    /// Validates configuration validation rejects zero thresholds.
    ///
    /// Assertions:
    /// - Each zeroed field yields `ConfigError::Invalid`.
    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::builder().failure_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().half_open_success_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().half_open_max_calls(0).build().is_err());
        assert!(CircuitBreakerConfig::default().validate().is_ok());
    }

    /// Validates the closed to open transition at the failure threshold.
    ///
    /// Assertions:
    /// - Four failures keep the breaker closed with `failure_count == 4`.
    /// - The fifth failure opens it and resets counters.
    #[test]
    fn test_opens_after_threshold_failures() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        for _ in 0..4 {
            fail(&cb);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 4);

        fail(&cb);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, 0);
    }

    /// Validates a success while closed clears the failure count.
    #[test]
    fn test_success_resets_failure_count_while_closed() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        fail(&cb);
        fail(&cb);
        succeed(&cb);

        assert_eq!(cb.snapshot().failure_count, 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    /// Validates an open breaker rejects admission with a retry hint.
    ///
    /// Assertions:
    /// - The error carries the breaker name and open state.
    /// - `retry_after` is the remainder of the recovery window.
    #[test]
    fn test_open_rejects_with_retry_hint() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        for _ in 0..5 {
            fail(&cb);
        }

        clock.advance(Duration::from_secs(5));
        let err = cb.try_acquire().expect_err("open breaker admits nothing");
        assert_eq!(err.snapshot.name, "vendor");
        assert_eq!(err.snapshot.state, CircuitState::Open);
        assert_eq!(err.retry_after, Some(Duration::from_secs(10)));
        assert!(err.to_string().contains("call rejected"));
    }

    /// Validates half-open admission, recovery and closing.
    ///
    /// Assertions:
    /// - After the recovery window exactly one concurrent trial is admitted.
    /// - Two trial successes close the breaker.
    #[test]
    fn test_half_open_admits_single_trial_then_closes() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        for _ in 0..5 {
            fail(&cb);
        }
        clock.advance(Duration::from_secs(15));

        let permit = cb.try_acquire().expect("trial admitted");
        assert!(permit.is_trial());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_err(), "second concurrent trial rejected");

        permit.success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 1);

        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().success_count, 0);
    }

    /// Validates any half-open failure reopens and restarts the clock.
    #[test]
    fn test_half_open_failure_reopens() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        for _ in 0..5 {
            fail(&cb);
        }
        clock.advance(Duration::from_secs(16));
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().open_for_ms, 0);

        clock.advance(Duration::from_secs(14));
        assert!(cb.try_acquire().is_err(), "recovery window restarted");
    }

    /// Validates ignored outcomes leave counters untouched.
    #[test]
    fn test_ignored_outcomes_do_not_count() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        for _ in 0..10 {
            cb.try_acquire().expect("closed breaker admits").ignore();
        }

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    /// Validates ignored and dropped permits return the half-open trial slot.
    #[test]
    fn test_ignored_error_releases_trial_slot() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        for _ in 0..5 {
            fail(&cb);
        }
        clock.advance(Duration::from_secs(15));

        let permit = cb.try_acquire().expect("trial admitted");
        permit.ignore();

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let permit = cb.try_acquire().expect("slot released");
        drop(permit);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 0);
        cb.try_acquire().expect("dropped permit released its slot").success();
    }

    /// Validates listeners observe each transition with its reason.
    #[test]
    fn test_listener_receives_transitions() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        cb.subscribe(Arc::new(move |change: &StateChange| {
            sink.lock().push((change.from, change.to, change.reason));
        }));

        for _ in 0..5 {
            fail(&cb);
        }
        clock.advance(Duration::from_secs(15));
        succeed(&cb);
        succeed(&cb);

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (CircuitState::Closed, CircuitState::Open, "failure_threshold_reached"),
                (CircuitState::Open, CircuitState::HalfOpen, "recovery_window_passed"),
                (CircuitState::HalfOpen, CircuitState::Closed, "recovered"),
            ]
        );
    }

    /// Validates `reset` closes an open breaker.
    #[test]
    fn test_reset_closes_breaker() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        for _ in 0..5 {
            fail(&cb);
        }
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        succeed(&cb);
    }

    /// Validates that only half-open trials count toward recovery.
    ///
    /// Assertions:
    /// - A permit admitted while closed and settled after the breaker went
    ///   half-open leaves `success_count` at zero.
    /// - The breaker stays half-open until real trials succeed.
    #[test]
    fn test_stale_success_does_not_count_as_trial() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        let stale = cb.try_acquire().expect("closed breaker admits");
        assert!(!stale.is_trial());
        for _ in 0..5 {
            fail(&cb);
        }
        clock.advance(Duration::from_secs(15));
        let trial = cb.try_acquire().expect("trial admitted");
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        stale.success();
        assert_eq!(cb.snapshot().success_count, 0);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        trial.success();
        assert_eq!(cb.snapshot().success_count, 1);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
