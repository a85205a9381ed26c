//! Backoff strategies and the factory that hands them out per run.
//!
//! A [`Retrier`](crate::Retrier) asks its [`BackoffFactory`] for a fresh [`Backoff`] at
//! the start of every run, then calls [`Backoff::backoff`] after each failed attempt
//! except the last. Stateless strategies are their own factory and hand back a copy of
//! themselves. [`DecorrelatedExponentialBackoff`] keeps the previous wait, so its factory
//! hands back a new [`DecorrelatedBackoffState`] each time.
//!
//! All duration arithmetic is done on a signed 64-bit nanosecond count. Doubling and
//! tripling are checked before they happen and replaced with [`MAX_WAIT`] when they
//! would overflow, so a backoff never wraps around to a negative or tiny wait.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

/// The largest wait any strategy produces: `i64::MAX` nanoseconds (about 292 years).
pub const MAX_WAIT: Duration = Duration::from_nanos(i64::MAX as u64);

/// Pauses the current thread after a failed attempt.
///
/// `attempt` is the zero-based index of the attempt that just failed, so the first
/// failure is `0`.
pub trait Backoff: Send {
    /// Block for a strategy-defined amount of time.
    fn backoff(&mut self, attempt: u64);
}

/// Produces a [`Backoff`] for a single retry run.
///
/// Called exactly once per run, before the first attempt. Implementations that return
/// a copy of themselves must not carry mutable per-run state.
pub trait BackoffFactory: Send + Sync {
    /// Create the backoff used by one run.
    fn new_backoff(&self) -> Box<dyn Backoff>;
}

fn to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

fn from_nanos(nanos: i64) -> Duration {
    Duration::from_nanos(nanos.max(0).unsigned_abs())
}

fn pause(attempt: u64, wait: Duration) {
    #[cfg(feature = "tracing")]
    tracing::trace!(attempt, wait = ?wait, "backing off");
    #[cfg(not(feature = "tracing"))]
    let _ = attempt;

    if !wait.is_zero() {
        thread::sleep(wait);
    }
}

/// A backoff that returns immediately.
///
/// Useful for tests, or to retry without waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopBackoff;

impl Backoff for NoopBackoff {
    fn backoff(&mut self, _attempt: u64) {}
}

impl BackoffFactory for NoopBackoff {
    fn new_backoff(&self) -> Box<dyn Backoff> {
        Box::new(*self)
    }
}

/// Sleeps for the same duration after every failure.
///
/// # Examples
///
/// ```rust
/// use retrywrap::{FixedBackoff, Retrier};
/// use std::time::Duration;
///
/// let retrier = Retrier::<String>::new()
///     .with_max_attempts(3)
///     .with_backoff(FixedBackoff::new(Duration::from_millis(1)));
///
/// let mut calls = 0;
/// let result = retrier.run(|| {
///     calls += 1;
///     if calls < 3 { Err("busy".to_string()) } else { Ok(calls) }
/// });
/// assert_eq!(result, Ok(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    wait: Duration,
}

impl FixedBackoff {
    /// Create a backoff that always waits `wait`.
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    /// The configured wait.
    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl Backoff for FixedBackoff {
    fn backoff(&mut self, attempt: u64) {
        pause(attempt, self.wait);
    }
}

impl BackoffFactory for FixedBackoff {
    fn new_backoff(&self) -> Box<dyn Backoff> {
        Box::new(*self)
    }
}

/// Sleeps for `min_wait * 2^attempt`, capped at `max_wait`.
///
/// Jitter is on by default: the computed wait is scaled by a uniform factor in
/// `[0.5, 1.0]` and then raised back to `min_wait` if it fell below it.
///
/// # Examples
///
/// ```rust
/// use retrywrap::ExponentialBackoff;
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1))
///     .without_jitter();
///
/// assert_eq!(backoff.duration_for(0), Duration::from_millis(100));
/// assert_eq!(backoff.duration_for(3), Duration::from_millis(800));
/// assert_eq!(backoff.duration_for(4), Duration::from_secs(1)); // capped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    min_wait: Duration,
    max_wait: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Create a jittered exponential backoff between `min_wait` and `max_wait`.
    pub fn new(min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            min_wait,
            max_wait,
            jitter: true,
        }
    }

    /// Turn jitter on or off.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Disable jitter, making [`duration_for`](Self::duration_for) deterministic.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(false)
    }

    /// The floor of every wait.
    pub fn min_wait(&self) -> Duration {
        self.min_wait
    }

    /// The cap applied before jitter.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Whether jitter is applied.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// The wait after the failure of attempt `attempt`.
    pub fn duration_for(&self, attempt: u64) -> Duration {
        let min = to_nanos(self.min_wait);
        let expected = exponential_nanos(min, to_nanos(self.max_wait), attempt);

        let nanos = if self.jitter {
            // Lands in [expected / 2, expected].
            let factor = 0.5 * (rand::rng().random::<f64>() + 1.0);
            ((expected as f64 * factor) as i64).min(expected)
        } else {
            expected
        };

        from_nanos(nanos.max(min))
    }
}

/// `min * 2^attempt`, or `max` once the shift, the product, or the cap would be exceeded.
fn exponential_nanos(min: i64, max: i64, attempt: u64) -> i64 {
    if attempt >= u64::from(i64::BITS - 1) {
        return max;
    }

    let multiplier = 1i64 << attempt;
    match min.checked_mul(multiplier) {
        Some(nanos) if nanos <= max => nanos,
        _ => max,
    }
}

impl Backoff for ExponentialBackoff {
    fn backoff(&mut self, attempt: u64) {
        pause(attempt, self.duration_for(attempt));
    }
}

impl BackoffFactory for ExponentialBackoff {
    fn new_backoff(&self) -> Box<dyn Backoff> {
        Box::new(*self)
    }
}

/// Exponential backoff with decorrelated jitter.
///
/// Each wait is drawn between `min_wait` and three times the previous wait, then capped
/// at `max_wait`. Clients retrying the same failure drift apart instead of waking in
/// lockstep, because every run follows its own random walk.
///
/// This is the default backoff of a [`Retrier`](crate::Retrier), bounded by 500ms and
/// 60s. The value itself is immutable configuration; [`new_state`](Self::new_state)
/// (and the [`BackoffFactory`] impl) creates the per-run state.
///
/// # Examples
///
/// ```rust
/// use retrywrap::DecorrelatedExponentialBackoff;
/// use std::time::Duration;
///
/// let policy = DecorrelatedExponentialBackoff::new(
///     Duration::from_millis(10),
///     Duration::from_secs(1),
/// );
///
/// let mut state = policy.new_state();
/// assert_eq!(state.next_duration(), Duration::from_millis(10));
///
/// let next = state.next_duration();
/// assert!(next >= Duration::from_millis(10) && next <= Duration::from_millis(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorrelatedExponentialBackoff {
    min_wait: Duration,
    max_wait: Duration,
}

impl DecorrelatedExponentialBackoff {
    /// The floor used by [`Default`].
    pub const DEFAULT_MIN_WAIT: Duration = Duration::from_millis(500);
    /// The ceiling used by [`Default`].
    pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

    /// Create a decorrelated backoff between `min_wait` and `max_wait`.
    pub fn new(min_wait: Duration, max_wait: Duration) -> Self {
        Self { min_wait, max_wait }
    }

    /// The first wait, and the floor of every later one.
    pub fn min_wait(&self) -> Duration {
        self.min_wait
    }

    /// The cap of every wait after the first.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Start a run with no previous wait recorded.
    pub fn new_state(&self) -> DecorrelatedBackoffState {
        DecorrelatedBackoffState {
            min_wait: to_nanos(self.min_wait),
            max_wait: to_nanos(self.max_wait),
            last_wait: None,
        }
    }
}

impl Default for DecorrelatedExponentialBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_WAIT, Self::DEFAULT_MAX_WAIT)
    }
}

impl BackoffFactory for DecorrelatedExponentialBackoff {
    fn new_backoff(&self) -> Box<dyn Backoff> {
        Box::new(self.new_state())
    }
}

/// Per-run state of a [`DecorrelatedExponentialBackoff`].
///
/// Must not be shared between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorrelatedBackoffState {
    min_wait: i64,
    max_wait: i64,
    last_wait: Option<i64>,
}

impl DecorrelatedBackoffState {
    /// Compute the next wait and record it as the previous one.
    ///
    /// The first call returns `min_wait`. Later calls return a uniform draw from
    /// `[min_wait, 3 * previous)`, capped at `max_wait`.
    pub fn next_duration(&mut self) -> Duration {
        let nanos = match self.last_wait {
            None => self.min_wait,
            Some(last) => {
                let candidate_max = last.checked_mul(3).unwrap_or(i64::MAX);
                let drawn = if candidate_max > self.min_wait {
                    rand::rng().random_range(self.min_wait..candidate_max)
                } else {
                    self.min_wait
                };
                drawn.min(self.max_wait)
            }
        };

        self.last_wait = Some(nanos);
        from_nanos(nanos)
    }

    /// The most recent wait, if any.
    pub fn last_wait(&self) -> Option<Duration> {
        self.last_wait.map(from_nanos)
    }
}

impl Backoff for DecorrelatedBackoffState {
    // The previous wait drives the recurrence; the attempt index plays no part.
    fn backoff(&mut self, attempt: u64) {
        let wait = self.next_duration();
        pause(attempt, wait);
    }
}

/// A backoff that hands every attempt index to a closure.
///
/// Mostly for tests that want to observe the retrier, or for one-off policies.
///
/// # Examples
///
/// ```rust
/// use retrywrap::{FunctionalBackoff, Retrier};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let backoff = FunctionalBackoff::new({
///     let seen = seen.clone();
///     move |attempt| seen.lock().unwrap().push(attempt)
/// });
///
/// let retrier = Retrier::new().with_max_attempts(3).with_backoff(backoff);
/// let result: Result<(), &str> = retrier.run(|| Err("down"));
///
/// assert_eq!(result, Err("down"));
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
/// ```
#[derive(Clone)]
pub struct FunctionalBackoff {
    f: Arc<dyn Fn(u64) + Send + Sync>,
}

impl FunctionalBackoff {
    /// Wrap `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl fmt::Debug for FunctionalBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalBackoff").finish_non_exhaustive()
    }
}

impl Backoff for FunctionalBackoff {
    fn backoff(&mut self, attempt: u64) {
        (self.f)(attempt);
    }
}

impl BackoffFactory for FunctionalBackoff {
    fn new_backoff(&self) -> Box<dyn Backoff> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod backoff_tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    fn nanos(n: u64) -> Duration {
        Duration::from_nanos(n)
    }

    #[test]
    fn test_exponential_without_jitter_doubles_then_caps() {
        let backoff = ExponentialBackoff::new(nanos(100), nanos(30000)).without_jitter();
        let expected = [
            100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 30000, 30000,
        ];

        for (attempt, want) in expected.iter().enumerate() {
            assert_eq!(backoff.duration_for(attempt as u64), nanos(*want));
        }
        assert_eq!(backoff.duration_for(40), nanos(30000));
        assert_eq!(backoff.duration_for(u64::MAX), nanos(30000));
    }

    #[test]
    fn test_exponential_with_jitter_stays_in_half_range() {
        let jittered = ExponentialBackoff::new(nanos(100), nanos(30000));
        let plain = jittered.without_jitter();

        for _ in 0..50 {
            for attempt in 0..12 {
                let expected = plain.duration_for(attempt);
                let got = jittered.duration_for(attempt);
                assert!(got >= expected / 2, "{got:?} below half of {expected:?}");
                assert!(got <= expected, "{got:?} above {expected:?}");
                assert!(got >= nanos(100));
            }
        }
    }

    #[test]
    fn test_exponential_multiplication_overflow_uses_max() {
        let backoff = ExponentialBackoff::new(nanos(100), MAX_WAIT).without_jitter();
        assert_eq!(backoff.duration_for(62), MAX_WAIT);
    }

    #[test]
    fn test_exponential_largest_shift_without_overflow() {
        let backoff = ExponentialBackoff::new(nanos(1), MAX_WAIT).without_jitter();
        assert_eq!(backoff.duration_for(62), nanos(1 << 62));
    }

    #[test]
    fn test_exponential_shift_overflow_uses_max() {
        let backoff = ExponentialBackoff::new(nanos(100), MAX_WAIT).without_jitter();
        assert_eq!(backoff.duration_for(63), MAX_WAIT);
        assert_eq!(backoff.duration_for(64), MAX_WAIT);
    }

    #[test]
    fn test_exponential_jitter_near_max_never_wraps() {
        let backoff = ExponentialBackoff::new(nanos(1), MAX_WAIT);
        for _ in 0..100 {
            let got = backoff.duration_for(70);
            assert!(got >= MAX_WAIT / 2);
            assert!(got <= MAX_WAIT);
        }
    }

    #[test]
    fn test_exponential_saturates_oversized_inputs() {
        let backoff =
            ExponentialBackoff::new(Duration::MAX, Duration::MAX).without_jitter();
        assert_eq!(backoff.duration_for(0), MAX_WAIT);
    }

    #[test]
    fn test_decorrelated_first_wait_is_min() {
        let mut state = DecorrelatedExponentialBackoff::new(nanos(100), nanos(30000)).new_state();
        assert_eq!(state.last_wait(), None);
        assert_eq!(state.next_duration(), nanos(100));
        assert_eq!(state.last_wait(), Some(nanos(100)));
    }

    #[test]
    fn test_decorrelated_waits_stay_within_bounds() {
        let mut state = DecorrelatedExponentialBackoff::new(nanos(100), nanos(30000)).new_state();
        let mut last = state.next_duration();

        for _ in 0..2000 {
            let next = state.next_duration();
            assert!(next >= nanos(100));
            assert!(next <= nanos(30000));
            assert!(next <= last * 3);
            assert_eq!(state.last_wait(), Some(next));
            last = next;
        }
    }

    #[test]
    fn test_decorrelated_near_max_does_not_overflow() {
        let min = MAX_WAIT / 2;
        let mut state = DecorrelatedExponentialBackoff::new(min, MAX_WAIT).new_state();
        assert_eq!(state.next_duration(), min);

        for _ in 0..200 {
            let next = state.next_duration();
            assert!(next >= min);
            assert!(next <= MAX_WAIT);
        }
    }

    #[test]
    fn test_decorrelated_zero_min_stays_zero() {
        let mut state = DecorrelatedExponentialBackoff::new(Duration::ZERO, nanos(1000)).new_state();
        for _ in 0..10 {
            assert_eq!(state.next_duration(), Duration::ZERO);
        }
    }

    #[test]
    fn test_decorrelated_factory_returns_fresh_state() {
        let policy = DecorrelatedExponentialBackoff::new(nanos(100), nanos(30000));
        let mut first = policy.new_state();
        for _ in 0..10 {
            first.next_duration();
        }

        let mut second = policy.new_state();
        assert_eq!(second.next_duration(), nanos(100));
    }

    #[test]
    fn test_decorrelated_default_bounds() {
        let policy = DecorrelatedExponentialBackoff::default();
        assert_eq!(policy.min_wait(), Duration::from_millis(500));
        assert_eq!(policy.max_wait(), Duration::from_secs(60));
    }

    #[test]
    fn test_fixed_backoff_ignores_attempt() {
        let mut backoff = FixedBackoff::new(Duration::from_millis(50)).new_backoff();
        let start = Instant::now();
        backoff.backoff(500);
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(250));
    }

    #[test]
    fn test_noop_backoff_returns_immediately() {
        let mut backoff = NoopBackoff.new_backoff();
        let start = Instant::now();
        for attempt in 0..1000 {
            backoff.backoff(attempt);
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_functional_backoff_forwards_attempts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backoff = FunctionalBackoff::new({
            let seen = seen.clone();
            move |attempt| seen.lock().unwrap().push(attempt)
        });

        let mut instance = backoff.new_backoff();
        instance.backoff(0);
        instance.backoff(7);

        assert_eq!(*seen.lock().unwrap(), vec![0, 7]);
    }

    #[test]
    fn test_functional_backoff_is_debug() {
        let backoff = FunctionalBackoff::new(|_| {});
        assert!(format!("{:?}", backoff).contains("FunctionalBackoff"));
    }
}
