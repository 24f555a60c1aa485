//! Rate Limiting
//!
//! Throttle and debounce wrappers for high-frequency signals.
//!
//! A [`RateLimiter`] owns the wrapped callback and at most one pending timer.
//! It is driven by the host's clock: `call` is the wrapped invocation and
//! `fire_due` runs the pending timer once its deadline is reached. The
//! `poll_*` variants leave running the callback to the caller.

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Rate limiting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitMode {
    /// At most once per delay, plus one trailing call with the latest arguments
    #[default]
    ThrottleTrailing,
    /// At most once per delay; calls inside the window are dropped
    ThrottleNoTrailing,
    /// Once, `delay` after the last call of a burst
    DebounceTrailing,
    /// Once, on the first call of a burst
    DebounceLeading,
}

impl RateLimitMode {
    pub fn is_debounce(&self) -> bool {
        matches!(self, RateLimitMode::DebounceTrailing | RateLimitMode::DebounceLeading)
    }
}

/// What the pending timer does when it fires
#[derive(Debug)]
enum TimerAction<A> {
    /// Run the callback with these arguments
    Execute(A),
    /// End the current debounce burst
    Clear,
}

#[derive(Debug)]
struct PendingTimer<A> {
    deadline: Instant,
    action: TimerAction<A>,
}

/// Limiter state
#[derive(Debug)]
pub struct RateLimiterState<A> {
    /// When the callback last ran
    pub last_executed: Option<Instant>,
    pending: Option<PendingTimer<A>>,
}

impl<A> Default for RateLimiterState<A> {
    fn default() -> Self {
        Self {
            last_executed: None,
            pending: None,
        }
    }
}

/// Throttled or debounced callback
pub struct RateLimiter<A> {
    delay: Duration,
    mode: RateLimitMode,
    state: RateLimiterState<A>,
    callback: Rc<dyn Fn(A)>,
    executions: u64,
}

impl<A> RateLimiter<A> {
    /// Wrap `callback` with the given delay and mode
    pub fn wrap(delay: Duration, mode: RateLimitMode, callback: impl Fn(A) + 'static) -> Self {
        Self {
            delay,
            mode,
            state: RateLimiterState::default(),
            callback: Rc::new(callback),
            executions: 0,
        }
    }

    /// Throttle `callback`; `no_trailing` drops calls inside the window
    pub fn throttle(delay: Duration, no_trailing: bool, callback: impl Fn(A) + 'static) -> Self {
        let mode = if no_trailing {
            RateLimitMode::ThrottleNoTrailing
        } else {
            RateLimitMode::ThrottleTrailing
        };
        Self::wrap(delay, mode, callback)
    }

    /// Debounce `callback`; `at_begin` fires on the first call of a burst
    pub fn debounce(delay: Duration, at_begin: bool, callback: impl Fn(A) + 'static) -> Self {
        let mode = if at_begin {
            RateLimitMode::DebounceLeading
        } else {
            RateLimitMode::DebounceTrailing
        };
        Self::wrap(delay, mode, callback)
    }

    /// Invoke the wrapped callback at `now`
    ///
    /// A pending timer that is already due fires first.
    pub fn call(&mut self, now: Instant, args: A) {
        for args in self.poll_call(now, args) {
            (self.callback)(args);
        }
    }

    /// Fire the pending timer if its deadline is at or before `now`
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.poll_due(now) {
            Some(Some(args)) => {
                (self.callback)(args);
                true
            }
            Some(None) => true,
            None => false,
        }
    }

    /// Timing half of [`call`](Self::call)
    ///
    /// Updates the limiter state and returns the arguments of every execution
    /// that is due, in order, without running the callback.
    pub fn poll_call(&mut self, now: Instant, args: A) -> Vec<A> {
        let mut due: Vec<A> = self.poll_due(now).flatten().into_iter().collect();

        match self.mode {
            RateLimitMode::ThrottleTrailing | RateLimitMode::ThrottleNoTrailing => {
                self.state.pending = None;
                let elapsed = self
                    .state
                    .last_executed
                    .map(|last| now.saturating_duration_since(last));

                match elapsed {
                    Some(elapsed) if elapsed < self.delay => {
                        if self.mode == RateLimitMode::ThrottleTrailing {
                            self.schedule(now + (self.delay - elapsed), TimerAction::Execute(args));
                        }
                    }
                    _ => due.push(self.record(now, args)),
                }
            }
            RateLimitMode::DebounceTrailing => {
                self.schedule(now + self.delay, TimerAction::Execute(args));
            }
            RateLimitMode::DebounceLeading => {
                if self.state.pending.is_none() {
                    due.push(self.record(now, args));
                }
                self.schedule(now + self.delay, TimerAction::Clear);
            }
        }
        due
    }

    /// Timing half of [`fire_due`](Self::fire_due)
    ///
    /// `None` when no timer is due, `Some(None)` when a debounce burst ended,
    /// `Some(Some(args))` when the callback should run. A timer driven late
    /// counts as executed at its deadline.
    pub fn poll_due(&mut self, now: Instant) -> Option<Option<A>> {
        let due = self
            .state
            .pending
            .as_ref()
            .is_some_and(|timer| timer.deadline <= now);
        if !due {
            return None;
        }

        let timer = self.state.pending.take()?;
        match timer.action {
            TimerAction::Execute(args) => Some(Some(self.record(timer.deadline, args))),
            TimerAction::Clear => Some(None),
        }
    }

    /// Shared handle to the wrapped callback
    pub fn callback(&self) -> Rc<dyn Fn(A)> {
        Rc::clone(&self.callback)
    }

    /// Deadline of the pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.pending.as_ref().map(|timer| timer.deadline)
    }

    /// Drop the pending timer without running it
    pub fn cancel(&mut self) {
        self.state.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.state.pending.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn mode(&self) -> RateLimitMode {
        self.mode
    }

    pub fn state(&self) -> &RateLimiterState<A> {
        &self.state
    }

    /// Number of times the callback has run
    pub fn executions(&self) -> u64 {
        self.executions
    }

    fn schedule(&mut self, deadline: Instant, action: TimerAction<A>) {
        self.state.pending = Some(PendingTimer { deadline, action });
    }

    fn record(&mut self, at: Instant, args: A) -> A {
        self.state.last_executed = Some(at);
        self.executions += 1;
        args
    }
}

impl<A> fmt::Debug for RateLimiter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("delay", &self.delay)
            .field("mode", &self.mode)
            .field("last_executed", &self.state.last_executed)
            .field("next_deadline", &self.next_deadline())
            .field("executions", &self.executions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const DELAY: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn recorder(mode: RateLimitMode) -> (RateLimiter<u32>, Rc<RefCell<Vec<u32>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let limiter = RateLimiter::wrap(DELAY, mode, move |arg| sink.borrow_mut().push(arg));
        (limiter, calls)
    }

    #[test]
    fn test_throttle_first_call_runs_immediately() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        assert_eq!(*calls.borrow(), vec![1]);
        assert!(!limiter.has_pending());
    }

    #[test]
    fn test_throttle_trailing_uses_last_arguments() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        for (i, offset) in [10, 30, 50, 70, 90].into_iter().enumerate() {
            limiter.call(t0 + ms(offset), 10 + i as u32);
        }

        // Trailing deadline is measured from the last execution
        assert_eq!(limiter.next_deadline(), Some(t0 + DELAY));
        assert!(!limiter.fire_due(t0 + ms(99)));
        assert!(limiter.fire_due(t0 + DELAY));

        assert_eq!(*calls.borrow(), vec![1, 14]);
        assert!(!limiter.fire_due(t0 + ms(500)));
    }

    #[test]
    fn test_throttle_no_trailing_drops_window_calls() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleNoTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(20), 2);
        limiter.call(t0 + ms(60), 3);
        assert!(!limiter.has_pending());

        limiter.call(t0 + ms(150), 4);
        assert_eq!(*calls.borrow(), vec![1, 4]);
    }

    #[test]
    fn test_throttle_boundary_is_inclusive() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleNoTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(99), 2);
        limiter.call(t0 + DELAY, 3);

        assert_eq!(*calls.borrow(), vec![1, 3]);
    }

    #[test]
    fn test_late_trailing_timer_counts_from_deadline() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(50), 2);
        // Trailing call was due at t0+100 but nobody drove the timer
        limiter.call(t0 + ms(250), 3);

        assert_eq!(*calls.borrow(), vec![1, 2, 3]);
        assert_eq!(limiter.state().last_executed, Some(t0 + ms(250)));
        assert!(!limiter.has_pending());
    }

    #[test]
    fn test_late_trailing_timer_still_throttles_close_call() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(50), 2);
        limiter.call(t0 + ms(150), 3);

        assert_eq!(*calls.borrow(), vec![1, 2]);
        assert_eq!(limiter.next_deadline(), Some(t0 + ms(200)));
    }

    #[test]
    fn test_poll_leaves_callback_to_caller() {
        let (mut limiter, calls) = recorder(RateLimitMode::ThrottleTrailing);
        let t0 = Instant::now();

        assert_eq!(limiter.poll_call(t0, 1), vec![1]);
        assert!(limiter.poll_call(t0 + ms(10), 2).is_empty());
        assert_eq!(limiter.poll_due(t0 + ms(50)), None);
        assert_eq!(limiter.poll_due(t0 + DELAY), Some(Some(2)));

        assert!(calls.borrow().is_empty());
        assert_eq!(limiter.executions(), 2);
        (limiter.callback())(7);
        assert_eq!(*calls.borrow(), vec![7]);
    }

    #[test]
    fn test_debounce_trailing_resets_on_each_call() {
        let (mut limiter, calls) = recorder(RateLimitMode::DebounceTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(80), 2);
        limiter.call(t0 + ms(160), 3);

        assert!(calls.borrow().is_empty());
        assert!(!limiter.fire_due(t0 + ms(259)));
        assert!(limiter.fire_due(t0 + ms(260)));
        assert_eq!(*calls.borrow(), vec![3]);
    }

    #[test]
    fn test_debounce_leading_uses_first_arguments() {
        let (mut limiter, calls) = recorder(RateLimitMode::DebounceLeading);
        let t0 = Instant::now();

        for i in 0..6 {
            limiter.call(t0 + ms(i * 50), i as u32 + 1);
        }
        // Burst ends DELAY after the last call
        assert!(limiter.fire_due(t0 + ms(350)));

        assert_eq!(*calls.borrow(), vec![1]);
    }

    #[test]
    fn test_debounce_leading_new_burst_after_quiet_period() {
        let (mut limiter, calls) = recorder(RateLimitMode::DebounceLeading);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(50), 2);
        // Exactly DELAY after the last call: the burst is over
        limiter.call(t0 + ms(150), 3);

        assert_eq!(*calls.borrow(), vec![1, 3]);
    }

    #[test]
    fn test_debounce_leading_just_inside_window_is_suppressed() {
        let (mut limiter, calls) = recorder(RateLimitMode::DebounceLeading);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0 + ms(99), 2);

        assert_eq!(*calls.borrow(), vec![1]);
    }

    #[test]
    fn test_zero_delay_runs_every_call() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let mut limiter = RateLimiter::throttle(Duration::ZERO, false, move |arg: u32| {
            sink.borrow_mut().push(arg)
        });
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.call(t0, 2);
        limiter.call(t0, 3);

        assert_eq!(*calls.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_drops_pending_call() {
        let (mut limiter, calls) = recorder(RateLimitMode::DebounceTrailing);
        let t0 = Instant::now();

        limiter.call(t0, 1);
        limiter.cancel();

        assert!(!limiter.fire_due(t0 + ms(500)));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_constructors_pick_modes() {
        let throttled = RateLimiter::<()>::throttle(DELAY, true, |_| {});
        assert_eq!(throttled.mode(), RateLimitMode::ThrottleNoTrailing);

        let debounced = RateLimiter::<()>::debounce(DELAY, false, |_| {});
        assert_eq!(debounced.mode(), RateLimitMode::DebounceTrailing);
        assert!(debounced.mode().is_debounce());
    }
}
