//! Window Events
//!
//! Scroll and resize signal hub with rate-limited listeners.
//!
//! The host dispatches signals as they arrive and calls
//! [`WindowEvents::advance`] when [`WindowEvents::next_deadline`] is reached so
//! trailing and debounced executions can fire.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::rate_limit::RateLimiter;

/// Window signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Scroll,
    Resize,
}

/// Listener ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

type Listener = Rc<RefCell<RateLimiter<EventType>>>;

struct Binding {
    id: HandlerId,
    event_type: EventType,
    listener: Listener,
}

#[derive(Default)]
struct EventsInner {
    bindings: Vec<Binding>,
    next_id: u64,
    stats: EventStats,
}

/// Event statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStats {
    pub dispatched: u64,
    pub timers_fired: u64,
}

/// Window event hub
///
/// Cloning yields another handle onto the same listeners.
#[derive(Clone, Default)]
pub struct WindowEvents {
    inner: Rc<RefCell<EventsInner>>,
}

impl WindowEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a rate-limited listener
    pub fn bind(&self, event_type: EventType, limiter: RateLimiter<EventType>) -> HandlerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = HandlerId(inner.next_id);
        inner.bindings.push(Binding {
            id,
            event_type,
            listener: Rc::new(RefCell::new(limiter)),
        });
        tracing::trace!(?event_type, id = id.0, "listener bound");
        id
    }

    /// Unbind a listener, dropping any pending execution
    pub fn unbind(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.bindings.len();
        inner.bindings.retain(|binding| binding.id != id);
        inner.bindings.len() < before
    }

    /// Deliver a signal to every listener of its type
    ///
    /// Listeners run with neither the hub nor their limiter borrowed, so they
    /// may bind, unbind or signal the hub again.
    pub fn dispatch(&self, event_type: EventType, now: Instant) -> usize {
        let listeners = self.collect(|binding| binding.event_type == event_type);
        self.inner.borrow_mut().stats.dispatched += 1;

        for listener in &listeners {
            let (due, callback) = {
                let mut limiter = listener.borrow_mut();
                (limiter.poll_call(now, event_type), limiter.callback())
            };
            for args in due {
                callback(args);
            }
        }
        listeners.len()
    }

    /// Fire every pending timer that is due at `now`
    pub fn advance(&self, now: Instant) -> usize {
        let listeners = self.collect(|_| true);
        let mut fired = 0;

        for listener in &listeners {
            let (due, callback) = {
                let mut limiter = listener.borrow_mut();
                (limiter.poll_due(now), limiter.callback())
            };
            match due {
                Some(Some(args)) => {
                    fired += 1;
                    callback(args);
                }
                Some(None) => fired += 1,
                None => {}
            }
        }
        self.inner.borrow_mut().stats.timers_fired += fired as u64;
        fired
    }

    /// Earliest pending timer across all listeners
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner
            .borrow()
            .bindings
            .iter()
            .filter_map(|binding| binding.listener.borrow().next_deadline())
            .min()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().bindings.len()
    }

    pub fn listeners_for(&self, event_type: EventType) -> usize {
        self.inner
            .borrow()
            .bindings
            .iter()
            .filter(|binding| binding.event_type == event_type)
            .count()
    }

    pub fn is_bound(&self, id: HandlerId) -> bool {
        self.inner.borrow().bindings.iter().any(|binding| binding.id == id)
    }

    /// Get stats
    pub fn stats(&self) -> EventStats {
        self.inner.borrow().stats
    }

    fn collect(&self, matches: impl Fn(&Binding) -> bool) -> Vec<Listener> {
        self.inner
            .borrow()
            .bindings
            .iter()
            .filter(|binding| matches(binding))
            .map(|binding| Rc::clone(&binding.listener))
            .collect()
    }
}

impl std::fmt::Debug for WindowEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("WindowEvents")
            .field("listeners", &inner.bindings.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitMode;
    use std::cell::Cell;
    use std::time::Duration;

    fn counting(mode: RateLimitMode, hits: &Rc<Cell<u32>>) -> RateLimiter<EventType> {
        let hits = Rc::clone(hits);
        RateLimiter::wrap(Duration::from_millis(100), mode, move |_| hits.set(hits.get() + 1))
    }

    #[test]
    fn test_dispatch_by_type() {
        let events = WindowEvents::new();
        let scrolls = Rc::new(Cell::new(0));
        let resizes = Rc::new(Cell::new(0));
        events.bind(EventType::Scroll, counting(RateLimitMode::ThrottleTrailing, &scrolls));
        events.bind(EventType::Resize, counting(RateLimitMode::ThrottleTrailing, &resizes));

        let delivered = events.dispatch(EventType::Scroll, Instant::now());

        assert_eq!(delivered, 1);
        assert_eq!((scrolls.get(), resizes.get()), (1, 0));
        assert_eq!(events.listeners_for(EventType::Resize), 1);
    }

    #[test]
    fn test_advance_fires_debounced_listener() {
        let events = WindowEvents::new();
        let hits = Rc::new(Cell::new(0));
        events.bind(EventType::Scroll, counting(RateLimitMode::DebounceTrailing, &hits));
        let t0 = Instant::now();

        events.dispatch(EventType::Scroll, t0);
        events.dispatch(EventType::Scroll, t0 + Duration::from_millis(40));
        assert_eq!(events.next_deadline(), Some(t0 + Duration::from_millis(140)));

        assert_eq!(events.advance(t0 + Duration::from_millis(100)), 0);
        assert_eq!(events.advance(t0 + Duration::from_millis(140)), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(events.next_deadline(), None);
        assert_eq!(events.stats(), EventStats { dispatched: 2, timers_fired: 1 });
    }

    #[test]
    fn test_unbind_drops_pending() {
        let events = WindowEvents::new();
        let hits = Rc::new(Cell::new(0));
        let id = events.bind(EventType::Scroll, counting(RateLimitMode::DebounceTrailing, &hits));
        let t0 = Instant::now();

        events.dispatch(EventType::Scroll, t0);
        assert!(events.unbind(id));
        assert!(!events.unbind(id));

        events.advance(t0 + Duration::from_secs(1));
        assert_eq!(hits.get(), 0);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unbind_itself() {
        let events = WindowEvents::new();
        let slot: Rc<Cell<Option<HandlerId>>> = Rc::new(Cell::new(None));
        let hub = events.clone();
        let own_id = Rc::clone(&slot);
        let limiter = RateLimiter::wrap(Duration::ZERO, RateLimitMode::ThrottleTrailing, move |_| {
            if let Some(id) = own_id.get() {
                hub.unbind(id);
            }
        });
        slot.set(Some(events.bind(EventType::Resize, limiter)));

        events.dispatch(EventType::Resize, Instant::now());
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_reenter_hub() {
        let events = WindowEvents::new();
        let hits = Rc::new(Cell::new(0));
        let deadlines = Rc::new(RefCell::new(Vec::new()));
        let hub = events.clone();
        let (seen_hits, seen_deadlines) = (Rc::clone(&hits), Rc::clone(&deadlines));
        let t0 = Instant::now();
        let limiter = RateLimiter::wrap(Duration::from_millis(100), RateLimitMode::DebounceTrailing, move |_| {
            seen_hits.set(seen_hits.get() + 1);
            seen_deadlines.borrow_mut().push(hub.next_deadline());
            if seen_hits.get() == 1 {
                hub.dispatch(EventType::Scroll, t0 + Duration::from_millis(100));
                seen_deadlines.borrow_mut().push(hub.next_deadline());
                hub.advance(t0 + Duration::from_millis(200));
            }
        });
        events.bind(EventType::Scroll, limiter);

        events.dispatch(EventType::Scroll, t0);
        assert_eq!(events.advance(t0 + Duration::from_millis(100)), 1);

        assert_eq!(hits.get(), 2);
        assert_eq!(
            *deadlines.borrow(),
            vec![None, Some(t0 + Duration::from_millis(200)), None]
        );
        assert_eq!(events.stats().timers_fired, 2);
    }
}
