//! Request Cache
//!
//! Keyed single-flight memoization of asynchronous requests.
//!
//! The first request for a key invokes the loader; every later request for the
//! same key, in flight or resolved, subscribes to that one outcome. Entries are
//! insert-if-absent and live for the lifetime of the cache, failures included.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

/// Shared handle to an in-flight or resolved request
pub type SharedFetch<T, E> = Shared<LocalBoxFuture<'static, Result<T, E>>>;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered by an existing entry
    pub hits: u64,
    /// Requests that invoked the loader
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Single-flight request cache
///
/// Cloning yields another handle onto the same entries.
pub struct RequestCache<T, E> {
    inner: Rc<CacheInner<T, E>>,
}

struct CacheInner<T, E> {
    entries: RefCell<HashMap<String, SharedFetch<T, E>>>,
    stats: Cell<CacheStats>,
}

impl<T, E> RequestCache<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Rc::new(CacheInner {
                entries: RefCell::new(HashMap::new()),
                stats: Cell::new(CacheStats::default()),
            }),
        }
    }

    /// Get the request for `key`, invoking `loader` only if none exists yet
    pub fn fetch<F, Fut>(&self, key: &str, loader: F) -> SharedFetch<T, E>
    where
        F: FnOnce(&str) -> Fut,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let existing = self.inner.entries.borrow().get(key).cloned();
        if let Some(existing) = existing {
            self.record(|stats| stats.hits += 1);
            tracing::trace!(key, "request cache hit");
            return existing;
        }

        tracing::debug!(key, "request cache miss");
        self.record(|stats| stats.misses += 1);

        // The loader runs without the entries borrowed; a reentrant insert
        // for the same key wins and this future is discarded.
        let request = loader(key).boxed_local().shared();
        self.inner
            .entries
            .borrow_mut()
            .entry(key.to_string())
            .or_insert(request)
            .clone()
    }

    /// Check if a request exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    /// Resolved outcome for `key`, if the request has completed
    pub fn peek(&self, key: &str) -> Option<Result<T, E>> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .and_then(|request| request.peek().cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Get stats
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.get()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.inner.stats.get();
        update(&mut stats);
        self.inner.stats.set(stats);
    }
}

impl<T, E> Clone for RequestCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for RequestCache<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for RequestCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("entries", &self.inner.entries.borrow().len())
            .field("stats", &self.inner.stats.get())
            .finish()
    }
}
