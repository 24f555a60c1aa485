//! Image Load Controller
//!
//! Decides which tracked elements to load and swaps their images in.
//!
//! A controller scans its elements once at construction, binds rate-limited
//! scroll/resize listeners if anything is left to track, and then processes
//! elements through either the postpone pass (viewport filtered) or the
//! lazyload pass (everything still pending). Fetch completions run on the
//! context's local executor; a destroyed controller ignores them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use postimg_net::FetchError;

use crate::config::{ControllerOptions, LoadType};
use crate::context::{LoaderContext, PictureParser};
use crate::element::{ATTR_PICTURE, ElementHandle, LoadState, TrackedElement};
use crate::error::{PostimgError, Result};
use crate::events::{EventType, HandlerId};
use crate::rate_limit::RateLimiter;
use crate::registry::{InstanceId, Reloadable};
use crate::viewport::ViewportTracker;

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    /// Deduplicating the initial collection
    Scanning,
    /// Listeners bound, passes run
    Active,
    /// Nothing to track; no listeners bound
    Inert,
    Destroyed,
}

type ElementCallback<E> = Box<dyn Fn(&E)>;
type FailCallback<E> = Box<dyn Fn(&E, &FetchError)>;

/// Per-element notifications
pub struct Callbacks<E> {
    on_enter: Option<ElementCallback<E>>,
    on_success: Option<ElementCallback<E>>,
    on_fail: Option<FailCallback<E>>,
}

impl<E> Callbacks<E> {
    pub fn new() -> Self {
        Self {
            on_enter: None,
            on_success: None,
            on_fail: None,
        }
    }

    /// Called when an element is picked for loading
    pub fn on_enter(mut self, callback: impl Fn(&E) + 'static) -> Self {
        self.on_enter = Some(Box::new(callback));
        self
    }

    /// Called after an image has been swapped in
    pub fn on_success(mut self, callback: impl Fn(&E) + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Called when an image fails to load
    pub fn on_fail(mut self, callback: impl Fn(&E, &FetchError) + 'static) -> Self {
        self.on_fail = Some(Box::new(callback));
        self
    }

    fn enter(&self, element: &E) {
        if let Some(callback) = &self.on_enter {
            callback(element);
        }
    }

    fn success(&self, element: &E) {
        if let Some(callback) = &self.on_success {
            callback(element);
        }
    }

    fn fail(&self, element: &E, err: &FetchError) {
        if let Some(callback) = &self.on_fail {
            callback(element, err);
        }
    }
}

impl<E> Default for Callbacks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Callbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_enter", &self.on_enter.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .finish()
    }
}

/// Controller statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Batches processed
    pub batches: u64,
    /// Elements sent to the image fetch
    pub requested: u64,
    pub loaded: u64,
    pub failed: u64,
    /// Elements handed to the picture parser
    pub delegated: u64,
}

struct ControllerCore<E: ElementHandle> {
    this: Weak<ControllerCore<E>>,
    id: Cell<Option<InstanceId>>,
    options: ControllerOptions,
    state: Cell<ControllerState>,
    working_set: RefCell<Vec<TrackedElement<E>>>,
    /// Elements whose fetch completion will be applied
    in_flight: RefCell<Vec<TrackedElement<E>>>,
    tracker: RefCell<ViewportTracker>,
    handlers: RefCell<Vec<HandlerId>>,
    callbacks: Callbacks<E>,
    ctx: LoaderContext<E>,
    stats: Cell<ControllerStats>,
}

impl<E: ElementHandle> ControllerCore<E> {
    fn set_state(&self, state: ControllerState) {
        tracing::trace!(from = ?self.state.get(), to = ?state, "controller state");
        self.state.set(state);
    }

    fn is_active(&self) -> bool {
        self.state.get() == ControllerState::Active
    }

    fn record(&self, update: impl FnOnce(&mut ControllerStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    /// Add untracked elements to the working set
    ///
    /// Nothing is marked unless the whole collection is admissible.
    fn admit(&self, elements: impl IntoIterator<Item = E>) -> Result<usize> {
        let mut fresh: Vec<E> = Vec::new();
        let mut skipped = 0usize;
        for element in elements {
            if element.is_tracked() || fresh.contains(&element) {
                skipped += 1;
            } else {
                fresh.push(element);
            }
        }

        let pictures = fresh
            .iter()
            .filter(|element| element.attribute(ATTR_PICTURE).is_some())
            .count();
        if pictures > 0 && self.ctx.picture_parser().is_none() {
            return Err(PostimgError::PictureParserMissing { count: pictures });
        }

        let admitted: Vec<_> = fresh
            .into_iter()
            .map(|element| {
                element.mark_tracked();
                TrackedElement::register(element)
            })
            .collect();
        let count = admitted.len();
        self.working_set.borrow_mut().extend(admitted);

        tracing::debug!(admitted = count, skipped, "elements admitted");
        Ok(count)
    }

    /// Bind listeners and run the first pass, or go inert
    fn activate(&self) {
        if self.working_set.borrow().is_empty() {
            tracing::debug!("nothing to track, controller inert");
            self.set_state(ControllerState::Inert);
            return;
        }

        self.bind_handlers();
        self.set_state(ControllerState::Active);
        self.fetch_images();
    }

    fn bind_handlers(&self) {
        let delay = self.options.rate_limit_delay();
        let mode = self.options.rate_limit_mode;
        let mut handlers = self.handlers.borrow_mut();

        for event_type in [EventType::Scroll, EventType::Resize] {
            let this = self.this.clone();
            let limiter = RateLimiter::wrap(delay, mode, move |event_type: EventType| {
                if let Some(core) = this.upgrade() {
                    tracing::trace!(?event_type, "viewport signal");
                    core.fetch_postponed_images();
                }
            });
            handlers.push(self.ctx.events().bind(event_type, limiter));
        }
    }

    fn fetch_postponed_images(&self) {
        if self.options.load_type != LoadType::Postpone || !self.is_active() {
            return;
        }

        let visible = {
            let mut working_set = self.working_set.borrow_mut();
            let visible = self
                .tracker
                .borrow_mut()
                .filter_visible(working_set.as_slice(), Some(self.options.threshold));
            working_set.retain(|element| !visible.contains(element));
            visible
        };

        if visible.is_empty() {
            return;
        }
        self.process_batch(visible);
    }

    fn fetch_lazy_loaded_images(&self) {
        if self.options.load_type != LoadType::Lazyload || !self.is_active() {
            return;
        }

        let batch: Vec<_> = self
            .working_set
            .borrow()
            .iter()
            .filter(|element| element.state() == Some(LoadState::Pending))
            .cloned()
            .collect();

        if batch.is_empty() {
            return;
        }
        self.process_batch(batch);
    }

    fn process_batch(&self, batch: Vec<TrackedElement<E>>) {
        let (pictures, plain): (Vec<_>, Vec<_>) =
            batch.into_iter().partition(|element| element.in_picture_group());
        tracing::debug!(pictures = pictures.len(), plain = plain.len(), "processing batch");
        self.record(|stats| stats.batches += 1);

        for element in pictures.iter().chain(&plain) {
            self.callbacks.enter(element.handle());
        }
        // An enter callback may have destroyed the controller
        if !self.is_active() {
            return;
        }

        match self.ctx.picture_parser() {
            Some(parser) if !pictures.is_empty() => self.delegate_pictures(&**parser, &pictures),
            _ => debug_assert!(pictures.is_empty(), "picture elements admitted without a parser"),
        }
        for element in plain {
            self.request(element);
        }
    }

    fn delegate_pictures(&self, parser: &dyn PictureParser<E>, pictures: &[TrackedElement<E>]) {
        let handles: Vec<E> = pictures.iter().map(|element| element.handle().clone()).collect();
        parser.parse(&handles);

        for element in pictures {
            element.set_state(LoadState::Delegated);
        }
        self.forget(pictures);
        self.record(|stats| stats.delegated += pictures.len() as u64);
    }

    fn request(&self, element: TrackedElement<E>) {
        let Some(url) = element.source_url().map(str::to_string) else {
            self.settle(&element, Err(FetchError::MissingSource));
            return;
        };

        element.set_state(LoadState::Loading);
        self.in_flight.borrow_mut().push(element.clone());
        self.record(|stats| stats.requested += 1);

        let request = self.ctx.images().load(&url);
        let this = self.this.clone();
        self.ctx
            .executor()
            .spawn(async move {
                let outcome = request.await;
                if let Some(core) = this.upgrade() {
                    core.finish(&element, outcome);
                }
            })
            .detach();
    }

    fn finish(&self, element: &TrackedElement<E>, outcome: std::result::Result<String, FetchError>) {
        if self.state.get() == ControllerState::Destroyed {
            tracing::trace!(url = element.source_url(), "ignoring completion after destroy");
            return;
        }

        let owned = {
            let mut in_flight = self.in_flight.borrow_mut();
            let before = in_flight.len();
            in_flight.retain(|pending| pending != element);
            in_flight.len() < before
        };
        if !owned {
            tracing::trace!(url = element.source_url(), "ignoring completion for removed element");
            return;
        }
        self.settle(element, outcome);
    }

    fn settle(&self, element: &TrackedElement<E>, outcome: std::result::Result<String, FetchError>) {
        self.forget(std::slice::from_ref(element));

        match outcome {
            Ok(url) => {
                element.apply_loaded(&url);
                self.record(|stats| stats.loaded += 1);
                self.callbacks.success(element.handle());
            }
            Err(err) => {
                tracing::debug!(%err, "image not loaded");
                element.set_state(LoadState::Failed);
                self.record(|stats| stats.failed += 1);
                self.callbacks.fail(element.handle(), &err);
            }
        }
    }

    /// Drop processed elements from the working set
    fn forget(&self, processed: &[TrackedElement<E>]) {
        self.working_set
            .borrow_mut()
            .retain(|element| !processed.contains(element));
    }

    fn destroy(&self) {
        if self.state.get() == ControllerState::Destroyed {
            return;
        }

        let handlers: Vec<_> = self.handlers.borrow_mut().drain(..).collect();
        for id in handlers {
            self.ctx.events().unbind(id);
        }
        self.working_set.borrow_mut().clear();
        self.in_flight.borrow_mut().clear();
        if let Some(id) = self.id.take() {
            self.ctx.registry().unregister(id);
        }

        tracing::debug!("controller destroyed");
        self.set_state(ControllerState::Destroyed);
    }
}

impl<E: ElementHandle> Reloadable for ControllerCore<E> {
    fn fetch_images(&self) {
        self.fetch_postponed_images();
        self.fetch_lazy_loaded_images();
    }
}

/// Image load controller
///
/// Dropping the controller destroys it.
pub struct ImageLoadController<E: ElementHandle> {
    core: Rc<ControllerCore<E>>,
}

impl<E: ElementHandle> ImageLoadController<E> {
    /// Take ownership of `elements` and start tracking them
    ///
    /// Elements already tracked by another controller are skipped. Fails if
    /// picture-group elements are present and the context has no parser.
    pub fn new(
        elements: impl IntoIterator<Item = E>,
        options: ControllerOptions,
        callbacks: Callbacks<E>,
        ctx: &LoaderContext<E>,
    ) -> Result<Self> {
        let tracker = ViewportTracker::new(Rc::clone(ctx.viewport()), options.threshold);
        let core = Rc::new_cyclic(|this| ControllerCore {
            this: this.clone(),
            id: Cell::new(None),
            options,
            state: Cell::new(ControllerState::Uninitialized),
            working_set: RefCell::new(Vec::new()),
            in_flight: RefCell::new(Vec::new()),
            tracker: RefCell::new(tracker),
            handlers: RefCell::new(Vec::new()),
            callbacks,
            ctx: ctx.clone(),
            stats: Cell::new(ControllerStats::default()),
        });

        core.set_state(ControllerState::Scanning);
        core.admit(elements)?;

        let weak = Rc::downgrade(&core) as Weak<dyn Reloadable>;
        core.id.set(Some(ctx.registry().register(weak)));

        core.activate();
        Ok(Self { core })
    }

    pub fn id(&self) -> Option<InstanceId> {
        self.core.id.get()
    }

    pub fn state(&self) -> ControllerState {
        self.core.state.get()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.core.options
    }

    /// Elements still waiting to be processed
    pub fn pending(&self) -> Vec<E> {
        self.core
            .working_set
            .borrow()
            .iter()
            .map(|element| element.handle().clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.core.working_set.borrow().len()
    }

    /// Track more elements
    ///
    /// An inert controller becomes active; an active one picks the new
    /// elements up on its next pass.
    pub fn add_elements(&self, elements: impl IntoIterator<Item = E>) -> Result<usize> {
        if self.state() == ControllerState::Destroyed {
            return Ok(0);
        }

        let added = self.core.admit(elements)?;
        if added > 0 && self.state() == ControllerState::Inert {
            self.core.activate();
        }
        Ok(added)
    }

    /// Stop tracking an element
    ///
    /// Its state marker and tracked marker are cleared so another controller
    /// may take it, and an in-flight fetch no longer touches it.
    pub fn remove_element(&self, element: &E) -> bool {
        let mut removed = Vec::new();
        for set in [&self.core.working_set, &self.core.in_flight] {
            set.borrow_mut().retain(|tracked| {
                let keep = tracked.handle() != element;
                if !keep {
                    removed.push(tracked.clone());
                }
                keep
            });
        }

        for tracked in &removed {
            tracked.release();
        }
        !removed.is_empty()
    }

    /// Load visible elements (postpone mode)
    pub fn fetch_postponed_images(&self) {
        self.core.fetch_postponed_images();
    }

    /// Load every pending element (lazyload mode)
    pub fn fetch_lazy_loaded_images(&self) {
        self.core.fetch_lazy_loaded_images();
    }

    /// Run whichever pass the load type selects
    pub fn fetch_images(&self) {
        self.core.fetch_images();
    }

    /// Get stats
    pub fn stats(&self) -> ControllerStats {
        self.core.stats.get()
    }

    /// Unbind listeners and release the working set
    ///
    /// In-flight fetches stay in the shared cache; their completion is ignored.
    pub fn destroy(&self) {
        self.core.destroy();
    }
}

impl<E: ElementHandle> Drop for ImageLoadController<E> {
    fn drop(&mut self) {
        self.core.destroy();
    }
}

impl<E: ElementHandle> fmt::Debug for ImageLoadController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoadController")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("options", &self.core.options)
            .field("pending", &self.pending_count())
            .field("stats", &self.stats())
            .finish()
    }
}
