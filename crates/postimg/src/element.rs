//! Element Model
//!
//! Element handle capability and the tracked element wrapper.

use crate::viewport::{ElementGeometry, Positioned};

/// Deferred source URL
pub const ATTR_DEFERRED_SRC: &str = "data-src";
/// Deferred accessible text
pub const ATTR_DEFERRED_ALT: &str = "data-alt";
/// Marks an element for the picture parser
pub const ATTR_PICTURE: &str = "data-picture";
/// Load state marker
pub const ATTR_STATE: &str = "data-postimg-state";

pub const ATTR_SRC: &str = "src";
pub const ATTR_ALT: &str = "alt";
pub const ATTR_WIDTH: &str = "width";
pub const ATTR_HEIGHT: &str = "height";

/// Class added once an image has been swapped in
pub const LOADED_CLASS: &str = "KistPostimg--is-loaded";

/// Handle to a renderable element owned by the host document
///
/// Handles are cheap references; mutation goes through `&self`.
pub trait ElementHandle: Positioned + Clone + PartialEq + 'static {
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);
    fn remove_attribute(&self, name: &str);
    fn add_class(&self, class: &str);

    /// Marker set by the controller that tracks the element
    fn is_tracked(&self) -> bool;
    fn mark_tracked(&self);
    fn clear_tracked(&self);
}

/// Per-element load state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Registered, not yet processed
    Pending,
    /// Fetch in flight
    Loading,
    /// Image swapped in
    Loaded,
    /// Fetch failed; no swap performed
    Failed,
    /// Handed to the picture parser
    Delegated,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Pending => "pending",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Failed => "failed",
            LoadState::Delegated => "delegated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(LoadState::Pending),
            "loading" => Some(LoadState::Loading),
            "loaded" => Some(LoadState::Loaded),
            "failed" => Some(LoadState::Failed),
            "delegated" => Some(LoadState::Delegated),
            _ => None,
        }
    }

    /// Read the state marker of an element
    pub fn of<E: ElementHandle>(element: &E) -> Option<Self> {
        element.attribute(ATTR_STATE).as_deref().and_then(Self::parse)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed | LoadState::Delegated)
    }
}

/// Element registered with a controller
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedElement<E> {
    handle: E,
    source_url: Option<String>,
    in_picture_group: bool,
}

impl<E: ElementHandle> TrackedElement<E> {
    /// Read deferred attributes and mark the element pending
    pub fn register(handle: E) -> Self {
        let source_url = handle.attribute(ATTR_DEFERRED_SRC).filter(|url| !url.is_empty());
        let in_picture_group = handle.attribute(ATTR_PICTURE).is_some();
        let tracked = Self {
            handle,
            source_url,
            in_picture_group,
        };
        tracked.set_state(LoadState::Pending);
        tracked
    }

    pub fn handle(&self) -> &E {
        &self.handle
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn in_picture_group(&self) -> bool {
        self.in_picture_group
    }

    pub fn state(&self) -> Option<LoadState> {
        LoadState::of(&self.handle)
    }

    pub fn loaded(&self) -> bool {
        self.state() == Some(LoadState::Loaded)
    }

    pub(crate) fn set_state(&self, state: LoadState) {
        self.handle.set_attribute(ATTR_STATE, state.as_str());
    }

    /// Drop the state and tracked markers
    pub(crate) fn release(&self) {
        self.handle.remove_attribute(ATTR_STATE);
        self.handle.clear_tracked();
    }

    /// Swap the deferred image in and mark the element loaded
    pub(crate) fn apply_loaded(&self, url: &str) {
        let element = &self.handle;
        element.set_attribute(ATTR_SRC, url);
        if let Some(alt) = element.attribute(ATTR_DEFERRED_ALT) {
            element.set_attribute(ATTR_ALT, &alt);
        }
        element.remove_attribute(ATTR_WIDTH);
        element.remove_attribute(ATTR_HEIGHT);
        element.add_class(LOADED_CLASS);
        self.set_state(LoadState::Loaded);
    }
}

impl<E: ElementHandle> Positioned for TrackedElement<E> {
    fn geometry(&self) -> ElementGeometry {
        self.handle.geometry()
    }
}
