//! postimg
//!
//! Load images via postpone or lazyload method.
//!
//! Images are deferred until they come near the viewport (postpone) or until
//! a pass is requested (lazyload). Scroll and resize signals are rate limited,
//! and every image URL is decoded at most once across all controllers that
//! share a [`LoaderContext`].
//!
//! # Example
//! ```rust,ignore
//! use postimg::{create_controller, ControllerOptions, LoaderContext, WindowMetrics};
//!
//! let metrics = Rc::new(WindowMetrics::new(0.0, 800.0));
//! let ctx = LoaderContext::new(metrics.clone(), decoder);
//! let controller = create_controller(images, ControllerOptions::default(), &ctx)?;
//!
//! metrics.scroll_to(1800.0);
//! ctx.events().dispatch(EventType::Scroll, Instant::now());
//! ```

mod config;
mod context;
mod controller;
mod element;
mod error;
mod events;
pub mod memory;
mod rate_limit;
mod registry;
mod viewport;

pub use config::{ControllerOptions, LoadType};
pub use context::{LoaderContext, PictureParser};
pub use controller::{Callbacks, ControllerState, ControllerStats, ImageLoadController};
pub use element::{
    ATTR_ALT, ATTR_DEFERRED_ALT, ATTR_DEFERRED_SRC, ATTR_HEIGHT, ATTR_PICTURE, ATTR_SRC, ATTR_STATE,
    ATTR_WIDTH, ElementHandle, LOADED_CLASS, LoadState, TrackedElement,
};
pub use error::{PostimgError, Result};
pub use events::{EventStats, EventType, HandlerId, WindowEvents};
pub use rate_limit::{RateLimitMode, RateLimiter, RateLimiterState};
pub use registry::{ControllerRegistry, InstanceId, Reloadable};
pub use viewport::{ElementGeometry, Positioned, ViewportBounds, ViewportSource, ViewportTracker, WindowMetrics};

pub use postimg_net as net;
pub use postimg_net::{FetchError, ImageDecoder, ImageFetch};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a controller without notifications
pub fn create_controller<E: ElementHandle>(
    elements: impl IntoIterator<Item = E>,
    options: ControllerOptions,
    ctx: &LoaderContext<E>,
) -> Result<ImageLoadController<E>> {
    ImageLoadController::new(elements, options, Callbacks::default(), ctx)
}
