//! postimg Networking
//!
//! Single-flight request cache and the image fetch built on top of it.

mod cache;
mod image;

pub use cache::{CacheStats, RequestCache, SharedFetch};
pub use image::{DecodeFuture, ImageDecoder, ImageFetch};

/// Fetch error
///
/// Cloneable so a failed outcome can be cached and handed to every
/// subscriber of the same key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Image decode failed for {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Image request cancelled: {url}")]
    Cancelled { url: String },

    #[error("Element has no deferred source")]
    MissingSource,
}

impl FetchError {
    /// URL the failure belongs to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Decode { url, .. } | FetchError::Cancelled { url } => Some(url),
            FetchError::MissingSource => None,
        }
    }
}
