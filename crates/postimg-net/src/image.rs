//! Image Fetch
//!
//! Request cache specialised over a native image decode primitive.

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::cache::{RequestCache, SharedFetch};
use crate::FetchError;

/// Decode completion reported by an [`ImageDecoder`]
pub type DecodeFuture = LocalBoxFuture<'static, Result<(), FetchError>>;

/// Image decode primitive
///
/// Starts decoding `url` and reports success or failure asynchronously.
pub trait ImageDecoder {
    fn decode(&self, url: &str) -> DecodeFuture;
}

/// Cached image loader
///
/// Each URL is decoded at most once; the outcome resolves to the URL itself.
#[derive(Clone)]
pub struct ImageFetch {
    cache: RequestCache<String, FetchError>,
    decoder: Rc<dyn ImageDecoder>,
}

impl ImageFetch {
    pub fn new(decoder: Rc<dyn ImageDecoder>) -> Self {
        Self {
            cache: RequestCache::new(),
            decoder,
        }
    }

    /// Load an image, sharing any earlier request for the same URL
    pub fn load(&self, url: &str) -> SharedFetch<String, FetchError> {
        let decoder = Rc::clone(&self.decoder);
        self.cache.fetch(url, move |url| {
            tracing::debug!(url, "decoding image");
            let url = url.to_string();
            let decode = decoder.decode(&url);
            async move {
                match decode.await {
                    Ok(()) => Ok(url),
                    Err(err) => {
                        tracing::debug!(%err, "image decode failed");
                        Err(err)
                    }
                }
            }
        })
    }

    pub fn cache(&self) -> &RequestCache<String, FetchError> {
        &self.cache
    }
}

impl fmt::Debug for ImageFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFetch")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
