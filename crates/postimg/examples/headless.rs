//! Example: postpone loading on a headless page
//!
//! Run with `RUST_LOG=postimg=debug` to follow the passes.

use std::rc::Rc;
use std::time::{Duration, Instant};

use futures::future::{self, FutureExt};
use postimg::memory::MemoryElement;
use postimg::net::DecodeFuture;
use postimg::{
    ATTR_DEFERRED_SRC, ATTR_SRC, Callbacks, ControllerOptions, ElementHandle, EventType, FetchError,
    ImageDecoder, ImageLoadController, LoaderContext, WindowMetrics,
};
use tracing_subscriber::EnvFilter;

/// Decodes everything except `.gif` files
struct StaticDecoder;

impl ImageDecoder for StaticDecoder {
    fn decode(&self, url: &str) -> DecodeFuture {
        let outcome = if url.ends_with(".gif") {
            Err(FetchError::Decode {
                url: url.to_string(),
                reason: "unsupported format".into(),
            })
        } else {
            Ok(())
        };
        future::ready(outcome).boxed_local()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let metrics = Rc::new(WindowMetrics::new(0.0, 800.0));
    let ctx: LoaderContext<MemoryElement> = LoaderContext::new(metrics.clone(), Rc::new(StaticDecoder));

    let images: Vec<_> = ["/hero.jpg", "/gallery-1.jpg", "/banner.gif", "/gallery-2.jpg"]
        .iter()
        .enumerate()
        .map(|(i, src)| MemoryElement::image(i as f64 * 1200.0, 400.0).with_attribute(ATTR_DEFERRED_SRC, src))
        .collect();

    let callbacks = Callbacks::new()
        .on_success(|element: &MemoryElement| println!("loaded {:?}", element.attribute(ATTR_SRC)))
        .on_fail(|_, err: &FetchError| println!("failed: {err}"));
    let controller = ImageLoadController::new(images, ControllerOptions::default(), callbacks, &ctx)?;

    println!("postimg v{}", postimg::VERSION);
    ctx.run_pending();

    let start = Instant::now();
    for (step, offset) in [600.0, 1800.0, 3000.0].into_iter().enumerate() {
        let now = start + Duration::from_secs(step as u64);
        metrics.scroll_to(offset);
        ctx.events().dispatch(EventType::Scroll, now);
        ctx.events().advance(now + controller.options().rate_limit_delay());
        ctx.run_pending();
        println!("scrolled to {offset}: {} pending", controller.pending_count());
    }

    println!("{:?}", controller.stats());
    Ok(())
}
