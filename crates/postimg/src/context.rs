//! Loader Context
//!
//! Collaborators shared by every controller of one document.

use std::fmt;
use std::rc::Rc;

use postimg_net::{ImageDecoder, ImageFetch};
use smol::LocalExecutor;

use crate::events::WindowEvents;
use crate::registry::ControllerRegistry;
use crate::viewport::ViewportSource;

/// External parser for picture-group elements
pub trait PictureParser<E> {
    fn parse(&self, elements: &[E]);
}

/// Shared collaborators for controllers
pub struct LoaderContext<E> {
    events: WindowEvents,
    viewport: Rc<dyn ViewportSource>,
    images: ImageFetch,
    registry: ControllerRegistry,
    executor: Rc<LocalExecutor<'static>>,
    picture_parser: Option<Rc<dyn PictureParser<E>>>,
}

impl<E> LoaderContext<E> {
    /// Context with fresh events, cache, registry and executor
    pub fn new(viewport: Rc<dyn ViewportSource>, decoder: Rc<dyn ImageDecoder>) -> Self {
        Self {
            events: WindowEvents::new(),
            viewport,
            images: ImageFetch::new(decoder),
            registry: ControllerRegistry::new(),
            executor: Rc::new(LocalExecutor::new()),
            picture_parser: None,
        }
    }

    pub fn with_picture_parser(mut self, parser: Rc<dyn PictureParser<E>>) -> Self {
        self.picture_parser = Some(parser);
        self
    }

    /// Share an existing image cache
    pub fn with_images(mut self, images: ImageFetch) -> Self {
        self.images = images;
        self
    }

    pub fn with_registry(mut self, registry: ControllerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_events(mut self, events: WindowEvents) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &WindowEvents {
        &self.events
    }

    pub fn viewport(&self) -> &Rc<dyn ViewportSource> {
        &self.viewport
    }

    pub fn images(&self) -> &ImageFetch {
        &self.images
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &Rc<LocalExecutor<'static>> {
        &self.executor
    }

    pub fn picture_parser(&self) -> Option<&Rc<dyn PictureParser<E>>> {
        self.picture_parser.as_ref()
    }

    /// Run ready fetch completions until none is left
    pub fn run_pending(&self) -> usize {
        let mut ticks = 0;
        while self.executor.try_tick() {
            ticks += 1;
        }
        ticks
    }
}

impl<E> Clone for LoaderContext<E> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            viewport: Rc::clone(&self.viewport),
            images: self.images.clone(),
            registry: self.registry.clone(),
            executor: Rc::clone(&self.executor),
            picture_parser: self.picture_parser.clone(),
        }
    }
}

impl<E> fmt::Debug for LoaderContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderContext")
            .field("events", &self.events)
            .field("images", &self.images)
            .field("registry", &self.registry)
            .field("picture_parser", &self.picture_parser.is_some())
            .finish_non_exhaustive()
    }
}
