//! Controller Registry
//!
//! Live controller instances, so every one of them can be asked to load now.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Registry-facing side of a controller
pub trait Reloadable {
    /// Run the controller's postpone and lazyload passes
    fn fetch_images(&self);
}

/// Controller instance ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

#[derive(Default)]
struct RegistryInner {
    instances: BTreeMap<InstanceId, Weak<dyn Reloadable>>,
    next_id: u64,
}

/// Registry of live controllers
///
/// Cloning yields another handle onto the same registry.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instance: Weak<dyn Reloadable>) -> InstanceId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = InstanceId(inner.next_id);
        inner.instances.insert(id, instance);
        id
    }

    pub fn unregister(&self, id: InstanceId) -> bool {
        self.inner.borrow_mut().instances.remove(&id).is_some()
    }

    /// Run every live controller's passes, in registration order
    ///
    /// Returns the number of controllers reached.
    pub fn fetch_all_images(&self) -> usize {
        let live: Vec<Rc<dyn Reloadable>> = {
            let mut inner = self.inner.borrow_mut();
            inner.instances.retain(|_, instance| instance.strong_count() > 0);
            inner.instances.values().filter_map(Weak::upgrade).collect()
        };

        tracing::debug!(instances = live.len(), "fetching all images");
        for instance in &live {
            instance.fetch_images();
        }
        live.len()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().instances.is_empty()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.inner.borrow().instances.contains_key(&id)
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("instances", &self.len())
            .finish()
    }
}
