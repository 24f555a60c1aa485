//! In-memory Elements
//!
//! Element handles for headless hosts without a live document.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::element::ElementHandle;
use crate::viewport::{ElementGeometry, Positioned};

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    geometry: ElementGeometry,
    attributes: HashMap<String, String>,
    classes: Vec<String>,
    tracked: bool,
}

/// Shared handle to an in-memory element
///
/// Clones refer to the same element; equality is identity.
#[derive(Debug, Clone)]
pub struct MemoryElement {
    data: Rc<RefCell<ElementData>>,
}

impl MemoryElement {
    pub fn new(tag: &str, geometry: ElementGeometry) -> Self {
        Self {
            data: Rc::new(RefCell::new(ElementData {
                tag: tag.to_string(),
                geometry,
                ..Default::default()
            })),
        }
    }

    /// `<img>` element at the given document offset
    pub fn image(top: f64, height: f64) -> Self {
        Self::new("img", ElementGeometry::new(top, height))
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn tag(&self) -> String {
        self.data.borrow().tag.clone()
    }

    pub fn set_geometry(&self, geometry: ElementGeometry) {
        self.data.borrow_mut().geometry = geometry;
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.data.borrow().classes.iter().any(|c| c == class)
    }

    pub fn classes(&self) -> Vec<String> {
        self.data.borrow().classes.clone()
    }
}

impl PartialEq for MemoryElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Positioned for MemoryElement {
    fn geometry(&self) -> ElementGeometry {
        self.data.borrow().geometry
    }
}

impl ElementHandle for MemoryElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.data.borrow().attributes.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.data
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.data.borrow_mut().attributes.remove(name);
    }

    fn add_class(&self, class: &str) {
        let mut data = self.data.borrow_mut();
        if !data.classes.iter().any(|c| c == class) {
            data.classes.push(class.to_string());
        }
    }

    fn is_tracked(&self) -> bool {
        self.data.borrow().tracked
    }

    fn mark_tracked(&self) {
        self.data.borrow_mut().tracked = true;
    }

    fn clear_tracked(&self) {
        self.data.borrow_mut().tracked = false;
    }
}
