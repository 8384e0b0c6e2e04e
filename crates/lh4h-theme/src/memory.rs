//! In-memory Theme Environment
//!
//! A document stand-in with a key-value store, a root attribute and a list of
//! toggle controls. Used by the tests and for running the controller outside
//! a browser.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::environment::{ThemeEnvironment, ToggleControl};
use crate::error::{StorageError, StorageResult};
use crate::theme::Theme;

#[derive(Default)]
pub struct MemoryEnvironment {
    storage: RefCell<HashMap<String, String>>,
    storage_fails: Cell<bool>,
    color_scheme: Cell<Option<Theme>>,
    attribute: RefCell<Option<String>>,
    controls: RefCell<Vec<MemoryControl>>,
    content_ready: Cell<bool>,
    pending: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the storage contents of an earlier session
    pub fn with_storage(self, storage: HashMap<String, String>) -> Self {
        *self.storage.borrow_mut() = storage;
        self
    }

    pub fn with_stored(self, key: &str, value: &str) -> Self {
        self.storage
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Every read and write fails, as with storage disabled by the browser
    pub fn with_failing_storage(self) -> Self {
        self.storage_fails.set(true);
        self
    }

    pub fn with_color_scheme(self, scheme: Option<Theme>) -> Self {
        self.color_scheme.set(scheme);
        self
    }

    pub fn add_control(&self, requested: Option<&str>) -> MemoryControl {
        let control = MemoryControl::new(requested);
        self.controls.borrow_mut().push(control.clone());
        control
    }

    /// Set the root attribute directly, bypassing the controller
    pub fn set_attribute(&self, value: Option<&str>) {
        *self.attribute.borrow_mut() = value.map(str::to_string);
    }

    pub fn attribute(&self) -> Option<String> {
        self.attribute.borrow().clone()
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.storage.borrow().get(key).cloned()
    }

    pub fn storage_snapshot(&self) -> HashMap<String, String> {
        self.storage.borrow().clone()
    }

    pub fn is_content_ready(&self) -> bool {
        self.content_ready.get()
    }

    /// Mark the content ready and run every queued handler
    pub fn fire_content_ready(&self) {
        self.content_ready.set(true);
        let handlers: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        for handler in handlers {
            handler();
        }
    }
}

impl ThemeEnvironment for MemoryEnvironment {
    type Control = MemoryControl;

    fn read_preference(&self, key: &str) -> StorageResult<Option<String>> {
        if self.storage_fails.get() {
            return Err(StorageError::Denied("storage disabled".to_string()));
        }
        Ok(self.stored(key))
    }

    fn write_preference(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.storage_fails.get() {
            return Err(StorageError::Denied("storage disabled".to_string()));
        }
        self.storage
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn query_color_scheme(&self) -> Option<Theme> {
        self.color_scheme.get()
    }

    fn apply_attribute(&self, theme: Theme) {
        *self.attribute.borrow_mut() = Some(theme.as_str().to_string());
    }

    fn current_attribute(&self) -> Option<String> {
        self.attribute()
    }

    fn enumerate_toggle_controls(&self) -> Vec<MemoryControl> {
        self.controls.borrow().clone()
    }

    fn on_content_ready(&self, handler: Box<dyn FnOnce()>) {
        if self.content_ready.get() {
            handler();
        } else {
            self.pending.borrow_mut().push(handler);
        }
    }
}

struct ControlState {
    requested: Option<String>,
    pressed: Cell<Option<bool>>,
    handlers: RefCell<Vec<Box<dyn Fn()>>>,
}

/// Toggle control handle; clones share state.
#[derive(Clone)]
pub struct MemoryControl {
    state: Rc<ControlState>,
}

impl MemoryControl {
    fn new(requested: Option<&str>) -> Self {
        Self {
            state: Rc::new(ControlState {
                requested: requested.map(str::to_string),
                pressed: Cell::new(None),
                handlers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// `None` until the controller has touched this control
    pub fn pressed(&self) -> Option<bool> {
        self.state.pressed.get()
    }

    pub fn handler_count(&self) -> usize {
        self.state.handlers.borrow().len()
    }

    pub fn click(&self) {
        for handler in self.state.handlers.borrow().iter() {
            handler();
        }
    }
}

impl ToggleControl for MemoryControl {
    fn requested_theme(&self) -> Option<String> {
        self.state.requested.clone()
    }

    fn set_active(&self, active: bool) {
        self.state.pressed.set(Some(active));
    }

    fn on_activate(&self, handler: Box<dyn Fn()>) {
        self.state.handlers.borrow_mut().push(handler);
    }
}
