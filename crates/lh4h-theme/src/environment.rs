//! Capability interface between the controller and its host document

use crate::error::StorageResult;
use crate::theme::Theme;

/// Everything the controller needs from the page it runs in.
///
/// Implement this for different hosts: the browser DOM, or an in-memory
/// stand-in for tests.
pub trait ThemeEnvironment {
    type Control: ToggleControl + Clone + 'static;

    /// Read the raw value stored under `key`
    fn read_preference(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`
    fn write_preference(&self, key: &str, value: &str) -> StorageResult<()>;

    /// The system-level light/dark signal, if the host exposes one
    fn query_color_scheme(&self) -> Option<Theme>;

    /// Set the theme attribute on the document root
    fn apply_attribute(&self, theme: Theme);

    /// Raw value of the theme attribute currently on the document root
    fn current_attribute(&self) -> Option<String>;

    /// All toggle controls currently present in the document
    fn enumerate_toggle_controls(&self) -> Vec<Self::Control>;

    /// Run `handler` once the document content is ready. Hosts whose content
    /// is already ready may run it immediately.
    fn on_content_ready(&self, handler: Box<dyn FnOnce()>);
}

/// A button (or similar) that requests a specific theme when activated.
pub trait ToggleControl {
    /// The theme this control asks for, exactly as authored on the control
    fn requested_theme(&self) -> Option<String>;

    /// Reflect whether this control's theme is the applied one
    fn set_active(&self, active: bool);

    /// Register `handler` to run on every activation
    fn on_activate(&self, handler: Box<dyn Fn()>);
}
