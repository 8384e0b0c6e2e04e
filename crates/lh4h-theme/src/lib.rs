//! Theme preference controller
//!
//! Resolves the light/dark preference for a page, applies it to the document
//! root and the toggle controls, and persists user choices. All access to the
//! document and storage goes through [`ThemeEnvironment`] so the controller
//! runs the same against a real DOM (see `lh4h-theme-wasm`) and against the
//! in-memory [`MemoryEnvironment`].

pub mod controller;
pub mod environment;
pub mod error;
pub mod memory;
pub mod theme;

pub use controller::ThemeController;
pub use environment::{ThemeEnvironment, ToggleControl};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryControl, MemoryEnvironment};
pub use theme::{ParseThemeError, Theme, ThemeKeys};
