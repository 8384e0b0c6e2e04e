//! Screenshot Capture
//!
//! Renders the site's pages in a headless browser and writes JPEG
//! deliverables. The [`CaptureOrchestrator`] owns the sequencing, the bounded
//! waits and the cleanup; the browser itself sits behind [`BrowserEngine`],
//! with [`ChromeEngine`] as the headless Chrome implementation.

pub mod chrome;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod shot;

pub use chrome::ChromeEngine;
pub use config::{CaptureConfig, CaptureTimings, LaunchSettings};
pub use engine::{
    BrowserEngine, BrowserPage, BrowserSession, ContextOptions, ScreenshotTarget, WaitUntil,
};
pub use error::{CaptureError, CaptureResult, EngineError, EngineResult, Stage};
pub use orchestrator::{CaptureOrchestrator, CaptureReport, WrittenShot, FREEZE_STYLE};
pub use shot::{builtin_shots, load_manifest, ShotSpec, Viewport};
