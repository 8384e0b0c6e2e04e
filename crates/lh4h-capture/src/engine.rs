//! Browser Engine Traits
//!
//! The orchestrator drives a browser only through these traits. Implement
//! them for different backends: headless Chrome, or a scripted engine in
//! tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LaunchSettings;
use crate::error::EngineResult;
use crate::shot::{ShotSpec, Viewport};

/// What a navigation waits for before it resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// No network activity for a short quiet period
    NetworkIdle,
    /// The page `load` event
    Load,
}

/// Settings for an isolated browsing context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub viewport: Viewport,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub reduced_motion: bool,
}

impl From<&ShotSpec> for ContextOptions {
    fn from(shot: &ShotSpec) -> Self {
        Self {
            viewport: shot.viewport,
            device_scale_factor: shot.device_scale_factor,
            is_mobile: shot.is_mobile,
            has_touch: shot.has_touch,
            reduced_motion: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotTarget {
    FullPage,
    Element(String),
}

/// Starts browser processes
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, settings: &LaunchSettings) -> EngineResult<Box<dyn BrowserSession>>;

    /// Get the name of this engine (for logging/debugging)
    fn engine_name(&self) -> &'static str;
}

/// A running browser process
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open a fresh isolated context holding a single page
    async fn new_context(&self, options: &ContextOptions) -> EngineResult<Box<dyn BrowserPage>>;

    /// Terminate the browser process
    async fn close(&self) -> EngineResult<()>;
}

/// A page inside its own context
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration)
        -> EngineResult<()>;

    async fn wait_for_selector(&self, selector: &str) -> EngineResult<()>;

    /// Evaluate a script expression, awaiting it if it yields a promise
    async fn evaluate(&self, script: &str, await_promise: bool)
        -> EngineResult<serde_json::Value>;

    async fn add_style(&self, css: &str) -> EngineResult<()>;

    async fn scroll_to_origin(&self) -> EngineResult<()>;

    /// Capture `target` as JPEG bytes
    async fn screenshot(&self, target: &ScreenshotTarget, quality: u8) -> EngineResult<Vec<u8>>;

    /// Close the page and dispose its context
    async fn close(&self) -> EngineResult<()>;
}
