//! Capture Orchestrator
//!
//! Runs shots strictly in sequence against one browser process. Each shot
//! gets its own context, goes through the stages listed in [`Stage`], and has
//! its context closed before the next shot starts. The browser is closed on
//! every exit path.
//!
//! Only navigation is retried (network idle, then once more waiting for
//! `load`). Font loading problems are ignored. Anything else ends the run;
//! files written by earlier shots are left in place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::{CaptureConfig, CaptureTimings, LaunchSettings};
use crate::engine::{BrowserEngine, BrowserPage, BrowserSession, ContextOptions, WaitUntil};
use crate::error::{CaptureError, CaptureResult, EngineError, Stage};
use crate::shot::ShotSpec;

/// Disables animation and transitions and hides scrollbars before capture
pub const FREEZE_STYLE: &str = r#"
*, *::before, *::after { animation: none !important; transition: none !important; }
html, body { scrollbar-width: none !important; }
::-webkit-scrollbar { width: 0 !important; height: 0 !important; }
"#;

/// Resolves when web fonts are ready or after `cap`, whichever is first
pub fn fonts_ready_script(cap: Duration) -> String {
    format!(
        "Promise.race([\
            document.fonts ? document.fonts.ready.then(() => true) : Promise.resolve(true), \
            new Promise((resolve) => setTimeout(() => resolve(false), {})) \
        ])",
        cap.as_millis()
    )
}

/// One file produced by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenShot {
    pub name: String,
    pub path: PathBuf,
    pub bytes: usize,
    /// Navigation needed the `load` fallback
    pub used_load_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub shots: Vec<WrittenShot>,
}

impl CaptureReport {
    pub fn paths(&self) -> Vec<&std::path::Path> {
        self.shots.iter().map(|s| s.path.as_path()).collect()
    }
}

pub struct CaptureOrchestrator {
    engine: Arc<dyn BrowserEngine>,
    launch: LaunchSettings,
    timings: CaptureTimings,
}

impl CaptureOrchestrator {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            launch: LaunchSettings::default(),
            timings: CaptureTimings::default(),
        }
    }

    pub fn with_launch(mut self, launch: LaunchSettings) -> Self {
        self.launch = launch;
        self
    }

    pub fn with_timings(mut self, timings: CaptureTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Orchestrator for a prepared config; run it with `config.shots`
    pub fn from_config(engine: Arc<dyn BrowserEngine>, config: &CaptureConfig) -> Self {
        Self::new(engine)
            .with_launch(config.launch.clone())
            .with_timings(config.timings)
    }

    /// Capture every shot in order
    pub async fn run(&self, shots: &[ShotSpec]) -> CaptureResult<CaptureReport> {
        for shot in shots {
            shot.validate()?;
        }
        prepare_output_dirs(shots).await?;

        debug!("Launching browser via {}", self.engine.engine_name());
        let session = self
            .engine
            .launch(&self.launch)
            .await
            .map_err(CaptureError::Launch)?;

        let outcome = self.capture_all(session.as_ref(), shots).await;
        let closed = session.close().await;

        let report = match (outcome, closed) {
            (Ok(report), Ok(())) => report,
            (Ok(_), Err(e)) => return Err(CaptureError::Shutdown(e)),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(close_err)) => {
                warn!("Failed to close browser after error: {}", close_err);
                return Err(e);
            }
        };

        let written: Vec<String> = report
            .paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        info!("Wrote {}", written.join(", "));
        Ok(report)
    }

    async fn capture_all(
        &self,
        session: &dyn BrowserSession,
        shots: &[ShotSpec],
    ) -> CaptureResult<CaptureReport> {
        let mut report = CaptureReport::default();
        for shot in shots {
            let written = self.capture_shot(session, shot).await.inspect_err(|e| {
                error!("Shot '{}' failed: {}", shot.name, e);
            })?;
            report.shots.push(written);
        }
        Ok(report)
    }

    async fn capture_shot(
        &self,
        session: &dyn BrowserSession,
        shot: &ShotSpec,
    ) -> CaptureResult<WrittenShot> {
        debug!("Opening context for shot '{}'", shot.name);
        let page = session
            .new_context(&ContextOptions::from(shot))
            .await
            .map_err(|e| CaptureError::shot(&shot.name, Stage::Context, e))?;

        let outcome = self.drive_page(page.as_ref(), shot).await;
        let disposed = page.close().await;

        match (outcome, disposed) {
            (Ok(written), Ok(())) => Ok(written),
            (Ok(_), Err(e)) => Err(CaptureError::shot(&shot.name, Stage::Dispose, e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("Failed to close context of shot '{}': {}", shot.name, close_err);
                Err(e)
            }
        }
    }

    async fn drive_page(
        &self,
        page: &dyn BrowserPage,
        shot: &ShotSpec,
    ) -> CaptureResult<WrittenShot> {
        let fail =
            move |stage: Stage| move |e: EngineError| CaptureError::shot(&shot.name, stage, e);
        let url = shot.render_url()?;

        debug!("[{}] {} {}", shot.name, Stage::Navigate, url);
        let used_load_fallback = self
            .navigate(page, url.as_str())
            .await
            .map_err(fail(Stage::Navigate))?;

        debug!("[{}] {} {}", shot.name, Stage::AwaitSelector, shot.stability_selector);
        page.wait_for_selector(&shot.stability_selector)
            .await
            .map_err(fail(Stage::AwaitSelector))?;

        debug!("[{}] {}", shot.name, Stage::AwaitFonts);
        self.await_fonts(page).await;

        debug!("[{}] {} {:?}", shot.name, Stage::Settle, self.timings.settle);
        tokio::time::sleep(self.timings.settle).await;

        debug!("[{}] {}", shot.name, Stage::InjectStyle);
        page.add_style(FREEZE_STYLE)
            .await
            .map_err(fail(Stage::InjectStyle))?;

        if shot.is_full_page() {
            debug!("[{}] {}", shot.name, Stage::ScrollToOrigin);
            page.scroll_to_origin()
                .await
                .map_err(fail(Stage::ScrollToOrigin))?;
        }
        let target = shot.capture_target();

        debug!("[{}] {} {:?} q{}", shot.name, Stage::Capture, target, shot.quality);
        let image = page
            .screenshot(&target, shot.quality)
            .await
            .map_err(fail(Stage::Capture))?;
        if image.is_empty() {
            return Err(CaptureError::shot(
                &shot.name,
                Stage::Capture,
                EngineError::Screenshot("engine returned an empty image".to_string()),
            ));
        }

        fs::write(&shot.output, &image)
            .await
            .map_err(|source| CaptureError::Write {
                shot: shot.name.clone(),
                path: shot.output.clone(),
                source,
            })?;

        info!(
            "Screenshot '{}' saved to {} ({} bytes)",
            shot.name,
            shot.output.display(),
            image.len()
        );

        Ok(WrittenShot {
            name: shot.name.clone(),
            path: shot.output.clone(),
            bytes: image.len(),
            used_load_fallback,
        })
    }

    /// Navigate waiting for network idle, falling back once to `load`.
    /// Returns whether the fallback was needed.
    async fn navigate(&self, page: &dyn BrowserPage, url: &str) -> Result<bool, EngineError> {
        let limit = self.timings.navigation;

        match tokio::time::timeout(limit, page.navigate(url, WaitUntil::NetworkIdle, limit)).await {
            Ok(Ok(())) => return Ok(false),
            Ok(Err(e)) => warn!("Network idle wait failed for {}, retrying with load: {}", url, e),
            Err(_) => warn!(
                "Network idle wait timed out after {:?} for {}, retrying with load",
                limit, url
            ),
        }

        match tokio::time::timeout(limit, page.navigate(url, WaitUntil::Load, limit)).await {
            Ok(result) => result.map(|()| true),
            Err(_) => Err(EngineError::Timeout {
                what: format!("load of {}", url),
                after: limit,
            }),
        }
    }

    // Whether fonts loaded or the cap fired first is not distinguished.
    async fn await_fonts(&self, page: &dyn BrowserPage) {
        let cap = self.timings.fonts;
        let script = fonts_ready_script(cap);
        match tokio::time::timeout(cap, page.evaluate(&script, true)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Ignoring font wait error: {}", e),
            Err(_) => debug!("Font wait capped after {:?}", cap),
        }
    }
}

/// Create the parent directory of every output before anything is captured
async fn prepare_output_dirs(shots: &[ShotSpec]) -> CaptureResult<()> {
    for shot in shots {
        let Some(parent) = shot.output.parent().filter(|p| !p.as_os_str().is_empty()) else {
            continue;
        };
        fs::create_dir_all(parent)
            .await
            .map_err(|source| CaptureError::OutputDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}
