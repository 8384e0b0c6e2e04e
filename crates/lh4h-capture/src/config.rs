//! Capture configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CaptureResult;
use crate::shot::{builtin_shots, load_manifest, ShotSpec};

pub const DEFAULT_OUTPUT_DIR: &str = "deliverables";

/// Bounded waits of the per-shot pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimings {
    /// Limit for each navigation attempt
    pub navigation: Duration,
    /// Cap on waiting for web fonts
    pub fonts: Duration,
    /// Pause after readiness before styling and capturing
    pub settle: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(15),
            fonts: Duration::from_secs(8),
            settle: Duration::from_millis(250),
        }
    }
}

/// How the browser process is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub headless: bool,
    pub sandbox: bool,
    /// Explicit Chrome binary; otherwise auto-detected or fetched
    pub chrome_path: Option<PathBuf>,
    /// Browser exits after this long without any CDP traffic
    pub idle_timeout: Duration,
    /// Limit for selector waits
    pub selector_timeout: Duration,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chrome_path: None,
            idle_timeout: Duration::from_secs(120),
            selector_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub shots: Vec<ShotSpec>,
    /// Source of `shots` when they do not come from [`builtin_shots`]
    pub manifest: Option<PathBuf>,
    pub launch: LaunchSettings,
    pub timings: CaptureTimings,
}

impl CaptureConfig {
    /// Built-in shots for the site at `project_root`, written to
    /// `<project_root>/deliverables`.
    pub fn for_project(project_root: &Path) -> CaptureResult<Self> {
        let project_root = std::path::absolute(project_root)?;
        let output_dir = project_root.join(DEFAULT_OUTPUT_DIR);
        let shots = builtin_shots(&project_root, &output_dir)?;
        Ok(Self {
            project_root,
            output_dir,
            shots,
            manifest: None,
            launch: LaunchSettings::default(),
            timings: CaptureTimings::default(),
        })
    }

    /// Write into `output_dir` instead; relative paths are taken from the
    /// project root. Shots are reloaded against the new directory.
    pub fn with_output_dir(mut self, output_dir: &Path) -> CaptureResult<Self> {
        self.output_dir = self.project_root.join(output_dir);
        self.shots = self.load_shots()?;
        Ok(self)
    }

    /// Replace the shots with those of a manifest
    pub fn with_manifest(mut self, manifest: &Path) -> CaptureResult<Self> {
        self.manifest = Some(manifest.to_path_buf());
        self.shots = self.load_shots()?;
        Ok(self)
    }

    fn load_shots(&self) -> CaptureResult<Vec<ShotSpec>> {
        match &self.manifest {
            Some(manifest) => load_manifest(manifest, &self.project_root, &self.output_dir),
            None => builtin_shots(&self.project_root, &self.output_dir),
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
}
