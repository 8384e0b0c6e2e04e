//! Capture Error Types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;
pub type EngineResult<T> = Result<T, EngineError>;

/// Named step of a single shot, reported with fatal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Context,
    Navigate,
    AwaitSelector,
    AwaitFonts,
    Settle,
    InjectStyle,
    ScrollToOrigin,
    Capture,
    Write,
    Dispose,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Context => "context",
            Stage::Navigate => "navigate",
            Stage::AwaitSelector => "await-selector",
            Stage::AwaitFonts => "await-fonts",
            Stage::Settle => "settle",
            Stage::InjectStyle => "inject-style",
            Stage::ScrollToOrigin => "scroll-to-origin",
            Stage::Capture => "capture",
            Stage::Write => "write",
            Stage::Dispose => "dispose",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a browser engine implementation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Chrome browser error: {0}")]
    Chrome(String),

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),

    #[error("Engine task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch browser: {0}")]
    Launch(#[source] EngineError),

    #[error("Failed to close browser: {0}")]
    Shutdown(#[source] EngineError),

    #[error("Shot '{shot}' failed at {stage}: {source}")]
    Shot {
        shot: String,
        stage: Stage,
        #[source]
        source: EngineError,
    },

    #[error("Shot '{shot}' could not write {}: {source}", path.display())]
    Write {
        shot: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid shot '{shot}': {reason}")]
    InvalidShot { shot: String, reason: String },

    #[error("Invalid shot manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },
}

impl CaptureError {
    /// The stage a shot failed at, if this error came from one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CaptureError::Shot { stage, .. } => Some(*stage),
            CaptureError::Write { .. } => Some(Stage::Write),
            _ => None,
        }
    }

    pub(crate) fn shot(shot: &str, stage: Stage, source: EngineError) -> Self {
        CaptureError::Shot {
            shot: shot.to_string(),
            stage,
            source,
        }
    }
}
