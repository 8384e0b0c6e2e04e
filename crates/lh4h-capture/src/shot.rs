//! Shot specifications
//!
//! A [`ShotSpec`] fully describes one capture job. The three deliverables of
//! the site are provided by [`builtin_shots`]; a YAML or JSON manifest can
//! replace them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::engine::ScreenshotTarget;
use crate::error::{CaptureError, CaptureResult};

/// Query parameter telling the target page it is being rendered for capture
pub const RENDER_MARKER: (&str, &str) = ("render", "1");

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotSpec {
    pub name: String,
    /// Absolute URL, or in a manifest a path relative to the project root
    pub url: String,
    pub viewport: Viewport,
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: f64,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub has_touch: bool,
    /// Element whose presence signals the page is ready
    pub stability_selector: String,
    /// Capture this element instead of the full page
    #[serde(default)]
    pub element_selector: Option<String>,
    pub output: PathBuf,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_scale_factor() -> f64 {
    1.0
}

fn default_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl ShotSpec {
    pub fn is_full_page(&self) -> bool {
        self.element_selector.is_none()
    }

    pub fn capture_target(&self) -> ScreenshotTarget {
        match &self.element_selector {
            Some(selector) => ScreenshotTarget::Element(selector.clone()),
            None => ScreenshotTarget::FullPage,
        }
    }

    /// The navigation target with the render marker appended
    pub fn render_url(&self) -> CaptureResult<Url> {
        let mut url = Url::parse(&self.url).map_err(|e| self.invalid(format!("bad url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair(RENDER_MARKER.0, RENDER_MARKER.1);
        Ok(url)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name is empty"));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(self.invalid("viewport must be non-zero"));
        }
        if !(self.device_scale_factor.is_finite() && self.device_scale_factor > 0.0) {
            return Err(self.invalid("device scale factor must be positive"));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(self.invalid(format!("quality {} outside 1..=100", self.quality)));
        }
        if self.stability_selector.trim().is_empty() {
            return Err(self.invalid("stability selector is empty"));
        }
        if matches!(&self.element_selector, Some(sel) if sel.trim().is_empty()) {
            return Err(self.invalid("element selector is empty"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(self.invalid("output path is empty"));
        }
        self.render_url()?;
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> CaptureError {
        CaptureError::InvalidShot {
            shot: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// `file://` URL for a page inside the project root. A query or fragment
/// after the page path is carried over to the URL.
pub fn page_url(project_root: &Path, page: &str) -> CaptureResult<String> {
    let (path, suffix) = match page.find(['?', '#']) {
        Some(at) => page.split_at(at),
        None => (page, ""),
    };
    let invalid = |reason: String| CaptureError::InvalidShot {
        shot: page.to_string(),
        reason,
    };

    let file = project_root.join(path);
    let url = Url::from_file_path(&file)
        .map_err(|_| invalid(format!("{} is not an absolute path", file.display())))?;
    if suffix.is_empty() {
        return Ok(url.into());
    }
    url.join(suffix)
        .map(String::from)
        .map_err(|e| invalid(format!("bad query or fragment {:?}: {}", suffix, e)))
}

/// The desktop, mobile and poster deliverables
pub fn builtin_shots(project_root: &Path, output_dir: &Path) -> CaptureResult<Vec<ShotSpec>> {
    let index = page_url(project_root, "index.html")?;
    let poster = page_url(project_root, "poster.html")?;

    Ok(vec![
        ShotSpec {
            name: "index-desktop".to_string(),
            url: index.clone(),
            viewport: Viewport::new(1440, 900),
            device_scale_factor: 1.0,
            is_mobile: false,
            has_touch: false,
            stability_selector: ".hero".to_string(),
            element_selector: None,
            output: output_dir.join("index_desktop.jpg"),
            quality: 90,
        },
        ShotSpec {
            name: "index-mobile".to_string(),
            url: index,
            viewport: Viewport::new(430, 932),
            device_scale_factor: 3.0,
            is_mobile: true,
            has_touch: true,
            stability_selector: ".hero".to_string(),
            element_selector: None,
            output: output_dir.join("index_mobile.jpg"),
            quality: 90,
        },
        ShotSpec {
            name: "poster".to_string(),
            url: poster,
            viewport: Viewport::new(1200, 1600),
            device_scale_factor: 3.125,
            is_mobile: false,
            has_touch: false,
            stability_selector: ".poster".to_string(),
            element_selector: Some(".poster".to_string()),
            output: output_dir.join("poster.jpg"),
            quality: 95,
        },
    ])
}

#[derive(Debug, Deserialize)]
struct ShotManifest {
    shots: Vec<ShotSpec>,
}

/// Load shots from a YAML (`.yaml`/`.yml`) or JSON manifest.
///
/// Relative `url`s are pages under `project_root`; relative `output`s land in
/// `output_dir`.
pub fn load_manifest(
    path: &Path,
    project_root: &Path,
    output_dir: &Path,
) -> CaptureResult<Vec<ShotSpec>> {
    let manifest_error = |reason: String| CaptureError::Manifest {
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let manifest: ShotManifest = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|e| manifest_error(e.to_string()))?
    } else {
        serde_json::from_str(&raw).map_err(|e| manifest_error(e.to_string()))?
    };

    if manifest.shots.is_empty() {
        return Err(manifest_error("no shots defined".to_string()));
    }

    manifest
        .shots
        .into_iter()
        .map(|mut shot| {
            if Url::parse(&shot.url).is_err() {
                shot.url = page_url(project_root, &shot.url)?;
            }
            if shot.output.is_relative() {
                shot.output = output_dir.join(&shot.output);
            }
            shot.validate()?;
            Ok(shot)
        })
        .collect()
}
