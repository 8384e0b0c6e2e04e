//! Integration tests for lh4h-capture

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lh4h_capture::{
    BrowserEngine, BrowserPage, BrowserSession, CaptureConfig, CaptureError, CaptureOrchestrator,
    CaptureTimings, ChromeEngine, ContextOptions, EngineError, LaunchSettings, ScreenshotTarget,
    Stage, WaitUntil,
};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Mock engine that serves a fixed JPEG for pages whose file exists
struct MockEngine {
    closed: Arc<tokio::sync::Mutex<bool>>,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            closed: Arc::new(tokio::sync::Mutex::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl BrowserEngine for MockEngine {
    async fn launch(&self, _settings: &LaunchSettings) -> Result<Box<dyn BrowserSession>, EngineError> {
        Ok(Box::new(MockSession {
            closed: Arc::clone(&self.closed),
        }))
    }

    fn engine_name(&self) -> &'static str {
        "mock-engine"
    }
}

struct MockSession {
    closed: Arc<tokio::sync::Mutex<bool>>,
}

#[async_trait::async_trait]
impl BrowserSession for MockSession {
    async fn new_context(
        &self,
        _options: &ContextOptions,
    ) -> Result<Box<dyn BrowserPage>, EngineError> {
        Ok(Box::new(MockPage {
            loaded: tokio::sync::Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        *self.closed.lock().await = true;
        Ok(())
    }
}

struct MockPage {
    loaded: tokio::sync::Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl BrowserPage for MockPage {
    async fn navigate(
        &self,
        url: &str,
        _wait_until: WaitUntil,
        _timeout: Duration,
    ) -> Result<(), EngineError> {
        let url = url::Url::parse(url).map_err(|e| EngineError::Chrome(e.to_string()))?;
        let path = url
            .to_file_path()
            .map_err(|_| EngineError::Chrome("not a file url".to_string()))?;
        let html = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Chrome(format!("{}: {}", path.display(), e)))?;
        *self.loaded.lock().await = Some(html);
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<(), EngineError> {
        let class = selector.trim_start_matches('.');
        let loaded = self.loaded.lock().await;
        match loaded.as_deref() {
            Some(html) if html.contains(&format!("class=\"{}\"", class)) => Ok(()),
            _ => Err(EngineError::Timeout {
                what: format!("selector {}", selector),
                after: Duration::from_secs(30),
            }),
        }
    }

    async fn evaluate(&self, _script: &str, _await_promise: bool) -> Result<serde_json::Value, EngineError> {
        Ok(serde_json::Value::Bool(true))
    }

    async fn add_style(&self, _css: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn scroll_to_origin(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn screenshot(
        &self,
        _target: &ScreenshotTarget,
        _quality: u8,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x00, 0xFF, 0xD9])
    }

    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

fn write_site(root: &Path, poster_class: &str) {
    std::fs::write(
        root.join("index.html"),
        "<html><body><section class=\"hero\"><h1>lh4h</h1></section></body></html>",
    )
    .unwrap();
    std::fs::write(
        root.join("poster.html"),
        format!(
            "<html><body><div class=\"{}\" style=\"width:1200px;height:1600px\"></div></body></html>",
            poster_class
        ),
    )
    .unwrap();
}

fn fast_timings() -> CaptureTimings {
    CaptureTimings {
        navigation: Duration::from_secs(15),
        fonts: Duration::from_millis(50),
        settle: Duration::from_millis(1),
    }
}

/// Three deliverables land in `deliverables/` under the project root
#[tokio::test]
async fn test_project_capture_writes_deliverables() {
    let site = tempfile::tempdir().unwrap();
    write_site(site.path(), "poster");

    let config = CaptureConfig::for_project(site.path())
        .unwrap()
        .with_timings(fast_timings());
    let engine = Arc::new(MockEngine::new());
    let orchestrator = CaptureOrchestrator::from_config(engine.clone(), &config);

    let report = orchestrator.run(&config.shots).await.unwrap();

    let deliverables = site.path().join("deliverables");
    for name in ["index_desktop.jpg", "index_mobile.jpg", "poster.jpg"] {
        let bytes = std::fs::read(deliverables.join(name)).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(bytes[..3], JPEG_MAGIC);
    }
    assert_eq!(report.paths().len(), 3);
    assert!(*engine.closed.lock().await);
}

/// A page without its stability anchor aborts the run, and the browser
/// is still closed
#[tokio::test]
async fn test_missing_anchor_aborts_run() {
    let site = tempfile::tempdir().unwrap();
    write_site(site.path(), "not-the-poster");

    let config = CaptureConfig::for_project(site.path())
        .unwrap()
        .with_timings(fast_timings());
    let engine = Arc::new(MockEngine::new());
    let orchestrator = CaptureOrchestrator::from_config(engine.clone(), &config);

    let err = orchestrator.run(&config.shots).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::AwaitSelector));
    assert!(*engine.closed.lock().await);
    assert!(site.path().join("deliverables/index_desktop.jpg").exists());
    assert!(!site.path().join("deliverables/poster.jpg").exists());
}

/// A missing page fails both navigation attempts
#[tokio::test]
async fn test_missing_page_is_fatal() {
    let site = tempfile::tempdir().unwrap();

    let config = CaptureConfig::for_project(site.path())
        .unwrap()
        .with_timings(fast_timings());
    let engine = Arc::new(MockEngine::new());
    let orchestrator = CaptureOrchestrator::from_config(engine.clone(), &config);

    match orchestrator.run(&config.shots).await.unwrap_err() {
        CaptureError::Shot { shot, stage, .. } => {
            assert_eq!(shot, "index-desktop");
            assert_eq!(stage, Stage::Navigate);
        }
        e => panic!("Expected shot error, got: {:?}", e),
    }
    assert!(*engine.closed.lock().await);
}

/// Page content well past the first screen; margins removed so the
/// document height is exactly the sum of its blocks
fn write_tall_site(root: &Path) {
    std::fs::write(
        root.join("index.html"),
        format!(
            "<html><head><style>body {{ margin: 0 }}</style></head><body>\
             <section class=\"hero\" style=\"height:400px;background:#123\"></section>\
             <div style=\"height:{}px;background:linear-gradient(#fff,#000)\"></div>\
             </body></html>",
            TALL_FILLER
        ),
    )
    .unwrap();
    std::fs::write(
        root.join("poster.html"),
        "<html><body><div class=\"poster\" style=\"width:1200px;height:1600px;background:#c33\"></div></body></html>",
    )
    .unwrap();
}

const TALL_FILLER: u32 = 3000;
const TALL_DOCUMENT: u32 = 400 + TALL_FILLER;

/// Full run against a real headless Chrome
#[tokio::test]
#[ignore = "requires a local Chrome/Chromium"]
async fn test_chrome_capture_end_to_end() {
    let site = tempfile::tempdir().unwrap();
    write_tall_site(site.path());

    let config = CaptureConfig::for_project(site.path())
        .unwrap()
        .with_launch(LaunchSettings {
            sandbox: false,
            ..LaunchSettings::default()
        });
    let orchestrator = CaptureOrchestrator::from_config(Arc::new(ChromeEngine::new()), &config);

    let report = orchestrator.run(&config.shots).await.unwrap();
    assert_eq!(report.shots.len(), 3);

    let mut sizes = Vec::new();
    for written in &report.shots {
        let bytes = std::fs::read(&written.path).unwrap();
        assert_eq!(bytes[..3], JPEG_MAGIC, "Not a valid JPEG file");
        let image = image::load_from_memory(&bytes).unwrap();
        println!(
            "{} -> {} ({}x{})",
            written.name,
            written.path.display(),
            image.width(),
            image.height()
        );
        sizes.push((image.width(), image.height()));
    }

    // Full-page shots include everything below the fold.
    let (width, height) = sizes[0];
    assert_eq!(width, 1440);
    assert!(height >= TALL_DOCUMENT, "desktop height {} too small", height);

    let (width, height) = sizes[1];
    assert_eq!(width, 430 * 3);
    assert!(height >= TALL_DOCUMENT * 3, "mobile height {} too small", height);

    // 1200x1600 CSS pixels at 3.125 device pixels each
    assert_eq!(sizes[2], (3750, 5000));
}
