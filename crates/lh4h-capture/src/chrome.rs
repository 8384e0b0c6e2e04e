//! Headless Chrome Engine
//!
//! [`BrowserEngine`] on top of `headless_chrome`. The crate is synchronous, so
//! every call is moved onto the blocking pool and awaited. Calls on one page
//! run strictly one after another, including calls whose caller gave up.

use async_trait::async_trait;
use base64::Engine;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Network, Page, Target};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::LaunchSettings;
use crate::engine::{
    BrowserEngine, BrowserPage, BrowserSession, ContextOptions, ScreenshotTarget, WaitUntil,
};
use crate::error::{EngineError, EngineResult};

/// Network counts as idle once no request was in flight for this long
const NETWORK_QUIET: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_TOUCH_POINTS: u32 = 5;

const FULL_PAGE_RECT: &str = "(() => { \
    const root = document.documentElement; \
    const body = document.body || root; \
    return { x: 0, y: 0, \
        width: Math.max(root.scrollWidth, body.scrollWidth, root.clientWidth), \
        height: Math.max(root.scrollHeight, body.scrollHeight, root.clientHeight) }; \
})()";

fn element_rect_script(selector: &str) -> EngineResult<String> {
    let selector = serde_json::to_string(selector)
        .map_err(|e| EngineError::Script(format!("Failed to encode selector: {}", e)))?;
    Ok(format!(
        "(() => {{ \
            const el = document.querySelector({selector}); \
            if (!el) return null; \
            const r = el.getBoundingClientRect(); \
            return {{ x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height }}; \
        }})()"
    ))
}

fn add_style_script(css: &str) -> EngineResult<String> {
    let css = serde_json::to_string(css)
        .map_err(|e| EngineError::Script(format!("Failed to encode style: {}", e)))?;
    Ok(format!(
        "(() => {{ \
            const style = document.createElement('style'); \
            style.textContent = {css}; \
            (document.head || document.documentElement).appendChild(style); \
            return true; \
        }})()"
    ))
}

#[derive(Debug, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn chrome_error<E: std::fmt::Display>(action: &'static str) -> impl FnOnce(E) -> EngineError {
    move |e| {
        error!("Failed to {}: {:#}", action, e);
        EngineError::Chrome(format!("Failed to {}: {:#}", action, e))
    }
}

/// Build a CDP command from its wire form; omitted optional fields stay unset
fn cdp_command<T: DeserializeOwned>(value: serde_json::Value) -> EngineResult<T> {
    serde_json::from_value(value)
        .map_err(|e| EngineError::Chrome(format!("Invalid CDP command: {}", e)))
}

async fn blocking<T, F>(task: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        error!("Browser task panicked: {}", e);
        EngineError::Task(format!("Task execution failed: {}", e))
    })?
}

/// Runs blocking work against a shared handle, one call at a time.
///
/// The gate guard moves into the blocking task, so a call whose caller timed
/// out keeps the handle until its work has ended.
struct Exclusive<T> {
    inner: Arc<T>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<T: Send + Sync + 'static> Exclusive<T> {
    fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    async fn run<R, F>(&self, task: F) -> EngineResult<R>
    where
        F: FnOnce(&T) -> EngineResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let guard = Arc::clone(&self.gate).lock_owned().await;
        let inner = Arc::clone(&self.inner);
        blocking(move || {
            let _guard = guard;
            task(&inner)
        })
        .await
    }
}

/// Time left before `deadline`, or a timeout error once it has passed
fn remaining(deadline: Instant, what: &str, limit: Duration) -> EngineResult<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(EngineError::Timeout {
            what: what.to_string(),
            after: limit,
        });
    }
    Ok(left)
}

/// Evaluate `script` and bring its result back as JSON.
///
/// The value is serialized in the page so objects survive the trip.
fn evaluate_json(tab: &Tab, script: &str, await_promise: bool) -> EngineResult<serde_json::Value> {
    let wrapped = if await_promise {
        format!("Promise.resolve({script}).then((v) => JSON.stringify(v === undefined ? null : v))")
    } else {
        format!("JSON.stringify((() => {{ const v = ({script}); return v === undefined ? null : v; }})())")
    };
    let result = tab
        .evaluate(&wrapped, await_promise)
        .map_err(|e| EngineError::Script(format!("{:#}", e)))?;
    match result.value {
        Some(serde_json::Value::String(json)) => serde_json::from_str(&json)
            .map_err(|e| EngineError::Script(format!("Unreadable script result: {}", e))),
        Some(other) => Ok(other),
        None => Ok(serde_json::Value::Null),
    }
}

/// Requests the page has started and not yet finished or failed
#[derive(Debug)]
struct InflightRequests {
    pending: HashSet<String>,
    last_change: Instant,
}

impl InflightRequests {
    fn new(now: Instant) -> Self {
        Self {
            pending: HashSet::new(),
            last_change: now,
        }
    }

    fn started(&mut self, request_id: &str, now: Instant) {
        // Redirects reuse the id; they still count as activity.
        self.pending.insert(request_id.to_string());
        self.last_change = now;
    }

    fn settled(&mut self, request_id: &str, now: Instant) {
        if self.pending.remove(request_id) {
            self.last_change = now;
        }
    }

    fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.pending.is_empty() && now.duration_since(self.last_change) >= NETWORK_QUIET
    }
}

fn navigate_and_wait(tab: &Tab, url: &str, deadline: Instant, limit: Duration) -> EngineResult<()> {
    tab.set_default_timeout(remaining(deadline, "navigation", limit)?);
    tab.navigate_to(url).map_err(chrome_error("navigate"))?;
    tab.set_default_timeout(remaining(deadline, "navigation", limit)?);
    tab.wait_until_navigated()
        .map_err(chrome_error("wait for navigation"))?;
    Ok(())
}

fn wait_for_quiet_network(
    requests: &Mutex<InflightRequests>,
    deadline: Instant,
    limit: Duration,
) -> EngineResult<()> {
    loop {
        let now = Instant::now();
        let (idle, in_flight) = {
            let requests = requests
                .lock()
                .map_err(|_| EngineError::Task("request tracker poisoned".to_string()))?;
            (requests.is_idle(now), requests.in_flight())
        };
        if idle {
            return Ok(());
        }
        if now >= deadline {
            debug!("Network still busy at the deadline ({} in flight)", in_flight);
            return Err(EngineError::Timeout {
                what: "network idle".to_string(),
                after: limit,
            });
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Navigate, then wait until no request has been in flight for
/// [`NETWORK_QUIET`]. Requests are tracked from CDP network events.
fn navigate_until_idle(tab: &Tab, url: &str, deadline: Instant, limit: Duration) -> EngineResult<()> {
    let enable: Network::Enable = cdp_command(serde_json::json!({}))?;
    tab.call_method(enable)
        .map_err(chrome_error("enable network events"))?;

    let requests = Arc::new(Mutex::new(InflightRequests::new(Instant::now())));
    let tracked = Arc::clone(&requests);
    let listener = tab
        .add_event_listener(Arc::new(move |event: &Event| {
            let Ok(mut requests) = tracked.lock() else {
                return;
            };
            let now = Instant::now();
            match event {
                Event::NetworkRequestWillBeSent(e) => requests.started(&e.params.request_id, now),
                Event::NetworkLoadingFinished(e) => requests.settled(&e.params.request_id, now),
                Event::NetworkLoadingFailed(e) => requests.settled(&e.params.request_id, now),
                _ => {}
            }
        }))
        .map_err(chrome_error("listen for network events"))?;

    let outcome = navigate_and_wait(tab, url, deadline, limit)
        .and_then(|()| wait_for_quiet_network(&requests, deadline, limit));

    if let Err(e) = tab.remove_event_listener(&listener) {
        debug!("Failed to remove network listener: {:#}", e);
    }
    outcome
}

fn emulate(tab: &Tab, options: &ContextOptions) -> EngineResult<()> {
    let metrics: Emulation::SetDeviceMetricsOverride = cdp_command(serde_json::json!({
        "width": options.viewport.width,
        "height": options.viewport.height,
        "deviceScaleFactor": options.device_scale_factor,
        "mobile": options.is_mobile,
    }))?;
    tab.call_method(metrics)
        .map_err(chrome_error("set device metrics"))?;

    if options.has_touch {
        let touch: Emulation::SetTouchEmulationEnabled = cdp_command(serde_json::json!({
            "enabled": true,
            "maxTouchPoints": MAX_TOUCH_POINTS,
        }))?;
        tab.call_method(touch)
            .map_err(chrome_error("enable touch emulation"))?;
    }

    if options.reduced_motion {
        let media: Emulation::SetEmulatedMedia = cdp_command(serde_json::json!({
            "features": [{ "name": "prefers-reduced-motion", "value": "reduce" }],
        }))?;
        tab.call_method(media)
            .map_err(chrome_error("emulate reduced motion"))?;
    }
    Ok(())
}

/// JPEG capture of `rect`, painted past the viewport edge when the clip
/// extends beyond it
fn capture_command(rect: &Rect, quality: u8) -> EngineResult<Page::CaptureScreenshot> {
    cdp_command(serde_json::json!({
        "format": "jpeg",
        "quality": quality,
        "clip": {
            "x": rect.x,
            "y": rect.y,
            "width": rect.width,
            "height": rect.height,
            "scale": 1.0,
        },
        "fromSurface": true,
        "captureBeyondViewport": true,
    }))
}

fn capture_jpeg(tab: &Tab, rect: &Rect, quality: u8) -> EngineResult<Vec<u8>> {
    let shot = tab
        .call_method(capture_command(rect, quality)?)
        .map_err(|e| EngineError::Screenshot(format!("{:#}", e)))?;
    base64::engine::general_purpose::STANDARD
        .decode(shot.data)
        .map_err(|e| {
            error!("Failed to decode screenshot data: {}", e);
            EngineError::Screenshot(format!("Failed to decode screenshot data: {}", e))
        })
}

/// Browser engine using a local headless Chrome
pub struct ChromeEngine;

impl ChromeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn launch(&self, settings: &LaunchSettings) -> EngineResult<Box<dyn BrowserSession>> {
        Ok(Box::new(ChromeSession::start(settings.clone()).await?))
    }

    fn engine_name(&self) -> &'static str {
        "local-headless-chrome"
    }
}

struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    /// Tab in the default context; browser-level commands go through it
    control: Arc<Tab>,
    selector_timeout: Duration,
}

impl ChromeSession {
    async fn start(settings: LaunchSettings) -> EngineResult<Self> {
        let selector_timeout = settings.selector_timeout;

        let (browser, control) = blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(settings.headless)
                .sandbox(settings.sandbox)
                .path(settings.chrome_path.clone())
                .idle_browser_timeout(settings.idle_timeout)
                .build()
                .map_err(chrome_error("build launch options"))?;
            let browser = Browser::new(options).map_err(chrome_error("launch browser"))?;
            let control = browser.new_tab().map_err(chrome_error("open control tab"))?;
            info!("Browser launched (pid {:?})", browser.get_process_id());
            Ok((browser, control))
        })
        .await?;

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            control,
            selector_timeout,
        })
    }

    fn browser(&self) -> EngineResult<Browser> {
        self.browser
            .lock()
            .map_err(|_| EngineError::Task("browser handle poisoned".to_string()))?
            .clone()
            .ok_or_else(|| EngineError::Chrome("browser already closed".to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_context(&self, options: &ContextOptions) -> EngineResult<Box<dyn BrowserPage>> {
        let browser = self.browser()?;
        let control = Arc::clone(&self.control);
        let options = options.clone();

        let page = blocking(move || {
            let (tab, context_id) = {
                let context = browser
                    .new_context()
                    .map_err(chrome_error("create browser context"))?;
                let tab = context.new_tab().map_err(chrome_error("open tab"))?;
                (tab, context.get_id().to_string())
            };
            emulate(&tab, &options)?;
            debug!("Opened tab in context {}", context_id);
            Ok(TabHandle {
                control,
                tab,
                context_id,
            })
        })
        .await?;

        Ok(Box::new(ChromePage {
            page: Exclusive::new(page),
            selector_timeout: self.selector_timeout,
        }))
    }

    async fn close(&self) -> EngineResult<()> {
        let browser = self
            .browser
            .lock()
            .map_err(|_| EngineError::Task("browser handle poisoned".to_string()))?
            .take();
        if let Some(browser) = browser {
            // The process is killed once the last handle is dropped.
            blocking(move || {
                drop(browser);
                Ok(())
            })
            .await?;
            info!("Browser closed");
        }
        Ok(())
    }
}

struct TabHandle {
    control: Arc<Tab>,
    tab: Arc<Tab>,
    context_id: String,
}

struct ChromePage {
    page: Exclusive<TabHandle>,
    selector_timeout: Duration,
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn navigate(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> EngineResult<()> {
        let url = url.to_string();
        // The limit covers the whole attempt, starting before the tab is free.
        let deadline = Instant::now() + timeout;
        self.page
            .run(move |page| match wait_until {
                WaitUntil::NetworkIdle => navigate_until_idle(&page.tab, &url, deadline, timeout),
                WaitUntil::Load => navigate_and_wait(&page.tab, &url, deadline, timeout),
            })
            .await
    }

    async fn wait_for_selector(&self, selector: &str) -> EngineResult<()> {
        let selector = selector.to_string();
        let timeout = self.selector_timeout;
        self.page
            .run(move |page| {
                page.tab
                    .wait_for_element_with_custom_timeout(&selector, timeout)
                    .map(|_| ())
                    .map_err(|e| {
                        EngineError::Chrome(format!("Selector {} did not appear: {:#}", selector, e))
                    })
            })
            .await
    }

    async fn evaluate(
        &self,
        script: &str,
        await_promise: bool,
    ) -> EngineResult<serde_json::Value> {
        let script = script.to_string();
        self.page
            .run(move |page| evaluate_json(&page.tab, &script, await_promise))
            .await
    }

    async fn add_style(&self, css: &str) -> EngineResult<()> {
        let script = add_style_script(css)?;
        self.page
            .run(move |page| evaluate_json(&page.tab, &script, false).map(|_| ()))
            .await
    }

    async fn scroll_to_origin(&self) -> EngineResult<()> {
        self.page
            .run(|page| evaluate_json(&page.tab, "window.scrollTo(0, 0)", false).map(|_| ()))
            .await
    }

    async fn screenshot(&self, target: &ScreenshotTarget, quality: u8) -> EngineResult<Vec<u8>> {
        let rect_script = match target {
            ScreenshotTarget::FullPage => FULL_PAGE_RECT.to_string(),
            ScreenshotTarget::Element(selector) => element_rect_script(selector)?,
        };
        let target = target.clone();

        self.page
            .run(move |page| {
                let rect = evaluate_json(&page.tab, &rect_script, false)?;
                let rect: Rect = serde_json::from_value(rect).map_err(|_| {
                    EngineError::Screenshot(format!("nothing to capture for {:?}", target))
                })?;
                if rect.width <= 0.0 || rect.height <= 0.0 {
                    return Err(EngineError::Screenshot(format!(
                        "{:?} has an empty bounding box",
                        target
                    )));
                }
                capture_jpeg(&page.tab, &rect, quality)
            })
            .await
    }

    async fn close(&self) -> EngineResult<()> {
        self.page
            .run(|page| {
                page.tab.close(false).map_err(chrome_error("close tab"))?;
                page.control
                    .call_method(Target::DisposeBrowserContext {
                        browser_context_id: page.context_id.clone(),
                    })
                    .map_err(chrome_error("dispose browser context"))?;
                debug!("Disposed context {}", page.context_id);
                Ok(())
            })
            .await
    }
}
