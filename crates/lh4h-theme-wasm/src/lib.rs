//! WebAssembly theme toggle
//!
//! Runs the theme controller against the live document:
//! - the preference is stored in `localStorage`
//! - the applied theme is written to `data-theme` on `<html>`
//! - toggle controls are the elements carrying `data-set-theme`; the active
//!   one gets `aria-pressed="true"` and the `is-active` class
//!
//! Load the generated module early in `<head>` so the stored theme is applied
//! before first paint.

use std::cell::RefCell;
use std::rc::Rc;

use lh4h_theme::{
    StorageError, StorageResult, Theme, ThemeController, ThemeEnvironment, ThemeKeys,
    ToggleControl,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Storage, Window};

const THEME_ATTRIBUTE: &str = "data-theme";
const TOGGLE_ATTRIBUTE: &str = "data-set-theme";
const TOGGLE_SELECTOR: &str = "[data-set-theme]";
const ACTIVE_CLASS: &str = "is-active";

thread_local! {
    static CONTROLLER: RefCell<Option<Rc<ThemeController<WebEnvironment>>>> =
        const { RefCell::new(None) };
}

/// Map a thrown storage exception onto [`StorageError`]
fn storage_error(err: &JsValue) -> StorageError {
    let name = js_sys::Reflect::get(err, &JsValue::from_str("name"))
        .ok()
        .and_then(|v| v.as_string());
    match name.as_deref() {
        Some("QuotaExceededError") => StorageError::QuotaExceeded,
        Some(other) => StorageError::Denied(other.to_string()),
        None => StorageError::Denied(
            err.as_string()
                .unwrap_or_else(|| "unknown storage error".to_string()),
        ),
    }
}

/// [`ThemeEnvironment`] backed by `window` and `document`
pub struct WebEnvironment {
    window: Window,
    document: Document,
}

impl WebEnvironment {
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    // Accessing `localStorage` itself throws when storage is disabled.
    fn storage(&self) -> StorageResult<Storage> {
        self.window
            .local_storage()
            .map_err(|e| storage_error(&e))?
            .ok_or(StorageError::Unavailable)
    }

    fn media_matches(&self, query: &str) -> bool {
        matches!(self.window.match_media(query), Ok(Some(list)) if list.matches())
    }
}

impl ThemeEnvironment for WebEnvironment {
    type Control = WebControl;

    fn read_preference(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage()?.get_item(key).map_err(|e| storage_error(&e))
    }

    fn write_preference(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| storage_error(&e))
    }

    fn query_color_scheme(&self) -> Option<Theme> {
        if self.media_matches("(prefers-color-scheme: light)") {
            Some(Theme::Light)
        } else if self.media_matches("(prefers-color-scheme: dark)") {
            Some(Theme::Dark)
        } else {
            None
        }
    }

    fn apply_attribute(&self, theme: Theme) {
        if let Some(root) = self.document.document_element() {
            let _ = root.set_attribute(THEME_ATTRIBUTE, theme.as_str());
        }
    }

    fn current_attribute(&self) -> Option<String> {
        self.document
            .document_element()?
            .get_attribute(THEME_ATTRIBUTE)
    }

    fn enumerate_toggle_controls(&self) -> Vec<WebControl> {
        let Ok(nodes) = self.document.query_selector_all(TOGGLE_SELECTOR) else {
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(WebControl)
            .collect()
    }

    fn on_content_ready(&self, handler: Box<dyn FnOnce()>) {
        if self.document.ready_state() != "loading" {
            handler();
            return;
        }
        let callback = Closure::once_into_js(move || handler());
        let _ = self
            .document
            .add_event_listener_with_callback("DOMContentLoaded", callback.unchecked_ref());
    }
}

/// A toggle element in the live document
#[derive(Clone)]
pub struct WebControl(Element);

impl ToggleControl for WebControl {
    fn requested_theme(&self) -> Option<String> {
        self.0.get_attribute(TOGGLE_ATTRIBUTE)
    }

    fn set_active(&self, active: bool) {
        let _ = self
            .0
            .set_attribute("aria-pressed", if active { "true" } else { "false" });
        let _ = self.0.class_list().toggle_with_force(ACTIVE_CLASS, active);
    }

    fn on_activate(&self, handler: Box<dyn Fn()>) {
        let callback = Closure::<dyn FnMut()>::new(move || handler());
        let _ = self
            .0
            .add_event_listener_with_callback("click", callback.as_ref().unchecked_ref());
        // Listeners live as long as the page.
        callback.forget();
    }
}

/// Module entry point: apply the stored theme and wire the toggles
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let env = WebEnvironment::from_window()
        .ok_or_else(|| JsValue::from_str("theme toggle requires a window with a document"))?;
    let controller = Rc::new(ThemeController::new(env, ThemeKeys::default()));
    controller.initialize();
    CONTROLLER.with(|slot| *slot.borrow_mut() = Some(controller));
    Ok(())
}

/// Switch theme from script. Returns `false` for unrecognized values.
#[wasm_bindgen(js_name = setTheme)]
pub fn set_theme(value: &str) -> bool {
    CONTROLLER.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|controller| controller.activate(value))
            .is_some()
    })
}

/// The theme currently applied, or `None` before [`start`] ran
#[wasm_bindgen(js_name = currentTheme)]
pub fn current_theme() -> Option<String> {
    CONTROLLER.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|controller| controller.current().as_str().to_string())
    })
}
