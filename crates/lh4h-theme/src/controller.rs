//! Theme Controller
//!
//! Resolution order for the initial theme: current key, legacy key, system
//! color scheme, then dark. Storage failures are never surfaced; they are
//! logged and read as "nothing stored".

use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

use crate::environment::{ThemeEnvironment, ToggleControl};
use crate::theme::{Theme, ThemeKeys};

pub struct ThemeController<E: ThemeEnvironment> {
    env: E,
    keys: ThemeKeys,
    current: Cell<Theme>,
}

impl<E: ThemeEnvironment> ThemeController<E> {
    pub fn new(env: E, keys: ThemeKeys) -> Self {
        Self {
            env,
            keys,
            current: Cell::new(Theme::default()),
        }
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    /// The theme most recently applied by this controller
    pub fn current(&self) -> Theme {
        self.current.get()
    }

    fn read_stored(&self, key: &str) -> Option<Theme> {
        match self.env.read_preference(key) {
            Ok(Some(value)) => {
                let theme = Theme::parse(&value);
                if theme.is_none() {
                    debug!("Ignoring unrecognized theme {:?} stored under {}", value, key);
                }
                theme
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Failed to read theme preference {}: {}", key, e);
                None
            }
        }
    }

    pub fn resolve_initial_preference(&self) -> Theme {
        self.read_stored(&self.keys.current)
            .or_else(|| self.read_stored(&self.keys.legacy))
            .or_else(|| self.env.query_color_scheme())
            .unwrap_or_default()
    }

    /// Set the document attribute and mark exactly the controls requesting
    /// `theme` as active.
    pub fn apply_preference(&self, theme: Theme) {
        self.env.apply_attribute(theme);
        for control in self.env.enumerate_toggle_controls() {
            let active = control.requested_theme().as_deref() == Some(theme.as_str());
            control.set_active(active);
        }
        self.current.set(theme);
    }

    /// Write `theme` under both keys. A failed write does not stop the other.
    pub fn record_preference(&self, theme: Theme) {
        for key in [&self.keys.current, &self.keys.legacy] {
            if let Err(e) = self.env.write_preference(key, theme.as_str()) {
                debug!("Failed to persist theme preference {}: {}", key, e);
            }
        }
    }

    /// Handle a toggle request. Unrecognized values change nothing.
    pub fn activate(&self, requested: &str) -> Option<Theme> {
        let Some(theme) = Theme::parse(requested) else {
            debug!("Ignoring toggle for unrecognized theme {:?}", requested);
            return None;
        };
        self.apply_preference(theme);
        self.record_preference(theme);
        Some(theme)
    }
}

impl<E: ThemeEnvironment + 'static> ThemeController<E> {
    /// Apply the resolved theme right away, then wire the toggle controls once
    /// the document content is ready. Returns the initial theme.
    pub fn initialize(self: &Rc<Self>) -> Theme {
        let initial = self.resolve_initial_preference();
        self.apply_preference(initial);

        let controller = Rc::clone(self);
        self.env
            .on_content_ready(Box::new(move || controller.wire_controls(initial)));
        initial
    }

    fn wire_controls(self: &Rc<Self>, initial: Theme) {
        let controls = self.env.enumerate_toggle_controls();
        debug!("Wiring {} theme toggle controls", controls.len());

        for control in controls {
            let controller = Rc::clone(self);
            let target = control.clone();
            control.on_activate(Box::new(move || match target.requested_theme() {
                Some(requested) => {
                    controller.activate(&requested);
                }
                None => debug!("Toggle control has no requested theme"),
            }));
        }

        // Controls rendered after the early apply still need their state.
        let theme = self
            .env
            .current_attribute()
            .as_deref()
            .and_then(Theme::parse)
            .unwrap_or(initial);
        self.apply_preference(theme);
    }
}
