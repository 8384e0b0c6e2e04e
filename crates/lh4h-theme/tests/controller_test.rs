//! Controller behaviour against the in-memory environment

use std::rc::Rc;
use lh4h_theme::{MemoryEnvironment, Theme, ThemeController, ThemeKeys};

fn setup(env: MemoryEnvironment) -> Rc<ThemeController<MemoryEnvironment>> {
    Rc::new(ThemeController::new(env, ThemeKeys::default()))
}

/// A preference recorded in one session is picked up by the next
#[test]
fn test_recorded_preference_survives_new_session() {
    let first = setup(MemoryEnvironment::new());
    first.record_preference(Theme::Light);

    let storage = first.environment().storage_snapshot();
    let second = setup(MemoryEnvironment::new().with_storage(storage));
    assert_eq!(second.resolve_initial_preference(), Theme::Light);
}

/// A value written only under the legacy key is migrated on the next toggle
#[test]
fn test_legacy_value_is_mirrored_after_toggle() {
    let keys = ThemeKeys::default();
    let env = MemoryEnvironment::new().with_stored(&keys.legacy, "light");
    let ctrl = setup(env);

    assert_eq!(ctrl.initialize(), Theme::Light);
    ctrl.activate("dark");

    assert_eq!(ctrl.environment().stored(&keys.current).as_deref(), Some("dark"));
    assert_eq!(ctrl.environment().stored(&keys.legacy).as_deref(), Some("dark"));
}

#[test]
fn test_apply_is_idempotent() {
    let ctrl = setup(MemoryEnvironment::new());
    let dark = ctrl.environment().add_control(Some("dark"));
    let light = ctrl.environment().add_control(Some("light"));

    ctrl.apply_preference(Theme::Light);
    let first = (ctrl.environment().attribute(), dark.pressed(), light.pressed());
    ctrl.apply_preference(Theme::Light);
    let second = (ctrl.environment().attribute(), dark.pressed(), light.pressed());

    assert_eq!(first, second);
    assert_eq!(second, (Some("light".to_string()), Some(false), Some(true)));
}

#[test]
fn test_controls_with_unknown_or_missing_theme_are_inactive() {
    let ctrl = setup(MemoryEnvironment::new());
    let odd = ctrl.environment().add_control(Some("sepia"));
    let bare = ctrl.environment().add_control(None);

    ctrl.apply_preference(Theme::Dark);
    assert_eq!(odd.pressed(), Some(false));
    assert_eq!(bare.pressed(), Some(false));
}

/// The initial theme is applied before the content is ready
#[test]
fn test_initialize_applies_before_content_ready() {
    let env = MemoryEnvironment::new().with_color_scheme(Some(Theme::Light));
    let ctrl = setup(env);

    assert_eq!(ctrl.initialize(), Theme::Light);
    assert!(!ctrl.environment().is_content_ready());
    assert_eq!(ctrl.environment().attribute().as_deref(), Some("light"));
}

#[test]
fn test_controls_wired_on_content_ready() {
    let ctrl = setup(MemoryEnvironment::new());
    let light = ctrl.environment().add_control(Some("light"));
    let dark = ctrl.environment().add_control(Some("dark"));

    ctrl.initialize();
    assert_eq!(light.handler_count(), 0);

    ctrl.environment().fire_content_ready();
    assert_eq!(light.handler_count(), 1);
    assert_eq!(dark.pressed(), Some(true));

    light.click();
    assert_eq!(ctrl.current(), Theme::Light);
    assert_eq!(ctrl.environment().attribute().as_deref(), Some("light"));
    assert_eq!(light.pressed(), Some(true));
    assert_eq!(dark.pressed(), Some(false));
    assert_eq!(
        ctrl.environment()
            .stored(&ThemeKeys::default().current)
            .as_deref(),
        Some("light")
    );
}

/// Clicking a control with an unrecognized theme changes nothing
#[test]
fn test_click_on_unknown_theme_is_noop() {
    let keys = ThemeKeys::default();
    let env = MemoryEnvironment::new().with_stored(&keys.current, "light");
    let ctrl = setup(env);
    let bogus = ctrl.environment().add_control(Some("neon"));
    let light = ctrl.environment().add_control(Some("light"));

    ctrl.initialize();
    ctrl.environment().fire_content_ready();
    let before = ctrl.environment().storage_snapshot();

    bogus.click();

    assert_eq!(ctrl.current(), Theme::Light);
    assert_eq!(ctrl.environment().attribute().as_deref(), Some("light"));
    assert_eq!(light.pressed(), Some(true));
    assert_eq!(ctrl.environment().storage_snapshot(), before);
}

/// An attribute set on the root before content ready is honoured
#[test]
fn test_content_ready_reapplies_document_attribute() {
    let ctrl = setup(MemoryEnvironment::new());
    let light = ctrl.environment().add_control(Some("light"));

    ctrl.initialize();
    ctrl.environment().set_attribute(Some("light"));
    ctrl.environment().fire_content_ready();

    assert_eq!(ctrl.current(), Theme::Light);
    assert_eq!(light.pressed(), Some(true));
}

#[test]
fn test_content_ready_ignores_invalid_document_attribute() {
    let ctrl = setup(MemoryEnvironment::new());

    ctrl.initialize();
    ctrl.environment().set_attribute(Some("chartreuse"));
    ctrl.environment().fire_content_ready();

    assert_eq!(ctrl.current(), Theme::Dark);
    assert_eq!(ctrl.environment().attribute().as_deref(), Some("dark"));
}

/// Hosts that are already ready run the wiring immediately
#[test]
fn test_initialize_when_content_already_ready() {
    let env = MemoryEnvironment::new();
    env.fire_content_ready();
    let ctrl = setup(env);
    let light = ctrl.environment().add_control(Some("light"));

    ctrl.initialize();
    assert_eq!(light.handler_count(), 1);

    light.click();
    assert_eq!(ctrl.current(), Theme::Light);
}

/// Toggling still works for the session when storage is disabled
#[test]
fn test_toggle_works_without_storage() {
    let ctrl = setup(MemoryEnvironment::new().with_failing_storage());
    let light = ctrl.environment().add_control(Some("light"));

    assert_eq!(ctrl.initialize(), Theme::Dark);
    ctrl.environment().fire_content_ready();
    light.click();

    assert_eq!(ctrl.current(), Theme::Light);
    assert!(ctrl.environment().storage_snapshot().is_empty());
}
