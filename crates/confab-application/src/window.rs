//! Boundary to the windowing collaborator.
//!
//! The core does not create, own, or destroy the assistant window; the
//! embedding shell hands it in behind this trait. The only behavior the core
//! contributes is the visibility toggle the global hotkey binds to.

/// Opaque handle to the assistant window.
pub trait WindowHandle {
    /// Whether the window is currently visible.
    fn is_visible(&self) -> bool;
    /// Shows the window.
    fn show(&self);
    /// Hides the window.
    fn hide(&self);
    /// Gives the window input focus.
    fn focus(&self);
}

/// Toggle callback exposed to the hotkey collaborator.
///
/// Hides a visible window; shows and focuses a hidden one.
pub fn toggle_visibility(window: &dyn WindowHandle) {
    if window.is_visible() {
        window.hide();
    } else {
        window.show();
        window.focus();
    }
}
