//! Application wiring for the Confab orchestration core.
//!
//! Exposes the assistant service (the `ask`/`transcribe` operations the
//! embedding shell calls) and the narrow boundaries to the windowing and
//! hotkey collaborators.

pub mod service;
pub mod window;

pub use service::{AssistantService, ERROR_MARKER};
pub use window::{WindowHandle, toggle_visibility};
