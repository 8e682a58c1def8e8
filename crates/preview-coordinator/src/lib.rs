//! Page side of the story selection protocol.
//!
//! [`window`] models the state a preview page exposes to injected scripts,
//! [`coordinator`] is the in-page state machine that selects a story and
//! resolves one [`harness_core_types::StoryLoadResult`], and [`runtime`] plus
//! [`browser`] emulate a storybook preview behind an
//! [`wd_bridge::AutomationSession`] so host commands can run without a real
//! browser.

pub mod browser;
pub mod coordinator;
pub mod runtime;
pub mod window;

pub use browser::{BrowserCall, BrowserOptions, EmulatedBrowser};
pub use coordinator::{install, open_story, DoneCallback};
pub use runtime::{PreviewConfig, PreviewRuntime, StoryBehavior};
pub use window::{Binding, PreviewWindow};
