//! Host half of the story selection protocol.
//!
//! [`SelectStoryCommand`] is the `selectStory` command bound to one browser
//! session; [`open_story`] is the test-runner flavor that also applies
//! storybook globals and records report metadata for a catalog entry.

pub mod errors;
pub mod fallback;
pub mod invalidation;
pub mod invoke;
pub mod open;
pub mod select;

pub use errors::{PlayFunctionError, StoryCommandError, StoryCommandResult};
pub use invalidation::SessionInvalidation;
pub use open::{open_story, OpenStoryOptions};
pub use select::{preview_iframe_url, SelectStoryCommand};

/// Session metadata key holding the preview url after a selection.
pub const META_URL: &str = "url";
/// Session metadata key holding the module the story came from.
pub const META_STORY_FILE: &str = "storyFile";
