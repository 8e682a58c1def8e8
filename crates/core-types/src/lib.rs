//! Shared primitives for the story selection protocol.
//!
//! Everything that crosses the boundary between the automation host and the
//! preview page is described here: story descriptors, selection requests, the
//! JSON result the page hands back, and the event/binding names both sides
//! agree on.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Story args and preview globals are free-form JSON maps.
pub type Args = Map<String, Value>;

/// Event names of the Storybook preview channel.
///
/// These mirror the preview runtime's own event contract; renaming any of them
/// breaks the handshake with real Storybook builds.
pub mod events {
    pub const SET_CURRENT_STORY: &str = "setCurrentStory";
    pub const STORY_RENDERED: &str = "storyRendered";
    pub const STORY_MISSING: &str = "storyMissing";
    pub const STORY_THREW_EXCEPTION: &str = "storyThrewException";
    pub const STORY_ERRORED: &str = "storyErrored";
    pub const PLAY_FUNCTION_THREW_EXCEPTION: &str = "playFunctionThrewException";
    pub const UPDATE_GLOBALS: &str = "updateGlobals";
    pub const GLOBALS_UPDATED: &str = "globalsUpdated";
    pub const SET_GLOBALS: &str = "setGlobals";
    pub const UPDATE_STORY_ARGS: &str = "updateStoryArgs";
    pub const STORY_ARGS_UPDATED: &str = "storyArgsUpdated";
}

/// Well-known page bindings shared by the host command and the page.
pub mod bindings {
    /// Entry point installed by the storybook addon decorator.
    pub const SELECT_STORY: &str = "__HERMIONE_SELECT_STORY__";
    /// Entry point installed by host-side injection.
    pub const OPEN_STORY: &str = "__HERMIONE_OPEN_STORY__";
    /// Completion flag polled on the fallback path.
    pub const IS_STORY_RENDERED: &str = "__HERMIONE_IS_STORY_RENDERED__";
    pub const ADDONS_CHANNEL: &str = "__STORYBOOK_ADDONS_CHANNEL__";
    pub const PREVIEW: &str = "__STORYBOOK_PREVIEW__";
    pub const INITIAL_GLOBALS: &str = "__TESTPLANE_STORYBOOK_INITIAL_GLOBALS__";
    pub const INSTRUMENTER_STATE: &str = "__STORYBOOK_ADDON_INTERACTIONS_INSTRUMENTER_STATE__";
}

/// Protocol constants coupled to the preview runtime's payloads.
pub mod protocol {
    /// Story id used to force a teardown before a remount. The preview answers
    /// it with a `storyMissing` carrying the same empty id.
    pub const REMOUNT_SENTINEL_STORY_ID: &str = "";
    /// Render exceptions starting with this marker are intentionally ignored.
    pub const IGNORED_EXCEPTION_PREFIX: &str = "ignoredException";
    /// Candidate story roots, probed in order.
    pub const ROOT_SELECTOR_CANDIDATES: [&str; 2] = ["#storybook-root", "#root"];
    pub const ERROR_STACK_SELECTOR: &str = "#error-stack";
    pub const UNKNOWN_PLAY_FUNCTION_ERROR: &str = "an unknown exception was thrown";
    pub const MISSING_CHANNEL_ERROR: &str =
        "Couldn't find storybook channel. Looks like the opened page is not storybook preview";
    /// Message fragment drivers use when a command is unsupported.
    pub const NOT_IMPLEMENTED_SIGNATURE: &str = "Method has not yet been implemented";

    pub const STORYBOOK_INDEX_PATH: &str = "index.html";
    pub const STORYBOOK_IFRAME_PATH: &str = "iframe.html";
    pub const STORYBOOK_INDEX_JSON_PATH: &str = "index.json";
    pub const STORYBOOK_STORIES_JSON_PATH: &str = "stories.json";
    pub const STORYBOOK_KNOWN_PATH_ENDINGS: [&str; 4] = [
        STORYBOOK_INDEX_PATH,
        STORYBOOK_IFRAME_PATH,
        STORYBOOK_INDEX_JSON_PATH,
        STORYBOOK_STORIES_JSON_PATH,
    ];
}

/// One renderable story, as listed by the storybook index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDescriptor {
    pub id: String,
    pub title: String,
    pub name: String,
    pub import_path: String,
    #[serde(rename = "type", default = "default_story_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

fn default_story_type() -> String {
    "story".to_string()
}

impl StoryDescriptor {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        name: impl Into<String>,
        import_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            name: name.into(),
            import_path: import_path.into(),
            kind: default_story_type(),
            tags: None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .map(|tags| tags.iter().any(|t| t == tag))
            .unwrap_or(false)
    }

    /// Suite path used when grouping tests: title segments followed by the name.
    pub fn suite_path(&self) -> Vec<String> {
        self.title
            .split('/')
            .map(str::to_string)
            .chain(std::iter::once(self.name.clone()))
            .collect()
    }
}

/// A single request to put a story on screen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub story_id: String,
    #[serde(default)]
    pub args: Args,
    #[serde(default)]
    pub storybook_globals: Args,
    #[serde(default)]
    pub should_remount: bool,
}

impl SelectionRequest {
    pub fn new(story_id: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    pub fn with_globals(mut self, globals: Args) -> Self {
        self.storybook_globals = globals;
        self
    }

    pub fn remount(mut self, flag: bool) -> Self {
        self.should_remount = flag;
        self
    }
}

/// Result object the page hands back through the completion callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryLoadResult {
    #[serde(default)]
    pub root_selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_function_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_injected: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ResultDecodeError {
    #[error("story load result is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected story load result payload: {0}")]
    Shape(String),
}

impl StoryLoadResult {
    pub fn not_injected() -> Self {
        Self {
            not_injected: Some(true),
            ..Self::default()
        }
    }

    pub fn is_not_injected(&self) -> bool {
        self.not_injected.unwrap_or(false)
    }

    /// Decode the value returned by an async script: either the JSON string the
    /// page produced or an already-parsed object.
    pub fn from_script_value(value: &Value) -> Result<Self, ResultDecodeError> {
        match value {
            Value::String(raw) => Ok(serde_json::from_str(raw)?),
            Value::Object(_) => Ok(serde_json::from_value(value.clone())?),
            other => Err(ResultDecodeError::Shape(other.to_string())),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn outcome(&self) -> SelectionOutcome {
        SelectionOutcome::from(self.clone())
    }
}

/// Classified outcome of one selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    Rendered { root_selector: String },
    LoadError { message: String },
    PlayFunctionError { root_selector: String, message: String },
    NotInjected,
}

impl From<StoryLoadResult> for SelectionOutcome {
    fn from(result: StoryLoadResult) -> Self {
        if result.is_not_injected() {
            return SelectionOutcome::NotInjected;
        }
        if let Some(message) = result.load_error {
            return SelectionOutcome::LoadError { message };
        }
        if let Some(message) = result.play_function_error {
            return SelectionOutcome::PlayFunctionError {
                root_selector: result.root_selector,
                message,
            };
        }
        SelectionOutcome::Rendered {
            root_selector: result.root_selector,
        }
    }
}

impl fmt::Display for SelectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionOutcome::Rendered { root_selector } => {
                write!(f, "rendered at {root_selector}")
            }
            SelectionOutcome::LoadError { message } => write!(f, "load error: {message}"),
            SelectionOutcome::PlayFunctionError { message, .. } => {
                write!(f, "play function error: {message}")
            }
            SelectionOutcome::NotInjected => write!(f, "coordinator not injected"),
        }
    }
}
