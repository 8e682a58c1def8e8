use harness_core_types::protocol::MISSING_CHANNEL_ERROR;
use harness_core_types::ResultDecodeError;
use thiserror::Error;
use wd_bridge::DriverError;

/// The story mounted but its play function failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PlayFunctionError {
    pub message: String,
}

impl PlayFunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoryCommandError {
    #[error("Hermione addon is not connected to storybook config")]
    AddonNotConnected,
    /// Story missing, threw while rendering or reported errored. Carries the
    /// page's message verbatim.
    #[error("{0}")]
    LoadError(String),
    #[error(transparent)]
    PlayFunction(#[from] PlayFunctionError),
    #[error("Can't inject client script")]
    InjectionFailed,
    #[error("Story root selector is not found")]
    RootNotFound,
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("invalid storybook url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Decode(#[from] ResultDecodeError),
}

pub type StoryCommandResult<T> = Result<T, StoryCommandError>;

impl StoryCommandError {
    pub fn play_function_error(&self) -> Option<&PlayFunctionError> {
        match self {
            StoryCommandError::PlayFunction(err) => Some(err),
            _ => None,
        }
    }

    /// The opened page has no preview channel at all.
    pub fn is_not_storybook_page(&self) -> bool {
        matches!(self, StoryCommandError::LoadError(message) if message == MISSING_CHANNEL_ERROR)
    }

    /// Driver capability gap rather than a failure of the story.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, StoryCommandError::Driver(err) if err.is_not_implemented())
    }
}
