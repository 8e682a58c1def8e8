use std::collections::HashMap;
use std::time::Duration;

use harness_core_types::protocol::STORYBOOK_IFRAME_PATH;
use harness_core_types::{Args, SelectionOutcome, SelectionRequest, StoryLoadResult};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use wd_bridge::AutomationSession;

use crate::errors::{PlayFunctionError, StoryCommandError, StoryCommandResult};
use crate::invalidation::SessionInvalidation;
use crate::{fallback, invoke, META_STORY_FILE, META_URL};

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Preview iframe address of a storybook instance.
pub fn preview_iframe_url(storybook_url: &str) -> String {
    if storybook_url.contains(STORYBOOK_IFRAME_PATH) {
        return storybook_url.to_string();
    }
    format!(
        "{}/{}",
        storybook_url.trim_end_matches('/'),
        STORYBOOK_IFRAME_PATH
    )
}

/// `selectStory` bound to one browser session.
///
/// Keeps the session's invalidation flag and the story the preview shows, so
/// repeated selections of one story remount it.
pub struct SelectStoryCommand {
    storybook_url: String,
    render_timeout: Duration,
    invalidation: SessionInvalidation,
    story_files: HashMap<String, String>,
    shown_story: Mutex<Option<String>>,
}

impl SelectStoryCommand {
    pub fn new(storybook_url: impl Into<String>) -> Self {
        Self {
            storybook_url: storybook_url.into(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            invalidation: SessionInvalidation::new(),
            story_files: HashMap::new(),
            shown_story: Mutex::new(None),
        }
    }

    /// Bound for the polling fallback.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Share an invalidation flag with other commands of the same session.
    pub fn with_invalidation(mut self, invalidation: SessionInvalidation) -> Self {
        self.invalidation = invalidation;
        self
    }

    /// Story id to module path, recorded as `storyFile` metadata.
    pub fn with_story_files(mut self, story_files: HashMap<String, String>) -> Self {
        self.story_files = story_files;
        self
    }

    pub fn invalidation(&self) -> &SessionInvalidation {
        &self.invalidation
    }

    pub fn iframe_url(&self) -> String {
        preview_iframe_url(&self.storybook_url)
    }

    pub async fn select_story(
        &self,
        session: &dyn AutomationSession,
        story_id: &str,
        args: Args,
    ) -> StoryCommandResult<()> {
        let span = info_span!("story.select", story_id = %story_id);
        self.run(session, story_id, args).instrument(span).await
    }

    async fn run(
        &self,
        session: &dyn AutomationSession,
        story_id: &str,
        args: Args,
    ) -> StoryCommandResult<()> {
        let reinit = self.invalidation.is_set();
        let present = invoke::coordinator_present(session).await?;
        if !present || reinit {
            self.open_preview(session, reinit).await?;
        }

        let remount = self.shown_story.lock().as_deref() == Some(story_id);
        let request = SelectionRequest::new(story_id)
            .with_args(args)
            .remount(remount);
        debug!(target: "story-command", remount, "invoking coordinator");

        match invoke::invoke_coordinator(session, &request).await {
            Ok(result) => {
                self.remember(story_id);
                interpret(result)?;
            }
            Err(err) if err.is_not_implemented() => {
                fallback::select_by_polling(session, &request, self.render_timeout).await?;
                self.remember(story_id);
            }
            Err(err) => return Err(err),
        }

        self.record_meta(session, story_id).await?;
        info!(target: "story-command", "story selected");
        Ok(())
    }

    async fn open_preview(
        &self,
        session: &dyn AutomationSession,
        reinit: bool,
    ) -> StoryCommandResult<()> {
        let current = invoke::current_url_or_empty(session).await?;
        let target = self.iframe_url();

        if !reinit && current.contains(&target) {
            warn!(target: "story-command", url = %current, "preview open but coordinator missing");
            return Err(StoryCommandError::AddonNotConnected);
        }

        self.invalidation.clear();
        *self.shown_story.lock() = None;
        if let Err(err) = session.navigate(&target).await {
            self.invalidation.mark();
            warn!(target: "story-command", url = %target, error = %err, "navigation failed, session marked for reinit");
            return Err(err.into());
        }
        debug!(target: "story-command", url = %target, "preview opened");
        Ok(())
    }

    fn remember(&self, story_id: &str) {
        *self.shown_story.lock() = Some(story_id.to_string());
    }

    async fn record_meta(
        &self,
        session: &dyn AutomationSession,
        story_id: &str,
    ) -> StoryCommandResult<()> {
        let url = invoke::current_url_or_empty(session).await?;
        session.set_meta(META_URL, Value::String(url)).await?;
        if let Some(file) = self.story_files.get(story_id) {
            session
                .set_meta(META_STORY_FILE, Value::String(file.clone()))
                .await?;
        }
        Ok(())
    }
}

/// Turn a coordinator result into the command outcome.
pub(crate) fn interpret(result: StoryLoadResult) -> StoryCommandResult<String> {
    match SelectionOutcome::from(result) {
        SelectionOutcome::Rendered { root_selector } => Ok(root_selector),
        SelectionOutcome::LoadError { message } => Err(StoryCommandError::LoadError(message)),
        SelectionOutcome::PlayFunctionError { message, .. } => {
            Err(PlayFunctionError::new(message).into())
        }
        SelectionOutcome::NotInjected => Err(StoryCommandError::InjectionFailed),
    }
}
