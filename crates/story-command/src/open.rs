//! Test-runner flavor of story selection.
//!
//! Works from a catalog entry instead of a bare id: the preview is opened in
//! instrumented story mode, storybook globals are applied before selection,
//! and report metadata points at the manager (`index.html`) view of the story.

use harness_core_types::protocol::{STORYBOOK_IFRAME_PATH, STORYBOOK_INDEX_PATH};
use harness_core_types::{Args, SelectionRequest, StoryDescriptor, StoryLoadResult};
use serde_json::Value;
use tracing::{debug, info_span, Instrument};
use url::Url;
use wd_bridge::AutomationSession;

use crate::errors::{PlayFunctionError, StoryCommandError, StoryCommandResult};
use crate::select::preview_iframe_url;
use crate::{invoke, META_STORY_FILE, META_URL};

#[derive(Clone, Debug, Default)]
pub struct OpenStoryOptions {
    /// Storybook address; `iframe.html` is appended when missing.
    pub base_url: String,
    pub storybook_globals: Args,
    /// Screenshot target overriding the detected story root.
    pub autoscreenshot_selector: Option<String>,
}

/// Open `story` in the preview and wait for its render.
pub async fn open_story(
    session: &dyn AutomationSession,
    story: &StoryDescriptor,
    options: &OpenStoryOptions,
) -> StoryCommandResult<StoryLoadResult> {
    let span = info_span!("story.open", story_id = %story.id);
    run(session, story, options).instrument(span).await
}

async fn run(
    session: &dyn AutomationSession,
    story: &StoryDescriptor,
    options: &OpenStoryOptions,
) -> StoryCommandResult<StoryLoadResult> {
    let iframe_url = instrumented_iframe_url(&options.base_url)?;
    let current = invoke::current_url_or_empty(session).await?;
    let current = Url::parse(&current).ok();

    let on_preview = current.as_ref().map_or(false, |url| {
        url.host_str() == iframe_url.host_str()
            && url.port_or_known_default() == iframe_url.port_or_known_default()
            && url.path().contains(STORYBOOK_IFRAME_PATH)
    });
    let should_remount = on_preview
        && current
            .as_ref()
            .and_then(|url| query_param(url, "id"))
            .as_deref()
            == Some(story.id.as_str());

    if !on_preview {
        debug!(target: "story-command", url = %iframe_url, "opening storybook preview");
        session.navigate(iframe_url.as_str()).await?;
    }

    session
        .set_meta(META_URL, Value::String(report_url(&iframe_url, story)))
        .await?;
    session
        .set_meta(META_STORY_FILE, Value::String(story.import_path.clone()))
        .await?;

    let request = SelectionRequest::new(story.id.clone())
        .with_globals(options.storybook_globals.clone())
        .remount(should_remount);
    let result = invoke::invoke_coordinator(session, &request).await?;

    if let Some(message) = &result.load_error {
        return Err(StoryCommandError::LoadError(message.clone()));
    }
    if let Some(message) = &result.play_function_error {
        return Err(PlayFunctionError::new(message.clone()).into());
    }
    if options.autoscreenshot_selector.is_none() && result.root_selector.is_empty() {
        return Err(StoryCommandError::RootNotFound);
    }
    Ok(result)
}

fn instrumented_iframe_url(base_url: &str) -> StoryCommandResult<Url> {
    let raw = preview_iframe_url(base_url);
    let mut url = Url::parse(&raw).map_err(|err| StoryCommandError::InvalidUrl {
        url: raw.clone(),
        reason: err.to_string(),
    })?;
    set_query_param(&mut url, "instrument", "true");
    set_query_param(&mut url, "viewMode", "story");
    Ok(url)
}

/// Manager view of the story, as recorded in report metadata.
fn report_url(iframe_url: &Url, story: &StoryDescriptor) -> String {
    let mut url = iframe_url.clone();
    set_query_param(&mut url, "id", &story.id);
    set_query_param(&mut url, "path", &format!("/{}/{}", story.kind, story.id));
    url.to_string().replacen(STORYBOOK_IFRAME_PATH, STORYBOOK_INDEX_PATH, 1)
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != key)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
}
