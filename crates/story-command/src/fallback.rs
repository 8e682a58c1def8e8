//! Completion polling for drivers without async script execution.
//!
//! Only "done" is observable here: a story that fails to load still flips the
//! completion flag, so this path cannot report load or play function errors.

use std::time::Duration;

use harness_core_types::SelectionRequest;
use tracing::info;
use wd_bridge::{AutomationSession, PageScript, WaitOptions};

use crate::errors::StoryCommandResult;
use crate::invoke;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn not_rendered_message(story_id: &str) -> String {
    format!("Story: \"{story_id}\" is not rendered")
}

/// Start the coordinator with a flag-flipping callback and poll the flag
/// until it is set or `timeout` passes.
pub async fn select_by_polling(
    session: &dyn AutomationSession,
    request: &SelectionRequest,
    timeout: Duration,
) -> StoryCommandResult<()> {
    info!(target: "story-command", story = %request.story_id, "async execute unsupported, polling for render");

    invoke::ensure_injected(session).await?;
    session
        .execute(&PageScript::StartOpenStory(request.clone()))
        .await?;

    let options = WaitOptions::new(timeout, not_rendered_message(&request.story_id))
        .with_interval(POLL_INTERVAL);
    session
        .wait_until(&PageScript::IsStoryRendered, &options)
        .await?;
    Ok(())
}
