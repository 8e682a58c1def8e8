//! Page calls shared by the story commands.

use harness_core_types::{SelectionRequest, StoryLoadResult};
use serde_json::Value;
use tracing::{debug, warn};
use wd_bridge::{AutomationSession, DriverResult, PageScript};

use crate::errors::{StoryCommandError, StoryCommandResult};

/// Whether a coordinator entry point is bound on the page. Drivers without
/// sync execute report "not implemented"; that reads as absent.
pub async fn coordinator_present(session: &dyn AutomationSession) -> DriverResult<bool> {
    match session.execute(&PageScript::ProbeCoordinator).await {
        Ok(value) => Ok(is_truthy(&value)),
        Err(err) if err.is_not_implemented() => {
            debug!(target: "story-command", "coordinator probe not supported by driver");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Current page url, `""` when the driver cannot report it.
pub async fn current_url_or_empty(session: &dyn AutomationSession) -> DriverResult<String> {
    match session.current_url().await {
        Ok(url) => Ok(url),
        Err(err) if err.is_not_implemented() => Ok(String::new()),
        Err(err) => Err(err),
    }
}

pub async fn inject(session: &dyn AutomationSession) -> DriverResult<()> {
    debug!(target: "story-command", "injecting coordinator");
    session.execute(&PageScript::InjectCoordinator).await?;
    Ok(())
}

/// Inject the coordinator unless it is already bound.
pub async fn ensure_injected(session: &dyn AutomationSession) -> StoryCommandResult<()> {
    if coordinator_present(session).await? {
        return Ok(());
    }
    inject(session).await?;
    if coordinator_present(session).await? {
        return Ok(());
    }
    Err(StoryCommandError::InjectionFailed)
}

/// Run the coordinator through async execute. A page without the coordinator
/// gets it injected once before the call is repeated.
pub async fn invoke_coordinator(
    session: &dyn AutomationSession,
    request: &SelectionRequest,
) -> StoryCommandResult<StoryLoadResult> {
    let result = open_once(session, request).await?;
    if !result.is_not_injected() {
        return Ok(result);
    }

    inject(session).await?;
    let retried = open_once(session, request).await?;
    if retried.is_not_injected() {
        warn!(target: "story-command", story = %request.story_id, "coordinator still absent after injection");
        return Err(StoryCommandError::InjectionFailed);
    }
    Ok(retried)
}

async fn open_once(
    session: &dyn AutomationSession,
    request: &SelectionRequest,
) -> StoryCommandResult<StoryLoadResult> {
    let value = session
        .execute_async(&PageScript::OpenStory(request.clone()))
        .await?;
    Ok(StoryLoadResult::from_script_value(&value)?)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(false, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
