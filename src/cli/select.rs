use anyhow::{anyhow, Context, Result};
use clap::Args;
use harness_core_types::Args as StoryArgs;
use serde::Serialize;
use serde_json::Value;
use story_command::{SelectStoryCommand, META_URL};
use tracing::warn;
use wd_bridge::{AutomationSession, WebDriverConfig, WebDriverSession};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SelectArgs {
    /// Story id, e.g. `example-button--primary`
    pub story_id: String,

    /// Story arg as key=value; values are read as JSON when they parse
    #[arg(short, long = "arg", value_name = "KEY=VALUE")]
    pub args: Vec<String>,
}

#[derive(Serialize)]
struct SelectSummary {
    story_id: String,
    browser_id: String,
    url: Option<String>,
}

pub async fn cmd_select(args: SelectArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = ctx.config();
    let story_args = parse_story_args(&args.args)?;
    let (browser_id, capabilities) = config
        .selected_browsers()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No browser selected"))?;

    let session = WebDriverSession::connect(&WebDriverConfig {
        endpoint: config.webdriver_url.clone(),
        capabilities,
        ..WebDriverConfig::default()
    })
    .await
    .with_context(|| format!("Failed to open a {browser_id} session"))?;

    let command = SelectStoryCommand::new(config.storybook_url.clone())
        .with_render_timeout(config.render_timeout());
    let selected = command
        .select_story(&session, &args.story_id, story_args)
        .await;
    let url = session.meta().get_str(META_URL);
    if let Err(err) = session.close().await {
        warn!(error = %err, "failed to close browser session");
    }
    selected.with_context(|| format!("Failed to select story {}", args.story_id))?;

    let summary = SelectSummary {
        story_id: args.story_id,
        browser_id,
        url,
    };
    let lines = vec![format!(
        "{} rendered in {} at {}",
        summary.story_id,
        summary.browser_id,
        summary.url.as_deref().unwrap_or("-")
    )];
    emit(output, &summary, &lines)
}

fn parse_story_args(raw: &[String]) -> Result<StoryArgs> {
    let mut args = StoryArgs::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Story arg {entry:?} is not KEY=VALUE"))?;
        let value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        args.insert(key.trim().to_string(), value);
    }
    Ok(args)
}
