use anyhow::{Context, Result};
use clap::Args;
use storybook_harness::catalog;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct StoriesArgs {
    /// Only list stories whose id contains this text
    #[arg(long)]
    pub filter: Option<String>,
}

pub async fn cmd_stories(args: StoriesArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = ctx.config();
    let mut stories = catalog::get_stories(
        &config.storybook_url,
        config.wait_storybook_json_timeout(),
    )
    .await
    .context("Failed to load storybook stories")?;

    if let Some(filter) = &args.filter {
        stories.retain(|story| story.id.contains(filter.as_str()));
    }

    let lines: Vec<String> = stories
        .iter()
        .map(|story| {
            format!(
                "{}\t{}\t{}",
                story.id,
                story.suite_path().join(" / "),
                story.import_path
            )
        })
        .collect();
    emit(output, &stories, &lines)
}
