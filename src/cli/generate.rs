use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use storybook_harness::catalog;
use storybook_harness::plan::{build_plans, write_plans, PlanOptions};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    /// Directory for the plans, overrides the configuration
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Project root the story import paths are relative to
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<PathBuf>,
}

#[derive(Serialize)]
struct GenerateSummary {
    output_dir: PathBuf,
    stories: usize,
    plans: Vec<PathBuf>,
}

pub async fn cmd_generate(
    args: GenerateArgs,
    ctx: &CliContext,
    output: &OutputFormat,
) -> Result<()> {
    let config = ctx.config();
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.output_dir.clone());
    let project_root = match args.project_root {
        Some(root) => root,
        None => env::current_dir().context("Failed to resolve the current directory")?,
    };

    let stories = catalog::get_stories(
        &config.storybook_url,
        config.wait_storybook_json_timeout(),
    )
    .await
    .context("Failed to load storybook stories")?;

    let plans = build_plans(
        &stories,
        &project_root,
        &config.storybook_url,
        &PlanOptions::from(config),
    );
    let written = write_plans(&output_dir, &plans)
        .await
        .context("Failed to write test plans")?;

    let summary = GenerateSummary {
        output_dir: output_dir.clone(),
        stories: stories.len(),
        plans: written,
    };
    let lines = vec![format!(
        "Wrote {} plans for {} stories to {}",
        summary.plans.len(),
        summary.stories,
        output_dir.display()
    )];
    emit(output, &summary, &lines)
}
