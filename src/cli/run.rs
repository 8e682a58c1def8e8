use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use storybook_harness::plan::read_plans;
use storybook_harness::runner::{run_with_webdriver, summarize};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Directory holding the generated plans, overrides the configuration
    #[arg(long, value_name = "DIR")]
    pub plans: Option<PathBuf>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = ctx.config();
    let plans_dir = args.plans.unwrap_or_else(|| config.output_dir.clone());
    let plans = read_plans(&plans_dir).await.with_context(|| {
        format!(
            "Failed to read test plans from {} (run `generate` first)",
            plans_dir.display()
        )
    })?;
    if plans.is_empty() {
        bail!("No test plans found in {}", plans_dir.display());
    }

    let report = run_with_webdriver(config, &plans).await?;
    emit(output, &report, &summarize(&report))?;

    if report.failed() > 0 {
        bail!(
            "{} of {} story runs failed",
            report.failed(),
            report.runs.len()
        );
    }
    Ok(())
}
