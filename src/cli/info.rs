use anyhow::Result;
use serde::Serialize;
use storybook_harness::HarnessConfig;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Serialize)]
struct InfoReport<'a> {
    version: &'static str,
    build_date: &'static str,
    git_commit: &'static str,
    config_path: Option<String>,
    selected_browsers: Vec<String>,
    config: &'a HarnessConfig,
}

pub fn cmd_info(ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = ctx.config();
    let selected_browsers = config
        .selected_browsers()
        .map(|browsers| browsers.into_iter().map(|(id, _)| id).collect())
        .unwrap_or_default();

    let report = InfoReport {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_commit: env!("GIT_HASH"),
        config_path: ctx.config_path().map(|path| path.display().to_string()),
        selected_browsers,
        config,
    };

    let lines = vec![
        format!("storybook-harness v{}", report.version),
        format!("Build Date: {}", report.build_date),
        format!("Git Commit: {}", report.git_commit),
        format!(
            "Config: {}",
            report.config_path.as_deref().unwrap_or("(defaults)")
        ),
        format!("Enabled: {}", config.enabled),
        format!("Storybook: {}", config.storybook_url),
        format!("WebDriver: {}", config.webdriver_url),
        format!("Browsers: {}", report.selected_browsers.join(", ")),
        format!("Output dir: {}", config.output_dir.display()),
    ];
    emit(output, &report, &lines)
}
