//! Executes test plans against browser sessions.
//!
//! Every planned story is opened once per named storybook global set (or
//! once with no globals). Failures are recorded per story and never abort
//! the remaining runs.

use std::time::Instant;

use chrono::{DateTime, Utc};
use harness_core_types::Args;
use serde::{Deserialize, Serialize};
use story_command::{open_story, OpenStoryOptions, StoryCommandError, META_URL};
use tracing::{error, info, warn};
use wd_bridge::{AutomationSession, WebDriverConfig, WebDriverSession};

use crate::config::{ConfigError, HarnessConfig};
use crate::plan::TestPlan;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The story itself failed to load or render.
    Load,
    PlayFunction,
    Driver,
    /// No browser session could be opened.
    Setup,
    /// The opened page is not a usable storybook preview, or the harness
    /// could not hook into it.
    Preview,
}

impl FailureKind {
    fn of(err: &StoryCommandError) -> Self {
        match err {
            StoryCommandError::PlayFunction(_) => FailureKind::PlayFunction,
            StoryCommandError::Driver(_) => FailureKind::Driver,
            StoryCommandError::LoadError(_) if err.is_not_storybook_page() => FailureKind::Preview,
            StoryCommandError::LoadError(_) => FailureKind::Load,
            StoryCommandError::AddonNotConnected
            | StoryCommandError::InjectionFailed
            | StoryCommandError::RootNotFound
            | StoryCommandError::InvalidUrl { .. }
            | StoryCommandError::Decode(_) => FailureKind::Preview,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoryRun {
    pub browser_id: String,
    pub story_id: String,
    pub suite: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globals_set: Option<String>,
    pub status: RunStatus,
    /// Report link recorded by the selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Element an autoscreenshot would capture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub runs: Vec<StoryRun>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.status == RunStatus::Passed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.passed()
    }
}

/// Run every plan in an already opened session.
pub async fn run_plans(
    session: &dyn AutomationSession,
    browser_id: &str,
    plans: &[TestPlan],
) -> Vec<StoryRun> {
    let mut runs = Vec::new();
    for plan in plans {
        let global_sets: Vec<(Option<String>, Args)> =
            if plan.options.auto_screenshot_storybook_globals.is_empty() {
                vec![(None, Args::new())]
            } else {
                plan.options
                    .auto_screenshot_storybook_globals
                    .iter()
                    .map(|(name, globals)| (Some(name.clone()), globals.clone()))
                    .collect()
            };

        for planned in &plan.stories {
            for (set_name, globals) in &global_sets {
                let options = OpenStoryOptions {
                    base_url: plan.storybook_url.clone(),
                    storybook_globals: globals.clone(),
                    autoscreenshot_selector: plan.options.autoscreenshot_selector.clone(),
                };
                session.meta().clear();
                let started = Instant::now();
                let outcome = open_story(session, &planned.story, &options).await;

                let mut run = StoryRun {
                    browser_id: browser_id.to_string(),
                    story_id: planned.story.id.clone(),
                    suite: planned.suite.clone(),
                    globals_set: set_name.clone(),
                    status: RunStatus::Passed,
                    url: session.meta().get_str(META_URL),
                    screenshot_selector: None,
                    failure: None,
                    error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                match outcome {
                    Ok(result) => {
                        if plan.options.auto_screenshots {
                            run.screenshot_selector = Some(
                                plan.options
                                    .autoscreenshot_selector
                                    .clone()
                                    .unwrap_or(result.root_selector),
                            );
                        }
                        info!(target: "runner", browser = browser_id, story = %run.story_id, "story passed");
                    }
                    Err(err) => {
                        warn!(target: "runner", browser = browser_id, story = %run.story_id, error = %err, "story failed");
                        run.status = RunStatus::Failed;
                        run.failure = Some(FailureKind::of(&err));
                        run.error = Some(err.to_string());
                    }
                }
                runs.push(run);
            }
        }
    }
    runs
}

/// Open one WebDriver session per selected browser and run all plans in it.
pub async fn run_with_webdriver(
    config: &HarnessConfig,
    plans: &[TestPlan],
) -> Result<RunReport, ConfigError> {
    let started_at = Utc::now();
    let mut runs = Vec::new();

    for (browser_id, capabilities) in config.selected_browsers()? {
        let driver = WebDriverConfig {
            endpoint: config.webdriver_url.clone(),
            capabilities,
            ..WebDriverConfig::default()
        };
        let session = match WebDriverSession::connect(&driver).await {
            Ok(session) => session,
            Err(err) => {
                error!(target: "runner", browser = %browser_id, error = %err, "failed to open browser session");
                runs.extend(setup_failures(&browser_id, plans, &err.to_string()));
                continue;
            }
        };

        info!(target: "runner", browser = %browser_id, session = session.session_id(), "running plans");
        runs.extend(run_plans(&session, &browser_id, plans).await);
        if let Err(err) = session.close().await {
            warn!(target: "runner", browser = %browser_id, error = %err, "failed to close browser session");
        }
    }

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        runs,
    })
}

fn setup_failures(browser_id: &str, plans: &[TestPlan], reason: &str) -> Vec<StoryRun> {
    plans
        .iter()
        .flat_map(|plan| plan.stories.iter())
        .map(|planned| StoryRun {
            browser_id: browser_id.to_string(),
            story_id: planned.story.id.clone(),
            suite: planned.suite.clone(),
            globals_set: None,
            status: RunStatus::Failed,
            url: None,
            screenshot_selector: None,
            failure: Some(FailureKind::Setup),
            error: Some(reason.to_string()),
            duration_ms: 0,
        })
        .collect()
}

/// Human readable report lines.
pub fn summarize(report: &RunReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .runs
        .iter()
        .map(|run| {
            let mark = match run.status {
                RunStatus::Passed => "ok  ",
                RunStatus::Failed => "FAIL",
            };
            let set = run
                .globals_set
                .as_ref()
                .map(|name| format!(" [{name}]"))
                .unwrap_or_default();
            let detail = match (&run.error, &run.screenshot_selector) {
                (Some(error), _) => format!(": {error}"),
                (None, Some(selector)) => format!(" -> {selector}"),
                (None, None) => String::new(),
            };
            format!(
                "{mark} {browser} {suite}{set}{detail}",
                browser = run.browser_id,
                suite = run.suite.join(" / "),
            )
        })
        .collect();
    lines.push(format!(
        "{} passed, {} failed",
        report.passed(),
        report.failed()
    ));
    lines
}
