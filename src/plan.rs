//! Test plans generated from the story catalog.
//!
//! One JSON file per story module (`importPath`), mirrored under the output
//! directory, e.g. `./src/Button.stories.tsx` becomes
//! `<output>/src/Button.stories.tsx.plan.json`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use harness_core_types::{Args, StoryDescriptor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::config::HarnessConfig;

pub const PLAN_SUFFIX: &str = ".plan.json";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plan {} is not valid: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("import path {0:?} has no file component")]
    ImportPath(String),
}

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOptions {
    pub auto_screenshots: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscreenshot_selector: Option<String>,
    #[serde(default)]
    pub auto_screenshot_storybook_globals: BTreeMap<String, Args>,
}

impl From<&HarnessConfig> for PlanOptions {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            auto_screenshots: config.auto_screenshots,
            autoscreenshot_selector: config.autoscreenshot_selector.clone(),
            auto_screenshot_storybook_globals: config.storybook_globals.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStory {
    #[serde(flatten)]
    pub story: StoryDescriptor,
    pub absolute_path: PathBuf,
    pub suite: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlan {
    pub storybook_url: String,
    pub import_path: String,
    pub stories: Vec<PlannedStory>,
    pub options: PlanOptions,
}

/// Group `stories` by module. `project_root` resolves each module's absolute path.
pub fn build_plans(
    stories: &[StoryDescriptor],
    project_root: &Path,
    storybook_url: &str,
    options: &PlanOptions,
) -> Vec<TestPlan> {
    let mut by_module: BTreeMap<&str, Vec<PlannedStory>> = BTreeMap::new();
    for story in stories {
        by_module
            .entry(story.import_path.as_str())
            .or_default()
            .push(PlannedStory {
                absolute_path: project_root.join(&story.import_path),
                suite: story.suite_path(),
                story: story.clone(),
            });
    }

    by_module
        .into_iter()
        .map(|(import_path, stories)| TestPlan {
            storybook_url: storybook_url.to_string(),
            import_path: import_path.to_string(),
            stories,
            options: options.clone(),
        })
        .collect()
}

/// Location of the plan for `import_path`. Only plain path segments are kept,
/// so plans never escape `output_dir`.
pub fn plan_path(output_dir: &Path, import_path: &str) -> PlanResult<PathBuf> {
    let relative: PathBuf = Path::new(import_path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    let file_name = relative
        .file_name()
        .ok_or_else(|| PlanError::ImportPath(import_path.to_string()))?
        .to_string_lossy()
        .into_owned();
    Ok(output_dir
        .join(&relative)
        .with_file_name(format!("{file_name}{PLAN_SUFFIX}")))
}

pub async fn write_plans(output_dir: &Path, plans: &[TestPlan]) -> PlanResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(plans.len());
    for plan in plans {
        let path = plan_path(output_dir, &plan.import_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| PlanError::Io {
                    action: "create",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let body = serde_json::to_vec_pretty(plan).map_err(|source| PlanError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body).await.map_err(|source| PlanError::Io {
            action: "write",
            path: path.clone(),
            source,
        })?;
        debug!(target: "plan", path = %path.display(), stories = plan.stories.len(), "plan written");
        written.push(path);
    }
    info!(target: "plan", count = written.len(), dir = %output_dir.display(), "test plans written");
    Ok(written)
}

/// Every plan under `output_dir`, ordered by path.
pub async fn read_plans(output_dir: &Path) -> PlanResult<Vec<TestPlan>> {
    let mut files = Vec::new();
    let mut pending = vec![output_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|source| PlanError::Io {
            action: "read",
            path: dir.clone(),
            source,
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|source| PlanError::Io {
            action: "read",
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.to_string_lossy().ends_with(PLAN_SUFFIX) {
                files.push(path);
            }
        }
    }
    files.sort();

    let mut plans = Vec::with_capacity(files.len());
    for path in files {
        let raw = fs::read(&path).await.map_err(|source| PlanError::Io {
            action: "read",
            path: path.clone(),
            source,
        })?;
        let plan = serde_json::from_slice(&raw).map_err(|source| PlanError::Format {
            path: path.clone(),
            source,
        })?;
        plans.push(plan);
    }
    Ok(plans)
}
