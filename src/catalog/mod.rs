//! Story catalog of a running storybook.
//!
//! Storybook 6 publishes `stories.json` (v3), newer releases `index.json`
//! (v4). Both are polled until one of them answers with JSON.

mod extract;
mod fetch;
mod location;

use std::time::Duration;

use harness_core_types::protocol::{STORYBOOK_INDEX_JSON_PATH, STORYBOOK_STORIES_JSON_PATH};
use harness_core_types::StoryDescriptor;
use thiserror::Error;
use tracing::info;

pub use extract::{extract_stories, SUPPORTED_VERSIONS};
pub use fetch::{wait_storybook_data_json, PollSettings, CHECK_INTERVAL, REQUEST_TIMEOUT};
pub use location::storybook_path_ending_with;

/// Data files in the order they are requested.
pub const DATA_JSON_PATHS: [&str; 2] = [STORYBOOK_STORIES_JSON_PATH, STORYBOOK_INDEX_JSON_PATH];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid storybook url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(
        "Couldn't obtain stories JSON data in {timeout_ms}ms\n\
         If you are using Storybook v6, please make sure you have set \"features.buildStoriesJson\" to \"true\" in your \"./.storybook/main.js\" file.\n\
         If your storybook dev server can't start in {timeout_ms}ms, you can increase \"wait_storybook_json_timeout_ms\" value in the config"
    )]
    Timeout { timeout_ms: u128 },

    #[error("Couldn't find storybook stories")]
    Empty,

    #[error("malformed story entry: {0}")]
    Entry(#[from] serde_json::Error),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Wait for the storybook at `storybook_url` to publish its stories.
pub async fn get_stories(
    storybook_url: &str,
    timeout: Duration,
) -> CatalogResult<Vec<StoryDescriptor>> {
    get_stories_with(storybook_url, &PollSettings::new(timeout)).await
}

pub async fn get_stories_with(
    storybook_url: &str,
    settings: &PollSettings,
) -> CatalogResult<Vec<StoryDescriptor>> {
    let urls = DATA_JSON_PATHS
        .iter()
        .map(|ending| storybook_path_ending_with(storybook_url, ending))
        .collect::<CatalogResult<Vec<_>>>()?;

    let data = wait_storybook_data_json(&urls, settings).await?;
    let stories = extract_stories(&data)?;
    if stories.is_empty() {
        return Err(CatalogError::Empty);
    }

    info!(target: "catalog", count = stories.len(), "storybook stories loaded");
    Ok(stories)
}
