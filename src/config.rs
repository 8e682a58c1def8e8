//! Harness configuration
//!
//! Sources, lowest priority first: built-in defaults, an optional YAML file and
//! `HERMIONE_STORYBOOK_*` environment variables. Command line flags are applied
//! on top by the CLI. Only scalar settings can come from the environment; maps
//! (browsers, globals) keep their key case and live in the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment};
use harness_core_types::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::browsers::BrowserFilter;

pub const ENV_PREFIX: &str = "HERMIONE_STORYBOOK";
pub const DEFAULT_OUTPUT_DIR: &str = "testplane-storybook-autogenerated";
pub const DEFAULT_BROWSER_ID: &str = "chrome";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid environment override: {0}")]
    Environment(#[from] config::ConfigError),

    #[error("{field} is not a valid url ({value:?}): {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("invalid browser id pattern {pattern:?}: {source}")]
    BrowserPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no configured browser matches {0:?}")]
    NoBrowsers(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Switch the whole harness off without removing its configuration.
    pub enabled: bool,
    pub storybook_url: String,
    pub webdriver_url: String,
    /// Browser id to WebDriver capabilities.
    pub browsers: BTreeMap<String, Value>,
    /// Exact ids or `/regex/` patterns; empty selects every browser.
    pub browser_ids: Vec<String>,
    pub wait_storybook_json_timeout_ms: u64,
    pub render_timeout_ms: u64,
    pub auto_screenshots: bool,
    pub autoscreenshot_selector: Option<String>,
    /// Named global sets; every story is checked once per set.
    pub storybook_globals: BTreeMap<String, Args>,
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storybook_url: "http://localhost:6006".to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
            browsers: BTreeMap::from([(
                DEFAULT_BROWSER_ID.to_string(),
                wd_bridge::webdriver::default_capabilities(),
            )]),
            browser_ids: Vec::new(),
            wait_storybook_json_timeout_ms: 30_000,
            render_timeout_ms: 30_000,
            auto_screenshots: true,
            autoscreenshot_selector: None,
            storybook_globals: BTreeMap::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl HarnessConfig {
    /// Read `file` (when given and present) and apply the process environment.
    pub fn load(file: Option<&Path>, file_required: bool) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) if path.exists() => Self::from_yaml_file(path)?,
            Some(path) if file_required => {
                return Err(ConfigError::Missing(path.to_path_buf()))
            }
            _ => Self::default(),
        };
        EnvOverrides::collect(None)?.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("storybook_url", &self.storybook_url)?;
        check_url("webdriver_url", &self.webdriver_url)?;
        if self.wait_storybook_json_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("wait_storybook_json_timeout_ms"));
        }
        if self.render_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("render_timeout_ms"));
        }
        BrowserFilter::new(&self.browser_ids)?;
        Ok(())
    }

    pub fn wait_storybook_json_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_storybook_json_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Browsers selected by `browser_ids`, in id order.
    pub fn selected_browsers(&self) -> Result<Vec<(String, Value)>, ConfigError> {
        let filter = BrowserFilter::new(&self.browser_ids)?;
        let ids: Vec<String> = self.browsers.keys().cloned().collect();
        let selected: Vec<(String, Value)> = filter
            .apply(&ids)
            .into_iter()
            .filter_map(|id| {
                self.browsers
                    .get(&id)
                    .map(|capabilities| (id, capabilities.clone()))
            })
            .collect();
        if selected.is_empty() {
            return Err(ConfigError::NoBrowsers(self.browser_ids.clone()));
        }
        Ok(selected)
    }
}

/// Scalar settings read from `HERMIONE_STORYBOOK_*` variables, e.g.
/// `HERMIONE_STORYBOOK_RENDER_TIMEOUT_MS=60000` or
/// `HERMIONE_STORYBOOK_BROWSER_IDS=chrome,/^firefox/`.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    enabled: Option<bool>,
    storybook_url: Option<String>,
    webdriver_url: Option<String>,
    browser_ids: Option<Vec<String>>,
    wait_storybook_json_timeout_ms: Option<u64>,
    render_timeout_ms: Option<u64>,
    auto_screenshots: Option<bool>,
    autoscreenshot_selector: Option<String>,
    output_dir: Option<PathBuf>,
}

impl EnvOverrides {
    /// `vars` replaces the process environment when given.
    fn collect(vars: Option<config::Map<String, String>>) -> Result<Self, ConfigError> {
        let overrides = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("browser_ids")
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;
        Ok(overrides)
    }

    fn apply(self, config: &mut HarnessConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(url) = self.storybook_url {
            config.storybook_url = url;
        }
        if let Some(url) = self.webdriver_url {
            config.webdriver_url = url;
        }
        if let Some(ids) = self.browser_ids {
            config.browser_ids = ids;
        }
        if let Some(ms) = self.wait_storybook_json_timeout_ms {
            config.wait_storybook_json_timeout_ms = ms;
        }
        if let Some(ms) = self.render_timeout_ms {
            config.render_timeout_ms = ms;
        }
        if let Some(flag) = self.auto_screenshots {
            config.auto_screenshots = flag;
        }
        if let Some(selector) = self.autoscreenshot_selector {
            config.autoscreenshot_selector = Some(selector);
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason,
    };
    if value.trim().is_empty() {
        return Err(invalid("empty".to_string()));
    }
    let url = Url::parse(value).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(())
}
