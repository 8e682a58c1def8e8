use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use storybook_harness::HarnessConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::env::CliArgs;
use super::output::LogFormat;

const LOCAL_ENV_PATH: &str = "config/local.env";
const LOCAL_CONFIG_PATH: &str = "config/storybook-harness.yaml";

/// Export `config/local.env` entries that are not already set.
pub fn load_local_env_overrides() {
    let path = Path::new(LOCAL_ENV_PATH);
    if !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            for (key, value) in parse_env_lines(&contents) {
                if env::var(&key).is_ok() {
                    continue;
                }
                env::set_var(key, value);
            }
            info!(path = %path.display(), "Loaded environment overrides from local.env");
        }
        Err(err) => {
            warn!(path = %path.display(), ?err, "failed to read local.env overrides");
        }
    }
}

fn parse_env_lines(contents: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = idx + 1, "invalid local.env entry; skipping");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        entries.push((key.to_string(), unescape_value(value.trim())));
    }
    entries
}

pub fn init_logging(level: &str, debug: bool, format: &LogFormat) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}

pub struct LoadedConfig {
    pub config: HarnessConfig,
    pub path: Option<PathBuf>,
}

pub fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let (path, required) = match config_path {
        Some(path) => (Some(path.clone()), true),
        None => (default_config_path(), false),
    };

    let config = HarnessConfig::load(path.as_deref(), required).with_context(|| match &path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    match path.as_ref().filter(|path| path.exists()) {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No configuration file found, using defaults and environment"),
    }
    Ok(LoadedConfig { config, path })
}

/// Priority: ./config/storybook-harness.yaml > ~/.config/storybook-harness/config.yaml
fn default_config_path() -> Option<PathBuf> {
    let local_config = PathBuf::from(LOCAL_CONFIG_PATH);
    if local_config.exists() {
        return Some(local_config);
    }
    dirs::config_dir().map(|mut path| {
        path.push("storybook-harness");
        path.push("config.yaml");
        path
    })
}

/// Apply command line flags on top of the loaded configuration.
pub fn apply_cli_overrides(config: &mut HarnessConfig, cli: &CliArgs) -> Result<()> {
    if let Some(url) = &cli.storybook_url {
        config.storybook_url = url.clone();
    }
    if let Some(url) = &cli.webdriver_url {
        config.webdriver_url = url.clone();
    }
    if !cli.browser_ids.is_empty() {
        config.browser_ids = cli.browser_ids.clone();
    }
    config
        .validate()
        .context("Invalid command line overrides")?;
    Ok(())
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_env_lines() {
        let entries = parse_env_lines(
            "# storybook\nHERMIONE_STORYBOOK_STORYBOOK_URL=\"http://sb:6006\"\n\nbroken line\n=skip\n",
        );
        assert_eq!(
            entries,
            vec![(
                "HERMIONE_STORYBOOK_STORYBOOK_URL".to_string(),
                "http://sb:6006".to_string()
            )]
        );
    }

    #[test]
    fn unescapes_quoted_values() {
        assert_eq!(unescape_value("\"a\\tb\""), "a\tb");
        assert_eq!(unescape_value("plain"), "plain");
    }
}
