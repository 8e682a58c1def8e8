use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::{LogFormat, OutputFormat};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Log line format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Output format
    #[arg(short, long, default_value = "human")]
    pub output: OutputFormat,

    /// Storybook address, overrides the configuration
    #[arg(long, value_name = "URL")]
    pub storybook_url: Option<String>,

    /// WebDriver endpoint, overrides the configuration
    #[arg(long, value_name = "URL")]
    pub webdriver_url: Option<String>,

    /// Browser ids to run in (exact or /regex/), overrides the configuration
    #[arg(long = "browser-id", value_name = "ID")]
    pub browser_ids: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}
