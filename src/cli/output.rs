use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Print `value` in a machine format, or the `human` lines.
pub fn emit<T: Serialize>(format: &OutputFormat, value: &T, human: &[String]) -> Result<()> {
    match format {
        OutputFormat::Human => {
            for line in human {
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            let rendered =
                serde_json::to_string_pretty(value).context("Failed to render json output")?;
            println!("{rendered}");
        }
        OutputFormat::Yaml => {
            let rendered = serde_yaml::to_string(value).context("Failed to render yaml output")?;
            print!("{rendered}");
        }
    }
    Ok(())
}
