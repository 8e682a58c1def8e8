use clap::Subcommand;

use super::generate::GenerateArgs;
use super::run::RunArgs;
use super::select::SelectArgs;
use super::stories::StoriesArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// List the stories published by the storybook
    Stories(StoriesArgs),

    /// Write one test plan per story module
    Generate(GenerateArgs),

    /// Open every planned story in each selected browser
    Run(RunArgs),

    /// Select a single story in a new browser session
    Select(SelectArgs),

    /// Show build information and the effective configuration
    Info,
}
