use super::env::CliArgs;
use super::generate::cmd_generate;
use super::info::cmd_info;
use super::run::cmd_run;
use super::select::cmd_select;
use super::stories::cmd_stories;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Stories(args) => cmd_stories(args, ctx, &cli.output).await,
        Commands::Generate(args) => cmd_generate(args, ctx, &cli.output).await,
        Commands::Run(args) => cmd_run(args, ctx, &cli.output).await,
        Commands::Select(args) => cmd_select(args, ctx, &cli.output).await,
        Commands::Info => cmd_info(ctx, &cli.output),
    }
}
