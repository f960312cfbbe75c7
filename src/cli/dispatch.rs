use super::env::CliArgs;
use super::lint::cmd_lint_policy;
use super::serve::cmd_serve;
use super::settings::cmd_settings;
use super::sign::cmd_sign;
use super::verify::cmd_verify;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::Sign(args) => cmd_sign(args, ctx, cli.output),
        Commands::Verify(args) => cmd_verify(args, ctx, cli.output),
        Commands::LintPolicy(args) => cmd_lint_policy(args, cli.output).await,
        Commands::Settings(args) => cmd_settings(args, ctx, cli.output),
    }
}
