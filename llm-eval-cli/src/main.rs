use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod config;
mod context;
mod output;

use cli::{Cli, Command};
use context::Context;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "llm_eval=debug,llm_eval_sdk=debug,llm_eval_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::new(&cli)?;
    tracing::debug!(profile = ctx.profile_label(), api_url = %ctx.api_url(), "context ready");

    let result = match cli.command {
        Command::Auth(cmd) => commands::auth::execute(&ctx, cmd).await,
        Command::Config(cmd) => commands::config::execute(&ctx, cmd).await,
        Command::Projects(cmd) => commands::projects::execute(&ctx, cmd).await,
        Command::Datasets(cmd) => commands::datasets::execute(&ctx, cmd).await,
        Command::Parameters(cmd) => commands::parameters::execute(&ctx, cmd).await,
        Command::Experiments(cmd) => commands::experiments::execute(&ctx, cmd).await,
        Command::Report(cmd) => commands::report::execute(&ctx, cmd).await,
        Command::Wizard(cmd) => commands::wizard::execute(&ctx, cmd).await,
    };

    // A token refreshed during the command is written back even if the
    // command itself failed.
    ctx.persist_session().await?;
    result
}
