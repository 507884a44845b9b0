//! Command-line argument definitions

use clap::{Parser, Subcommand};

use crate::commands::{
    auth::AuthCommands, config::ConfigCommands, datasets::DatasetsCommands,
    experiments::ExperimentsCommands, parameters::ParametersCommands, projects::ProjectsCommands,
    report::ReportCommands, wizard::WizardCommands,
};
use crate::output::OutputFormat;

/// Configure, run and review LLM evaluation experiments
#[derive(Debug, Parser)]
#[command(name = "llm-eval", version, about, propagate_version = true)]
pub struct Cli {
    /// Configuration profile to use
    #[arg(short, long, global = true, env = "LLM_EVAL_PROFILE")]
    pub profile: Option<String>,

    /// Output format (defaults to the configured setting, then table)
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Backend base URL (overrides the profile)
    #[arg(long, global = true, env = "LLM_EVAL_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token to use instead of the stored session
    #[arg(long, global = true, env = "LLM_EVAL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Project to work in (overrides the profile's default project)
    #[arg(long, global = true, env = "LLM_EVAL_PROJECT")]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in, sign out and inspect the session
    Auth(AuthCommands),

    /// Manage profiles and settings
    Config(ConfigCommands),

    /// Manage projects
    Projects(ProjectsCommands),

    /// Manage datasets
    Datasets(DatasetsCommands),

    /// Manage evaluation parameters
    Parameters(ParametersCommands),

    /// Launch and inspect experiments
    Experiments(ExperimentsCommands),

    /// Render or export an experiment report
    Report(ReportCommands),

    /// Guided flow from seed conversations to a launched experiment
    Wizard(WizardCommands),
}
