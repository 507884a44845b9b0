//! Experiment commands

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand, ValueEnum};
use comfy_table::Cell;
use llm_eval_core::domain::{
    CostEstimate, CostQuoteRequest, DatasetId, Experiment, ExperimentId, ExperimentStatus,
    ParameterId, Project, MAX_WORKERS,
};
use llm_eval_core::wizard::{Wizard, WizardMode};
use llm_eval_sdk::{ExperimentHistory, LlmEvalClient};
use serde::Serialize;
use std::sync::Arc;

use super::report::{render_experiment, ScoringArgs};
use crate::context::Context;
use crate::output::{
    finish, format_relative_time, format_score, format_uuid_short, print_field, print_list_field,
    print_section, status_badge, TableDisplay,
};

/// Default number of backend workers per experiment
pub(crate) const DEFAULT_WORKERS: u32 = 4;

/// Experiment commands
#[derive(Debug, Args)]
pub struct ExperimentsCommands {
    #[command(subcommand)]
    pub command: ExperimentsSubcommand,
}

/// Status filter for `experiments list`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Running,
    Completed,
}

impl From<StatusFilter> for ExperimentStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Running => ExperimentStatus::Running,
            StatusFilter::Completed => ExperimentStatus::Completed,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ExperimentsSubcommand {
    /// List experiments of the active project, newest first
    List {
        /// Only show experiments with this status
        #[arg(short, long)]
        status: Option<StatusFilter>,
    },

    /// Show an experiment and its report
    Get {
        /// Experiment ID
        id: ExperimentId,

        /// Table width in columns for the report
        #[arg(long)]
        width: Option<u16>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// Quote and launch an experiment on an existing dataset
    Create {
        /// Experiment name
        #[arg(short, long)]
        name: String,

        /// Dataset to run against
        #[arg(short, long)]
        dataset: DatasetId,

        /// Parameter to evaluate (repeatable)
        #[arg(long = "parameter", required = true)]
        parameters: Vec<ParameterId>,

        /// Number of backend workers
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_WORKERS,
            value_parser = clap::value_parser!(u32).range(1..=MAX_WORKERS as i64)
        )]
        workers: u32,

        /// Accept the quoted price without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Quote the price of running parameters against a dataset
    Cost {
        /// Dataset to price
        #[arg(short, long)]
        dataset: DatasetId,

        /// Parameter to include (repeatable)
        #[arg(long = "parameter", required = true)]
        parameters: Vec<ParameterId>,
    },
}

/// Execute experiment commands
pub async fn execute(ctx: &Context, cmd: ExperimentsCommands) -> Result<()> {
    match cmd.command {
        ExperimentsSubcommand::List { status } => list(ctx, status.map(Into::into)).await,
        ExperimentsSubcommand::Get { id, width, scoring } => {
            get(ctx, id, width, &scoring).await
        }
        ExperimentsSubcommand::Create {
            name,
            dataset,
            parameters,
            workers,
            yes,
        } => create(ctx, &name, dataset, &parameters, workers, yes).await,
        ExperimentsSubcommand::Cost {
            dataset,
            parameters,
        } => cost(ctx, dataset, parameters).await,
    }
}

/// Displayable experiment for output
#[derive(Debug, Serialize)]
struct ExperimentDisplay {
    id: ExperimentId,
    name: String,
    status: ExperimentStatus,
    dataset_id: DatasetId,
    parameter_ids: Vec<ParameterId>,
    worker_count: u32,
    conversations: usize,
    mean_score: Option<f64>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Experiment> for ExperimentDisplay {
    fn from(e: &Experiment) -> Self {
        let scores: Vec<f64> = e.results().iter().filter_map(|r| r.mean_score()).collect();
        let mean_score = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
        Self {
            id: e.id,
            name: e.name.clone(),
            status: e.status(),
            dataset_id: e.dataset_id,
            parameter_ids: e.parameter_ids.clone(),
            worker_count: e.worker_count,
            conversations: e.results().len(),
            mean_score,
            created_at: e.created_at,
        }
    }
}

impl TableDisplay for ExperimentDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(format_uuid_short(self.id.as_uuid())),
            Cell::new(&self.name),
            Cell::new(status_badge(&self.status.to_string())),
            Cell::new(self.conversations),
            Cell::new(self.mean_score.map(format_score).unwrap_or_else(|| "-".to_string())),
            Cell::new(format_relative_time(&self.created_at)),
        ]
    }

    fn display_single(&self) {
        print_section("Experiment");
        print_field("ID", &self.id.to_string());
        print_field("Name", &self.name);
        print_field("Status", &status_badge(&self.status.to_string()));
        print_field("Dataset", &self.dataset_id.to_string());
        print_list_field(
            "Parameters",
            &self.parameter_ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
        );
        print_field("Workers", &self.worker_count.to_string());
        print_field("Created", &format_relative_time(&self.created_at));
    }

    fn display_compact(&self) {
        println!("{}\t{}\t{}", self.id, self.name, self.status);
    }
}

async fn list(ctx: &Context, status: Option<ExperimentStatus>) -> Result<()> {
    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let mut history = ExperimentHistory::new(client, project.id);

    let spinner = ctx.output.spinner("Fetching experiments...");
    let loaded = history.refresh().await;
    finish(spinner);
    loaded.context("Failed to load experiments")?;

    let rows: Vec<ExperimentDisplay> = match status {
        Some(status) => history.with_status(status).map(ExperimentDisplay::from).collect(),
        None => history.items().iter().map(ExperimentDisplay::from).collect(),
    };
    ctx.output.write_list(
        &rows,
        &["ID", "Name", "Status", "Conversations", "Mean score", "Created"],
    )
}

async fn get(ctx: &Context, id: ExperimentId, width: Option<u16>, scoring: &ScoringArgs) -> Result<()> {
    let options = scoring.options()?;
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Fetching experiment...");
    let result = client.experiments().get(id).await;
    finish(spinner);
    let experiment = result.context("Failed to get experiment")?;

    if !ctx.output.is_interactive() {
        return ctx.output.write(&ExperimentDisplay::from(&experiment));
    }
    ExperimentDisplay::from(&experiment).display_single();
    render_experiment(ctx, &experiment, width, &options)
}

/// Quoted price as shown to the user
#[derive(Debug, Serialize)]
struct Quoted<'a> {
    dataset_id: DatasetId,
    parameter_ids: &'a [ParameterId],
    #[serde(flatten)]
    estimate: &'a CostEstimate,
}

pub(crate) fn format_price(estimate: &CostEstimate) -> String {
    match &estimate.currency {
        Some(currency) => format!("{} {}", estimate.price, currency.to_uppercase()),
        None => format!("${}", estimate.price),
    }
}

async fn cost(ctx: &Context, dataset: DatasetId, parameters: Vec<ParameterId>) -> Result<()> {
    let client = ctx.create_client().await?;
    let request = CostQuoteRequest {
        dataset_id: dataset,
        parameter_ids: parameters,
    };

    let spinner = ctx.output.spinner("Calculating cost...");
    let result = client.experiments().calculate_cost(&request).await;
    finish(spinner);
    let estimate = result.context("Failed to calculate cost")?;

    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&Quoted {
            dataset_id: request.dataset_id,
            parameter_ids: &request.parameter_ids,
            estimate: &estimate,
        });
    }
    print_field("Estimated cost", &format_price(&estimate));
    Ok(())
}

async fn create(
    ctx: &Context,
    name: &str,
    dataset: DatasetId,
    parameters: &[ParameterId],
    workers: u32,
    yes: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Experiment name must not be empty");
    }
    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    if project.target_endpoint().is_none() {
        ctx.output.warning(&format!(
            "Project '{}' has no test endpoint; set one with 'llm-eval projects update'",
            project.name
        ));
    }

    let mut wizard = open_wizard(client, project, dataset).await?;
    for id in parameters {
        wizard
            .select_parameter(*id)
            .with_context(|| format!("Parameter {} is not part of this project", id))?;
    }

    let spinner = ctx.output.spinner("Calculating cost...");
    let quoted = wizard.request_quote().await;
    finish(spinner);
    let estimate = quoted.context("Failed to calculate cost")?;

    ctx.output
        .info(&format!("Estimated cost: {}", format_price(&estimate)));
    if !super::confirm("Launch the experiment at this price?", yes)? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    let spinner = ctx.output.spinner("Launching experiment...");
    let submitted = wizard.submit(name, workers).await;
    finish(spinner);
    let experiment = submitted.context("Failed to create experiment")?;

    ctx.output.success(&format!(
        "Experiment '{}' launched ({})",
        experiment.name, experiment.id
    ));
    ctx.output.write(&ExperimentDisplay::from(&experiment))
}

/// A wizard opened straight at parameter selection for `dataset`.
pub(crate) async fn open_wizard(
    client: LlmEvalClient,
    project: Project,
    dataset: DatasetId,
) -> Result<Wizard<LlmEvalClient>> {
    let mut wizard = Wizard::new(Arc::new(client), project, WizardMode::CreateExperiment);
    wizard.start().await.context("Failed to load parameters")?;
    wizard.select_dataset(dataset)?;
    Ok(wizard)
}
