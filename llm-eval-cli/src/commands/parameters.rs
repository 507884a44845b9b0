//! Evaluation parameter commands

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use llm_eval_core::domain::{NewParameter, Parameter, ParameterId, Tolerance};
use llm_eval_sdk::ParameterList;
use serde::Serialize;

use crate::context::Context;
use crate::output::{
    finish, format_relative_time, format_uuid_short, print_field, print_section, TableDisplay,
};

/// Evaluation parameter commands
#[derive(Debug, Args)]
pub struct ParametersCommands {
    #[command(subcommand)]
    pub command: ParametersSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ParametersSubcommand {
    /// List parameters of the active project
    List,

    /// Create a parameter
    Create {
        /// Parameter name, e.g. "Accuracy"
        #[arg(short, long)]
        name: String,

        /// What the judge should look for
        #[arg(short, long, default_value = "")]
        description: String,

        /// Leniency between 0 (strict) and 1 (lenient)
        #[arg(short, long, default_value = "0.5")]
        tolerance: String,
    },

    /// Update a parameter
    Update {
        /// Parameter ID
        id: ParameterId,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New tolerance between 0 and 1
        #[arg(short, long)]
        tolerance: Option<String>,
    },

    /// Delete a parameter
    Delete {
        /// Parameter ID
        id: ParameterId,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Execute parameter commands
pub async fn execute(ctx: &Context, cmd: ParametersCommands) -> Result<()> {
    match cmd.command {
        ParametersSubcommand::List => list(ctx).await,
        ParametersSubcommand::Create {
            name,
            description,
            tolerance,
        } => create(ctx, &name, &description, &tolerance).await,
        ParametersSubcommand::Update {
            id,
            name,
            description,
            tolerance,
        } => update(ctx, id, name, description, tolerance).await,
        ParametersSubcommand::Delete { id, force } => delete(ctx, id, force).await,
    }
}

/// Displayable parameter for output
#[derive(Debug, Serialize)]
pub(crate) struct ParameterDisplay {
    id: ParameterId,
    name: String,
    description: String,
    tolerance: Tolerance,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Parameter> for ParameterDisplay {
    fn from(p: &Parameter) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            tolerance: p.tolerance,
            created_at: p.created_at,
        }
    }
}

impl TableDisplay for ParameterDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(format_uuid_short(self.id.as_uuid())),
            Cell::new(&self.name),
            Cell::new(self.tolerance),
            Cell::new(truncate(&self.description, 48)),
        ]
    }

    fn display_single(&self) {
        print_section("Parameter");
        print_field("ID", &self.id.to_string());
        print_field("Name", &self.name);
        print_field("Tolerance", &self.tolerance.to_string());
        print_field(
            "Description",
            if self.description.is_empty() { "-" } else { &self.description },
        );
        print_field("Created", &format_relative_time(&self.created_at));
    }

    fn display_compact(&self) {
        println!("{}\t{}\t{}", self.id, self.name, self.tolerance);
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

pub(crate) const PARAMETER_HEADERS: [&str; 4] = ["ID", "Name", "Tolerance", "Description"];

async fn list(ctx: &Context) -> Result<()> {
    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let mut parameters = ParameterList::new(client, project.id);

    let spinner = ctx.output.spinner("Fetching parameters...");
    let loaded = parameters.refresh().await;
    finish(spinner);
    loaded.context("Failed to load parameters")?;

    let rows: Vec<ParameterDisplay> = parameters.items().iter().map(ParameterDisplay::from).collect();
    ctx.output.write_list(&rows, &PARAMETER_HEADERS)
}

async fn create(ctx: &Context, name: &str, description: &str, tolerance: &str) -> Result<()> {
    // Validate input before any network traffic.
    tolerance.parse::<Tolerance>()?;

    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let request = NewParameter::parse(project.id, name, description, tolerance)?;

    let mut parameters = ParameterList::new(client, project.id);
    let spinner = ctx.output.spinner("Creating parameter...");
    let result = parameters.create(&request).await;
    finish(spinner);
    let parameter = result.context("Failed to create parameter")?;

    ctx.output
        .success(&format!("Created parameter '{}' ({})", parameter.name, parameter.id));
    ctx.output.write(&ParameterDisplay::from(&parameter))
}

async fn update(
    ctx: &Context,
    id: ParameterId,
    name: Option<String>,
    description: Option<String>,
    tolerance: Option<String>,
) -> Result<()> {
    let tolerance = tolerance.map(|t| t.parse::<Tolerance>()).transpose()?;

    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let mut parameters = ParameterList::new(client, project.id);
    parameters
        .refresh()
        .await
        .context("Failed to load parameters")?;

    let mut parameter = parameters
        .items()
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .with_context(|| format!("Parameter {} not found in project '{}'", id, project.name))?;

    if let Some(name) = name {
        let validated = NewParameter::parse(project.id, name, "", &parameter.tolerance.to_string())?;
        parameter.name = validated.name;
    }
    if let Some(description) = description {
        parameter.description = description;
    }
    if let Some(tolerance) = tolerance {
        parameter.tolerance = tolerance;
    }

    let spinner = ctx.output.spinner("Updating parameter...");
    let result = parameters.update(&parameter).await;
    finish(spinner);
    let updated = result.context("Failed to update parameter")?;

    ctx.output.success("Parameter updated");
    ctx.output.write(&ParameterDisplay::from(&updated))
}

async fn delete(ctx: &Context, id: ParameterId, force: bool) -> Result<()> {
    if !super::confirm(&format!("Delete parameter {}?", id), force)? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Deleting parameter...");
    let result = client.parameters().delete(id).await;
    finish(spinner);
    result.context("Failed to delete parameter")?;

    ctx.output.success(&format!("Deleted parameter {}", id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long description", 10), "a very ...");
    }
}
