//! Project commands

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use llm_eval_core::domain::{LabratConfig, NewProject, Project, ProjectId};
use llm_eval_sdk::ProjectCollection;
use serde::Serialize;

use crate::config::CliConfig;
use crate::context::Context;
use crate::output::{
    finish, format_relative_time, format_uuid_short, print_field, print_optional_field,
    print_section, TableDisplay,
};

/// Project management commands
#[derive(Debug, Args)]
pub struct ProjectsCommands {
    #[command(subcommand)]
    pub command: ProjectsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ProjectsSubcommand {
    /// List projects
    List,

    /// Show one project
    Get {
        /// Project ID or name
        project: String,
    },

    /// Create a project
    Create {
        /// Project name
        #[arg(short, long)]
        name: String,

        /// Endpoint of the chatbot under test
        #[arg(long)]
        endpoint: Option<String>,

        /// API key sent to the chatbot under test
        #[arg(long, env = "LLM_EVAL_TARGET_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Make this the profile's default project
        #[arg(long)]
        activate: bool,
    },

    /// Update a project
    Update {
        /// Project ID or name
        project: String,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New chatbot endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// New chatbot API key
        #[arg(long, hide_env_values = true)]
        api_key: Option<String>,

        /// Route test traffic through a custom harness endpoint
        #[arg(long)]
        harness_endpoint: Option<String>,

        /// Header for the harness endpoint, as NAME=VALUE (repeatable)
        #[arg(long = "harness-header", value_parser = parse_header)]
        harness_headers: Vec<(String, String)>,
    },

    /// Delete a project
    Delete {
        /// Project ID or name
        project: String,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Make a project the default for this profile
    Use {
        /// Project ID or name
        project: String,
    },
}

/// Execute project commands
pub async fn execute(ctx: &Context, cmd: ProjectsCommands) -> Result<()> {
    match cmd.command {
        ProjectsSubcommand::List => list(ctx).await,
        ProjectsSubcommand::Get { project } => get(ctx, &project).await,
        ProjectsSubcommand::Create {
            name,
            endpoint,
            api_key,
            activate,
        } => create(ctx, name, endpoint, api_key, activate).await,
        ProjectsSubcommand::Update {
            project,
            name,
            endpoint,
            api_key,
            harness_endpoint,
            harness_headers,
        } => {
            let changes = ProjectChanges {
                name,
                endpoint,
                api_key,
                harness_endpoint,
                harness_headers,
            };
            update(ctx, &project, changes).await
        }
        ProjectsSubcommand::Delete { project, force } => delete(ctx, &project, force).await,
        ProjectsSubcommand::Use { project } => use_project(ctx, &project).await,
    }
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", raw))?;
    if name.trim().is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.trim().to_string(), value.to_string()))
}

/// Displayable project for output
#[derive(Debug, Serialize)]
struct ProjectDisplay {
    id: ProjectId,
    name: String,
    test_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    harness_endpoint: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    active: bool,
}

impl ProjectDisplay {
    fn new(project: &Project, active: Option<ProjectId>) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            test_endpoint: project.test_endpoint.clone(),
            harness_endpoint: project.labrat.as_ref().map(|l| l.endpoint.clone()),
            created_at: project.created_at,
            active: active == Some(project.id),
        }
    }
}

impl TableDisplay for ProjectDisplay {
    fn to_row(&self) -> Vec<Cell> {
        let marker = if self.active { "*" } else { "" };
        vec![
            Cell::new(marker),
            Cell::new(format_uuid_short(self.id.as_uuid())),
            Cell::new(&self.name),
            Cell::new(if self.test_endpoint.is_empty() { "-" } else { &self.test_endpoint }),
            Cell::new(format_relative_time(&self.created_at)),
        ]
    }

    fn display_single(&self) {
        print_section("Project");
        print_field("ID", &self.id.to_string());
        print_field("Name", &self.name);
        print_field("Test endpoint", if self.test_endpoint.is_empty() { "-" } else { &self.test_endpoint });
        print_optional_field("Harness endpoint", self.harness_endpoint.as_deref());
        print_field("Created", &format_relative_time(&self.created_at));
        if self.active {
            print_field("Active", "yes");
        }
    }

    fn display_compact(&self) {
        println!("{}\t{}\t{}", self.id, self.name, self.test_endpoint);
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let client = ctx.create_client().await?;
    let preferred = ctx.project_selector().and_then(|s| s.parse().ok());
    let mut projects = ProjectCollection::new(client).with_active(preferred);

    let spinner = ctx.output.spinner("Fetching projects...");
    let loaded = projects.load().await;
    finish(spinner);
    loaded.context("Failed to load projects")?;

    let active = projects.active().map(|p| p.id);
    let rows: Vec<ProjectDisplay> = projects
        .projects()
        .iter()
        .map(|p| ProjectDisplay::new(p, active))
        .collect();
    ctx.output
        .write_list(&rows, &["", "ID", "Name", "Test endpoint", "Created"])
}

async fn get(ctx: &Context, selector: &str) -> Result<()> {
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Fetching project...");
    let found = ctx.find_project(&client, selector).await;
    finish(spinner);
    let project = found?;

    let active = ctx.project_selector().and_then(|s| s.parse().ok());
    ctx.output.write(&ProjectDisplay::new(&project, active))
}

async fn create(
    ctx: &Context,
    name: String,
    endpoint: Option<String>,
    api_key: Option<String>,
    activate: bool,
) -> Result<()> {
    let client = ctx.create_client().await?;
    let request = NewProject {
        name: name.trim().to_string(),
        api_key: api_key.unwrap_or_default(),
        test_endpoint: endpoint.unwrap_or_default(),
        labrat: None,
    };

    let mut projects = ProjectCollection::new(client);
    let spinner = ctx.output.spinner("Creating project...");
    let created = projects.create(&request).await.cloned();
    finish(spinner);
    let project = created.context("Failed to create project")?;

    ctx.output
        .success(&format!("Created project '{}' ({})", project.name, project.id));
    if activate {
        set_default_project(ctx, &project)?;
    }
    ctx.output.write(&ProjectDisplay::new(&project, activate.then_some(project.id)))
}

struct ProjectChanges {
    name: Option<String>,
    endpoint: Option<String>,
    api_key: Option<String>,
    harness_endpoint: Option<String>,
    harness_headers: Vec<(String, String)>,
}

impl ProjectChanges {
    fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name.trim().to_string();
        }
        if let Some(endpoint) = self.endpoint {
            project.test_endpoint = endpoint;
        }
        if let Some(key) = self.api_key {
            project.api_key = key;
        }
        match self.harness_endpoint {
            Some(endpoint) if endpoint.trim().is_empty() => project.labrat = None,
            Some(endpoint) => {
                project.labrat = Some(LabratConfig {
                    endpoint,
                    headers: self.harness_headers.into_iter().collect(),
                })
            }
            None if !self.harness_headers.is_empty() => {
                let labrat = project.labrat.get_or_insert_with(LabratConfig::default);
                labrat.headers.extend(self.harness_headers);
            }
            None => {}
        }
    }
}

async fn update(ctx: &Context, selector: &str, changes: ProjectChanges) -> Result<()> {
    let client = ctx.create_client().await?;
    let mut project = ctx.find_project(&client, selector).await?;
    changes.apply(&mut project);

    let mut projects = ProjectCollection::new(client);
    let spinner = ctx.output.spinner("Updating project...");
    let updated = projects.update(&project).await;
    finish(spinner);
    let project = updated.context("Failed to update project")?;

    ctx.output.success("Project updated");
    ctx.output.write(&ProjectDisplay::new(&project, None))
}

async fn delete(ctx: &Context, selector: &str, force: bool) -> Result<()> {
    let client = ctx.create_client().await?;
    let project = ctx.find_project(&client, selector).await?;

    let prompt = format!(
        "Delete project '{}'? Its datasets, parameters and experiments go with it.",
        project.name
    );
    if !super::confirm(&prompt, force)? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    let mut projects = ProjectCollection::new(client);
    let spinner = ctx.output.spinner("Deleting project...");
    let deleted = projects.delete(project.id).await;
    finish(spinner);
    deleted.context("Failed to delete project")?;

    ctx.output
        .success(&format!("Deleted project '{}'", project.name));
    Ok(())
}

async fn use_project(ctx: &Context, selector: &str) -> Result<()> {
    let client = ctx.create_client().await?;
    let project = ctx.find_project(&client, selector).await?;
    set_default_project(ctx, &project)?;
    Ok(())
}

fn set_default_project(ctx: &Context, project: &Project) -> Result<()> {
    let mut config: CliConfig = ctx.config.clone();
    config.get_or_create_profile(&ctx.profile_name).default_project = Some(project.id.to_string());
    config.save()?;
    ctx.output.success(&format!(
        "Now working in project '{}' (profile '{}')",
        project.name, ctx.profile_name
    ));
    Ok(())
}
