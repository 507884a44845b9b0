//! Dataset commands

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::Cell;
use llm_eval_core::domain::{Conversation, Dataset, DatasetId, Message, Role};
use llm_eval_core::wizard::{SeedCall, SeedInput};
use llm_eval_sdk::{DatasetList, NewDataset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::output::{
    finish, format_relative_time, format_uuid_short, print_field, print_section, status_badge,
    TableDisplay,
};

/// Dataset management commands
#[derive(Debug, Args)]
pub struct DatasetsCommands {
    #[command(subcommand)]
    pub command: DatasetsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum DatasetsSubcommand {
    /// List datasets of the active project
    List,

    /// Show a dataset
    Get {
        /// Dataset ID
        id: DatasetId,

        /// Print every conversation
        #[arg(long)]
        conversations: bool,
    },

    /// Upload conversations from a JSON file as a new dataset
    Upload {
        /// JSON file: an array of conversations, or {"name", "conversations"}
        file: PathBuf,

        /// Dataset name (defaults to the name in the file, then the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Start generating a dataset from hand-written samples
    Generate {
        /// Name of the new dataset
        #[arg(short, long)]
        name: String,

        /// JSON file with the seed conversations
        #[arg(short, long)]
        samples_file: PathBuf,

        /// Number of conversations to generate
        #[arg(short, long, default_value = "10")]
        count: u32,

        /// Extra guidance for the generator
        #[arg(short, long)]
        instructions: Option<String>,
    },

    /// Start adding generated conversations to an existing dataset
    Extend {
        /// Dataset ID
        #[arg(short, long)]
        dataset: DatasetId,

        /// Number of conversations to add
        #[arg(short, long, default_value = "10")]
        count: u32,
    },

    /// Check once whether a generation job has finished
    Status {
        /// Dataset ID returned by generate or extend
        id: DatasetId,
    },

    /// Write a dataset's conversations to a JSON file
    Download {
        /// Dataset ID
        id: DatasetId,

        /// Output file (defaults to <name>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete a dataset
    Delete {
        /// Dataset ID
        id: DatasetId,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Execute dataset commands
pub async fn execute(ctx: &Context, cmd: DatasetsCommands) -> Result<()> {
    match cmd.command {
        DatasetsSubcommand::List => list(ctx).await,
        DatasetsSubcommand::Get { id, conversations } => get(ctx, id, conversations).await,
        DatasetsSubcommand::Upload { file, name } => upload(ctx, &file, name).await,
        DatasetsSubcommand::Generate {
            name,
            samples_file,
            count,
            instructions,
        } => {
            let samples = read_conversations(&samples_file)?.conversations;
            let mut seed = SeedInput::manual(name, samples, count);
            if let Some(text) = instructions {
                seed = seed.with_instructions(text);
            }
            start_job(ctx, seed).await
        }
        DatasetsSubcommand::Extend { dataset, count } => {
            start_job(ctx, SeedInput::extend(Some(dataset), count)).await
        }
        DatasetsSubcommand::Status { id } => status(ctx, id).await,
        DatasetsSubcommand::Download { id, out } => download(ctx, id, out).await,
        DatasetsSubcommand::Delete { id, force } => delete(ctx, id, force).await,
    }
}

/// Displayable dataset for output
#[derive(Debug, Serialize)]
struct DatasetDisplay {
    id: DatasetId,
    name: String,
    status: &'static str,
    conversation_count: usize,
    message_count: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversations: Option<Vec<Conversation>>,
}

impl DatasetDisplay {
    fn new(dataset: &Dataset, with_conversations: bool) -> Self {
        Self {
            id: dataset.id,
            name: dataset.name.clone(),
            status: generation_status(dataset),
            conversation_count: dataset.conversations.len(),
            message_count: dataset.message_count(),
            created_at: dataset.created_at,
            conversations: with_conversations.then(|| dataset.conversations.clone()),
        }
    }
}

fn generation_status(dataset: &Dataset) -> &'static str {
    if dataset.is_generated() {
        "ready"
    } else {
        "generating"
    }
}

impl TableDisplay for DatasetDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(format_uuid_short(self.id.as_uuid())),
            Cell::new(&self.name),
            Cell::new(status_badge(self.status)),
            Cell::new(self.conversation_count),
            Cell::new(self.message_count),
            Cell::new(format_relative_time(&self.created_at)),
        ]
    }

    fn display_single(&self) {
        print_section("Dataset");
        print_field("ID", &self.id.to_string());
        print_field("Name", &self.name);
        print_field("Status", &status_badge(self.status));
        print_field("Conversations", &self.conversation_count.to_string());
        print_field("Messages", &self.message_count.to_string());
        print_field("Created", &format_relative_time(&self.created_at));

        if let Some(conversations) = &self.conversations {
            for (idx, conv) in conversations.iter().enumerate() {
                print_section(&format!("Conversation {}", idx + 1));
                print_messages(&conv.messages);
            }
        }
    }

    fn display_compact(&self) {
        println!(
            "{}\t{}\t{}\t{}",
            self.id, self.name, self.status, self.conversation_count
        );
    }
}

pub(crate) fn print_messages(messages: &[Message]) {
    for (idx, msg) in messages.iter().enumerate() {
        let role = match msg.role {
            Role::User => msg.role.to_string().cyan(),
            Role::Assistant => msg.role.to_string().magenta(),
        };
        let content = if msg.is_blank() {
            "(empty)".dimmed().to_string()
        } else {
            msg.content.clone()
        };
        println!("  {:>2}. [{}] {}", idx + 1, role, content);
    }
}

/// Conversations as read from a user-supplied file.
pub(crate) struct ConversationsFile {
    pub name: Option<String>,
    pub conversations: Vec<Conversation>,
}

/// Accepted file layouts. A conversation may be written as an object with
/// `messages` or as a bare array of messages.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileLayout {
    Wrapped {
        #[serde(default)]
        name: Option<String>,
        #[serde(alias = "data")]
        conversations: Vec<FileConversation>,
    },
    Bare(Vec<FileConversation>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileConversation {
    Full(Conversation),
    Messages(Vec<Message>),
}

impl From<FileConversation> for Conversation {
    fn from(conv: FileConversation) -> Self {
        match conv {
            FileConversation::Full(c) => c,
            FileConversation::Messages(m) => Conversation::new(m),
        }
    }
}

pub(crate) fn parse_conversations(raw: &str) -> Result<ConversationsFile> {
    let layout: FileLayout = serde_json::from_str(raw)
        .context("Expected a JSON array of conversations or an object with \"conversations\"")?;
    let (name, conversations) = match layout {
        FileLayout::Wrapped { name, conversations } => (name, conversations),
        FileLayout::Bare(conversations) => (None, conversations),
    };
    Ok(ConversationsFile {
        name,
        conversations: conversations.into_iter().map(Conversation::from).collect(),
    })
}

pub(crate) fn read_conversations(path: &Path) -> Result<ConversationsFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_conversations(&raw).with_context(|| format!("Invalid conversations file {}", path.display()))
}

async fn list(ctx: &Context) -> Result<()> {
    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let mut datasets = DatasetList::new(client, project.id);

    let spinner = ctx.output.spinner("Fetching datasets...");
    let loaded = datasets.refresh().await;
    finish(spinner);
    loaded.context("Failed to load datasets")?;

    let rows: Vec<DatasetDisplay> = datasets
        .items()
        .iter()
        .map(|d| DatasetDisplay::new(d, false))
        .collect();
    ctx.output.write_list(
        &rows,
        &["ID", "Name", "Status", "Conversations", "Messages", "Created"],
    )
}

async fn get(ctx: &Context, id: DatasetId, conversations: bool) -> Result<()> {
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Fetching dataset...");
    let result = client.datasets().get(id).await;
    finish(spinner);
    let dataset = result.context("Failed to get dataset")?;

    ctx.output.write(&DatasetDisplay::new(&dataset, conversations))
}

async fn upload(ctx: &Context, file: &Path, name: Option<String>) -> Result<()> {
    let parsed = read_conversations(file)?;
    let name = name
        .or(parsed.name)
        .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();

    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let request = NewDataset::new(name.trim(), project.id, parsed.conversations);
    request.validate()?;

    let mut datasets = DatasetList::new(client, project.id);
    let spinner = ctx.output.spinner("Uploading dataset...");
    let result = datasets.upload(&request).await;
    finish(spinner);
    let dataset = result.context("Failed to upload dataset")?;

    ctx.output.success(&format!(
        "Uploaded dataset '{}' with {} conversation(s)",
        dataset.name,
        dataset.conversations.len()
    ));
    ctx.output.write(&DatasetDisplay::new(&dataset, false))
}

/// Result of accepting a generation job
#[derive(Debug, Serialize)]
struct JobStarted {
    dataset_id: DatasetId,
    sample_count: u32,
}

async fn start_job(ctx: &Context, seed: SeedInput) -> Result<()> {
    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    let call = SeedCall::build(&seed, project.id)?;

    let spinner = ctx.output.spinner("Starting generation job...");
    let result = match &call {
        SeedCall::Generate(req) => client.datasets().generate(req).await,
        SeedCall::Extend(req) => client.datasets().extend(req).await,
    };
    finish(spinner);
    let dataset_id = result.context("Failed to start generation job")?;

    let started = JobStarted {
        dataset_id,
        sample_count: seed.sample_count(),
    };
    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&started);
    }
    ctx.output.success(&format!(
        "Generation of {} conversation(s) started for dataset {}",
        started.sample_count, dataset_id
    ));
    ctx.output.info(&format!(
        "Check progress with 'llm-eval datasets status {}'",
        dataset_id
    ));
    Ok(())
}

async fn status(ctx: &Context, id: DatasetId) -> Result<()> {
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Checking generation status...");
    let result = client.datasets().get(id).await;
    finish(spinner);
    let dataset = result.context("Failed to check dataset")?;

    if !ctx.output.is_interactive() {
        return ctx.output.write(&DatasetDisplay::new(&dataset, false));
    }
    if dataset.is_generated() {
        ctx.output.success(&format!(
            "Dataset '{}' is ready with {} conversation(s)",
            dataset.name,
            dataset.conversations.len()
        ));
    } else {
        ctx.output.info(&format!(
            "Dataset '{}' is still generating; check again later",
            dataset.name
        ));
    }
    Ok(())
}

async fn download(ctx: &Context, id: DatasetId, out: Option<PathBuf>) -> Result<()> {
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Fetching dataset...");
    let result = client.datasets().get(id).await;
    finish(spinner);
    let dataset = result.context("Failed to get dataset")?;

    let path = out.unwrap_or_else(|| PathBuf::from(format!("{}.json", file_safe(&dataset.name))));
    let body = serde_json::json!({
        "name": dataset.name,
        "conversations": dataset.conversations,
    });
    std::fs::write(&path, serde_json::to_string_pretty(&body)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    ctx.output.success(&format!(
        "Wrote {} conversation(s) to {}",
        dataset.conversations.len(),
        path.display()
    ));
    Ok(())
}

async fn delete(ctx: &Context, id: DatasetId, force: bool) -> Result<()> {
    if !super::confirm(&format!("Delete dataset {}?", id), force)? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Deleting dataset...");
    let result = client.datasets().delete(id).await;
    finish(spinner);
    result.context("Failed to delete dataset")?;

    ctx.output.success(&format!("Deleted dataset {}", id));
    Ok(())
}

fn file_safe(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "dataset".to_string()
    } else {
        cleaned
    }
}
