//! Interactive wizard: seed samples, review the generated dataset, pick
//! parameters and launch an experiment.
//!
//! The prompts here only collect input. Every transition goes through
//! [`llm_eval_core::wizard::Wizard`], which owns the state machine, so a
//! failed call leaves the user on the step they were on.

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use llm_eval_core::domain::{Conversation, DatasetId, Message, Role, Tolerance, MAX_WORKERS};
use llm_eval_core::wizard::{
    GenerationState, SeedInput, Wizard, WizardMode, WizardOutcome, WizardState, MAX_SAMPLE_COUNT,
};
use llm_eval_core::CoreError;
use llm_eval_sdk::LlmEvalClient;
use std::path::PathBuf;
use std::sync::Arc;

use super::datasets::{print_messages, read_conversations};
use super::experiments::{format_price, DEFAULT_WORKERS};
use crate::context::Context;
use crate::output::{finish, print_field, print_section};

/// Guided flows
#[derive(Debug, Args)]
pub struct WizardCommands {
    #[command(subcommand)]
    pub command: WizardSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum WizardSubcommand {
    /// Seed a dataset, review it, then launch an experiment on it
    QuickStart,

    /// Seed a dataset and stop once it is saved
    Synthesize,

    /// Launch an experiment on an existing dataset
    Experiment {
        /// Dataset to run against (chosen interactively when omitted)
        #[arg(short, long)]
        dataset: Option<DatasetId>,
    },
}

impl WizardSubcommand {
    fn mode(&self) -> WizardMode {
        match self {
            Self::QuickStart => WizardMode::QuickStart,
            Self::Synthesize => WizardMode::SynthesizeDataset,
            Self::Experiment { .. } => WizardMode::CreateExperiment,
        }
    }
}

/// Whether the prompt loop keeps going
enum Flow {
    Continue,
    Cancelled,
}

/// Execute the wizard
pub async fn execute(ctx: &Context, cmd: WizardCommands) -> Result<()> {
    if !ctx.output.is_interactive() {
        bail!("The wizard is interactive; run it with table output");
    }

    let client = ctx.create_client().await?;
    let project = ctx.active_project(&client).await?;
    ctx.output.info(&format!("Working in project '{}'", project.name));

    let mode = cmd.command.mode();
    let mut wizard = Wizard::new(Arc::new(client.clone()), project, mode);
    let spinner = ctx.output.spinner("Starting...");
    let started = wizard.start().await;
    finish(spinner);
    started.context("Failed to start the wizard")?;

    if let WizardSubcommand::Experiment { dataset } = cmd.command {
        let dataset = match dataset {
            Some(id) => id,
            None => match pick_dataset(ctx, &client, &wizard).await? {
                Some(id) => id,
                None => {
                    ctx.output.info("Wizard cancelled");
                    return Ok(());
                }
            },
        };
        wizard.select_dataset(dataset)?;
    }

    run(ctx, &client, &mut wizard).await
}

async fn run(ctx: &Context, client: &LlmEvalClient, wizard: &mut Wizard<LlmEvalClient>) -> Result<()> {
    loop {
        let state = wizard.state();
        if let Some(step) = state.step() {
            println!(
                "\n{} {}",
                format!("Step {}/3", step + 1).bold(),
                state.to_string().dimmed()
            );
        }

        let flow = match state {
            WizardState::Collecting => collect_seed(ctx, client, wizard).await?,
            WizardState::AwaitingGeneration(GenerationState::Pending) => await_generation(ctx, wizard).await?,
            WizardState::AwaitingGeneration(GenerationState::Ready) => review(ctx, wizard).await?,
            WizardState::SelectingParameters(_) => select_parameters(ctx, client, wizard).await?,
            WizardState::Submitted => {
                report_outcome(ctx, wizard);
                return Ok(());
            }
            WizardState::Idle => {
                bail!("Wizard is idle");
            }
        };

        if let Flow::Cancelled = flow {
            wizard.cancel();
            ctx.output.info("Wizard cancelled; nothing further was sent");
            return Ok(());
        }
    }
}

/// Shows a wizard error and keeps the user on the current step.
fn report_error(ctx: &Context, err: &CoreError) {
    ctx.output.error(&err.to_string());
}

fn choose(prompt: &str, items: &[&str]) -> Result<usize> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .context("Failed to read selection")
}

// ===== Step 1: seed =====

async fn collect_seed(
    ctx: &Context,
    client: &LlmEvalClient,
    wizard: &mut Wizard<LlmEvalClient>,
) -> Result<Flow> {
    let choice = choose(
        "How should the dataset be seeded?",
        &[
            "Write sample conversations",
            "Load sample conversations from a file",
            "Extend an existing dataset",
            "Cancel",
        ],
    )?;

    let seed = match choice {
        0 | 1 => {
            let samples = if choice == 0 {
                write_samples()?
            } else {
                let path: String = Input::new()
                    .with_prompt("Path to the JSON file")
                    .interact_text()
                    .context("Failed to read path")?;
                match read_conversations(&PathBuf::from(path.trim())) {
                    Ok(file) => file.conversations,
                    Err(e) => {
                        ctx.output.error(&format!("{:#}", e));
                        return Ok(Flow::Continue);
                    }
                }
            };
            let name: String = Input::new()
                .with_prompt("Dataset name")
                .interact_text()
                .context("Failed to read name")?;
            let count = prompt_count()?;
            let instructions: String = Input::new()
                .with_prompt("Instructions for the generator (optional)")
                .allow_empty(true)
                .interact_text()
                .context("Failed to read instructions")?;
            SeedInput::manual(name, samples, count).with_instructions(instructions)
        }
        2 => {
            let Some(dataset) = pick_dataset(ctx, client, wizard).await? else {
                return Ok(Flow::Continue);
            };
            SeedInput::extend(Some(dataset), prompt_count()?)
        }
        _ => return Ok(Flow::Cancelled),
    };

    let spinner = ctx.output.spinner("Starting generation...");
    let submitted = wizard.submit_seed(seed).await;
    finish(spinner);
    match submitted {
        Ok(id) => ctx.output.success(&format!(
            "Generation started for dataset {}. It runs in the background; check its status when ready.",
            id
        )),
        Err(e) => report_error(ctx, &e),
    }
    Ok(Flow::Continue)
}

fn prompt_count() -> Result<u32> {
    Input::<u32>::new()
        .with_prompt(format!("Conversations to generate (1-{})", MAX_SAMPLE_COUNT))
        .default(10)
        .validate_with(|n: &u32| {
            if (1..=MAX_SAMPLE_COUNT).contains(n) {
                Ok(())
            } else {
                Err(format!("enter a number between 1 and {}", MAX_SAMPLE_COUNT))
            }
        })
        .interact_text()
        .context("Failed to read count")
}

/// Prompts for conversations turn by turn. An empty message ends the
/// conversation.
fn write_samples() -> Result<Vec<Conversation>> {
    let mut samples = Vec::new();
    loop {
        println!("\n{}", format!("Sample conversation {}", samples.len() + 1).bold());
        let mut conversation = Conversation::new(Vec::new());
        loop {
            let role = conversation
                .messages
                .last()
                .map(|m| m.role.next())
                .unwrap_or(Role::User);
            let content: String = Input::new()
                .with_prompt(format!("{} (empty to finish)", role))
                .allow_empty(true)
                .interact_text()
                .context("Failed to read message")?;
            if content.trim().is_empty() {
                if conversation.messages.is_empty() {
                    continue;
                }
                break;
            }
            conversation.messages.push(Message::new(role, content));
        }
        samples.push(conversation);

        let more = Confirm::new()
            .with_prompt("Add another sample conversation?")
            .default(false)
            .interact()
            .context("Failed to read answer")?;
        if !more {
            return Ok(samples);
        }
    }
}

async fn pick_dataset(
    ctx: &Context,
    client: &LlmEvalClient,
    wizard: &Wizard<LlmEvalClient>,
) -> Result<Option<DatasetId>> {
    let spinner = ctx.output.spinner("Loading datasets...");
    let listed = client.datasets().list(wizard.project().id).await;
    finish(spinner);
    let datasets = listed.context("Failed to load datasets")?;
    if datasets.is_empty() {
        ctx.output.warning("This project has no datasets yet");
        return Ok(None);
    }

    let mut labels: Vec<String> = datasets
        .iter()
        .map(|d| format!("{} ({} conversations)", d.name, d.conversations.len()))
        .collect();
    labels.push("Back".to_string());
    let idx = Select::new()
        .with_prompt("Dataset")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read selection")?;
    Ok(datasets.get(idx).map(|d| d.id))
}

// ===== Step 2: wait and review =====

async fn await_generation(ctx: &Context, wizard: &mut Wizard<LlmEvalClient>) -> Result<Flow> {
    match choose("Dataset is generating", &["Check status", "Back", "Cancel"])? {
        0 => {
            let spinner = ctx.output.spinner("Checking...");
            let checked = wizard.check_status().await;
            finish(spinner);
            match checked {
                Ok(GenerationState::Ready) => ctx.output.success(&format!(
                    "Generated {} conversation(s)",
                    wizard.conversations().len()
                )),
                Ok(GenerationState::Pending) => ctx.output.info("Still generating; try again shortly"),
                Err(e) => report_error(ctx, &e),
            }
            Ok(Flow::Continue)
        }
        1 => {
            if let Err(e) = wizard.back().await {
                report_error(ctx, &e);
            }
            Ok(Flow::Continue)
        }
        _ => Ok(Flow::Cancelled),
    }
}

const REVIEW_ACTIONS: [&str; 10] = [
    "Accept dataset",
    "Show conversations",
    "Edit a message",
    "Switch a message's role",
    "Add a message",
    "Remove a message",
    "Add a conversation",
    "Remove a conversation",
    "Back",
    "Cancel",
];

async fn review(ctx: &Context, wizard: &mut Wizard<LlmEvalClient>) -> Result<Flow> {
    let summary = format!(
        "{} conversation(s), {} message(s)",
        wizard.conversations().len(),
        wizard.conversations().iter().map(|c| c.messages.len()).sum::<usize>()
    );
    let action = choose(&format!("Review dataset: {}", summary), &REVIEW_ACTIONS)?;

    let result = match action {
        0 => {
            let spinner = ctx.output.spinner("Saving dataset...");
            let accepted = wizard.accept_dataset().await;
            finish(spinner);
            accepted
        }
        1 => {
            for (idx, conv) in wizard.conversations().iter().enumerate() {
                print_section(&format!("Conversation {}", idx + 1));
                print_messages(&conv.messages);
            }
            Ok(())
        }
        2 => match pick_message(wizard)? {
            Some((c, m)) => {
                let current = wizard.conversations()[c].messages[m].content.clone();
                let content: String = Input::new()
                    .with_prompt("Content")
                    .with_initial_text(current)
                    .allow_empty(true)
                    .interact_text()
                    .context("Failed to read message")?;
                wizard.edit_message(c, m, content)
            }
            None => Ok(()),
        },
        3 => match pick_message(wizard)? {
            Some((c, m)) => {
                let role = wizard.conversations()[c].messages[m].role.next();
                wizard.set_message_role(c, m, role)
            }
            None => Ok(()),
        },
        4 => match pick_conversation(wizard, "Add to which conversation?")? {
            Some(c) => wizard.add_message(c).map(|m| {
                ctx.output
                    .info(&format!("Added empty message {}; edit it before accepting", m + 1))
            }),
            None => Ok(()),
        },
        5 => match pick_message(wizard)? {
            Some((c, m)) => wizard.remove_message(c, m).map(|_| ()),
            None => Ok(()),
        },
        6 => wizard.add_conversation().map(|c| {
            ctx.output
                .info(&format!("Added conversation {}; edit its message before accepting", c + 1))
        }),
        7 => match pick_conversation(wizard, "Remove which conversation?")? {
            Some(c) => wizard.remove_conversation(c).map(|_| ()),
            None => Ok(()),
        },
        8 => {
            let spinner = ctx.output.spinner("Saving edits...");
            let back = wizard.back().await;
            finish(spinner);
            back
        }
        _ => return Ok(Flow::Cancelled),
    };

    if let Err(e) = result {
        report_error(ctx, &e);
    }
    Ok(Flow::Continue)
}

fn pick_conversation(wizard: &Wizard<LlmEvalClient>, prompt: &str) -> Result<Option<usize>> {
    let mut labels: Vec<String> = wizard
        .conversations()
        .iter()
        .enumerate()
        .map(|(idx, conv)| {
            let opening = conv
                .messages
                .first()
                .map(|m| preview(&m.content))
                .unwrap_or_default();
            format!("{}. {}", idx + 1, opening)
        })
        .collect();
    labels.push("Back".to_string());
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read selection")?;
    Ok((idx < wizard.conversations().len()).then_some(idx))
}

fn pick_message(wizard: &Wizard<LlmEvalClient>) -> Result<Option<(usize, usize)>> {
    let Some(c) = pick_conversation(wizard, "Which conversation?")? else {
        return Ok(None);
    };
    let messages = &wizard.conversations()[c].messages;
    let mut labels: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(idx, m)| format!("{}. [{}] {}", idx + 1, m.role, preview(&m.content)))
        .collect();
    labels.push("Back".to_string());
    let idx = Select::new()
        .with_prompt("Which message?")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read selection")?;
    Ok((idx < messages.len()).then_some((c, idx)))
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "(empty)".to_string();
    }
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(57).collect::<String>())
    } else {
        line.to_string()
    }
}

// ===== Step 3: parameters, quote, launch =====

async fn select_parameters(
    ctx: &Context,
    client: &LlmEvalClient,
    wizard: &mut Wizard<LlmEvalClient>,
) -> Result<Flow> {
    let selected = wizard.selected_parameters().len();
    match wizard.quote() {
        Some(quote) => print_field("Estimated cost", &format_price(&quote.estimate)),
        None => print_field("Estimated cost", "not quoted"),
    }

    let mut actions = vec![
        "Choose parameters",
        "Create a parameter",
        "Reload parameters",
        "Get a cost estimate",
    ];
    if wizard.can_submit() {
        actions.push("Launch experiment");
    }
    if wizard.mode() == WizardMode::CreateExperiment {
        actions.push("Change dataset");
    } else {
        actions.push("Back");
    }
    actions.push("Cancel");

    let idx = choose(&format!("{} parameter(s) selected", selected), &actions)?;
    let result = match actions[idx] {
        "Choose parameters" => choose_parameters(wizard),
        "Create a parameter" => create_parameter(ctx, wizard).await?,
        "Reload parameters" => {
            let spinner = ctx.output.spinner("Loading parameters...");
            let refreshed = wizard.refresh_parameters().await;
            finish(spinner);
            refreshed
        }
        "Get a cost estimate" => {
            let spinner = ctx.output.spinner("Calculating cost...");
            let quoted = wizard.request_quote().await;
            finish(spinner);
            quoted.map(|estimate| {
                ctx.output
                    .success(&format!("Estimated cost: {}", format_price(&estimate)))
            })
        }
        "Launch experiment" => return launch(ctx, wizard).await,
        "Change dataset" => match pick_dataset(ctx, client, wizard).await? {
            Some(id) => wizard.select_dataset(id),
            None => Ok(()),
        },
        "Back" => wizard.back().await,
        _ => return Ok(Flow::Cancelled),
    };

    if let Err(e) = result {
        report_error(ctx, &e);
    }
    Ok(Flow::Continue)
}

fn choose_parameters(wizard: &mut Wizard<LlmEvalClient>) -> llm_eval_core::Result<()> {
    if wizard.parameters().is_empty() {
        return Err(CoreError::validation(
            "this project has no parameters; create one first",
        ));
    }
    let labels: Vec<String> = wizard
        .parameters()
        .iter()
        .map(|p| format!("{} (tolerance {})", p.name, p.tolerance))
        .collect();
    let defaults: Vec<bool> = wizard
        .parameters()
        .iter()
        .map(|p| wizard.selected_parameters().contains(&p.id))
        .collect();

    let picked = MultiSelect::new()
        .with_prompt("Parameters (space to toggle, enter to confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()
        .map_err(|e| CoreError::validation(format!("selection aborted: {}", e)))?;

    let ids: Vec<_> = wizard.parameters().iter().map(|p| p.id).collect();
    for (idx, id) in ids.into_iter().enumerate() {
        if picked.contains(&idx) {
            wizard.select_parameter(id)?;
        } else {
            wizard.deselect_parameter(id)?;
        }
    }
    Ok(())
}

async fn create_parameter(
    ctx: &Context,
    wizard: &mut Wizard<LlmEvalClient>,
) -> Result<llm_eval_core::Result<()>> {
    let name: String = Input::new()
        .with_prompt("Parameter name")
        .interact_text()
        .context("Failed to read name")?;
    let description: String = Input::new()
        .with_prompt("What should the judge look for?")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read description")?;
    let tolerance: String = Input::new()
        .with_prompt("Tolerance, 0 (strict) to 1 (lenient)")
        .default(Tolerance::default().to_string())
        .validate_with(|t: &String| t.parse::<Tolerance>().map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()
        .context("Failed to read tolerance")?;

    let spinner = ctx.output.spinner("Creating parameter...");
    let created = wizard.create_parameter(&name, &description, &tolerance).await;
    finish(spinner);
    Ok(created.map(|p| {
        ctx.output
            .success(&format!("Created and selected parameter '{}'", p.name))
    }))
}

async fn launch(ctx: &Context, wizard: &mut Wizard<LlmEvalClient>) -> Result<Flow> {
    let name: String = Input::new()
        .with_prompt("Experiment name")
        .interact_text()
        .context("Failed to read name")?;
    let workers = Input::<u32>::new()
        .with_prompt(format!("Workers (1-{})", MAX_WORKERS))
        .default(DEFAULT_WORKERS)
        .validate_with(check_workers)
        .interact_text()
        .context("Failed to read worker count")?;

    if let Some(quote) = wizard.quote() {
        let prompt = format!("Launch '{}' for {}?", name.trim(), format_price(&quote.estimate));
        if !super::confirm(&prompt, false)? {
            return Ok(Flow::Continue);
        }
    }

    let spinner = ctx.output.spinner("Launching experiment...");
    let submitted = wizard.submit(&name, workers).await;
    finish(spinner);
    if let Err(e) = submitted {
        report_error(ctx, &e);
    }
    Ok(Flow::Continue)
}

fn check_workers(n: &u32) -> std::result::Result<(), String> {
    if (1..=MAX_WORKERS).contains(n) {
        Ok(())
    } else {
        Err(format!("enter a number between 1 and {}", MAX_WORKERS))
    }
}

fn report_outcome(ctx: &Context, wizard: &Wizard<LlmEvalClient>) {
    match wizard.outcome() {
        Some(WizardOutcome::DatasetSaved(id)) => {
            ctx.output.success(&format!("Dataset {} saved", id));
            ctx.output.info(&format!(
                "Launch an experiment on it with 'llm-eval wizard experiment --dataset {}'",
                id
            ));
        }
        Some(WizardOutcome::ExperimentCreated(experiment)) => {
            ctx.output.success(&format!(
                "Experiment '{}' launched ({})",
                experiment.name, experiment.id
            ));
            ctx.output.info(&format!(
                "Follow it with 'llm-eval report show {}'",
                experiment.id
            ));
        }
        None => ctx.output.warning("Wizard finished without a result"),
    }
}
