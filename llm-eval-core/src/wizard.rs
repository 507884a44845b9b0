//! Multi-step flow from seed samples to a launched experiment.
//!
//! A [`Wizard`] walks `Idle → Collecting → AwaitingGeneration →
//! SelectingParameters → Submitted`. Each backend call is made through an
//! [`EvalBackend`]; a failed call leaves the wizard in the step it was in and
//! nothing is retried automatically. Generation jobs are polled manually with
//! [`Wizard::check_status`] and have no timeout.

pub mod guard;
pub mod seed;
pub mod state;

pub use guard::{InFlightGuard, InFlightTicket, Operation};
pub use seed::{SeedCall, SeedInput, MAX_SAMPLE_COUNT};
pub use state::{GenerationState, Quote, QuoteState, WizardMode, WizardOutcome, WizardState};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::domain::{
    validate_conversations, Conversation, CostEstimate, CostQuoteRequest, DatasetId, Experiment,
    Message, NewExperiment, NewParameter, Parameter, ParameterId, Project, Role,
};
use crate::error::{CoreError, Result};
use crate::traits::EvalBackend;

pub struct Wizard<B: EvalBackend + ?Sized> {
    backend: Arc<B>,
    project: Project,
    mode: WizardMode,
    state: WizardState,
    guard: Arc<InFlightGuard>,
    seed: Option<SeedInput>,
    dataset_id: Option<DatasetId>,
    /// Dataset the reviewed conversations belong to.
    reviewed_id: Option<DatasetId>,
    conversations: Vec<Conversation>,
    parameters: Vec<Parameter>,
    selected: BTreeSet<ParameterId>,
    quote: Option<Quote>,
    outcome: Option<WizardOutcome>,
}

impl<B: EvalBackend + ?Sized> Wizard<B> {
    pub fn new(backend: Arc<B>, project: Project, mode: WizardMode) -> Self {
        Self {
            backend,
            project,
            mode,
            state: WizardState::Idle,
            guard: InFlightGuard::new(),
            seed: None,
            dataset_id: None,
            reviewed_id: None,
            conversations: Vec::new(),
            parameters: Vec::new(),
            selected: BTreeSet::new(),
            quote: None,
            outcome: None,
        }
    }

    /// Shares an in-flight guard with other wizards.
    pub fn with_guard(mut self, guard: Arc<InFlightGuard>) -> Self {
        self.guard = guard;
        self
    }

    // ===== Accessors =====

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn seed(&self) -> Option<&SeedInput> {
        self.seed.as_ref()
    }

    pub fn dataset_id(&self) -> Option<DatasetId> {
        self.dataset_id
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn selected_parameters(&self) -> &BTreeSet<ParameterId> {
        &self.selected
    }

    /// The stored quote, only if it still covers the current selection.
    pub fn quote(&self) -> Option<&Quote> {
        self.quote
            .as_ref()
            .filter(|q| q.covers(self.dataset_id, &self.selected))
    }

    pub fn outcome(&self) -> Option<&WizardOutcome> {
        self.outcome.as_ref()
    }

    // ===== Lifecycle =====

    /// Leaves `Idle`. Experiment-only wizards go straight to parameter
    /// selection and load the project's parameters.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(WizardState::Idle)?;
        match self.mode {
            WizardMode::QuickStart | WizardMode::SynthesizeDataset => {
                self.state = WizardState::Collecting;
            }
            WizardMode::CreateExperiment => {
                self.parameters = self.backend.list_parameters(self.project.id).await?;
                self.state = WizardState::SelectingParameters(QuoteState::Unquoted);
            }
        }
        debug!(mode = ?self.mode, state = %self.state, "wizard started");
        Ok(())
    }

    /// Discards every local edit and returns to `Idle`.
    pub fn cancel(&mut self) {
        info!(state = %self.state, "wizard cancelled");
        self.state = WizardState::Idle;
        self.seed = None;
        self.dataset_id = None;
        self.reviewed_id = None;
        self.conversations.clear();
        self.parameters.clear();
        self.selected.clear();
        self.quote = None;
        self.outcome = None;
    }

    /// Steps back one stage. Leaving review for the seed step saves local
    /// edits on a best-effort basis. Returning to review always targets the
    /// generated dataset, even if another one was selected meanwhile.
    pub async fn back(&mut self) -> Result<()> {
        match self.state {
            WizardState::AwaitingGeneration(sub) => {
                if sub == GenerationState::Ready {
                    if let Err(e) = self.save_conversations().await {
                        warn!(error = %e, "best-effort save failed while stepping back");
                    }
                }
                self.state = WizardState::Collecting;
                Ok(())
            }
            WizardState::SelectingParameters(_) if self.mode != WizardMode::CreateExperiment => {
                if self.dataset_id != self.reviewed_id {
                    debug!("returning to the reviewed dataset");
                    self.dataset_id = self.reviewed_id;
                }
                self.quote = None;
                self.state = WizardState::AwaitingGeneration(GenerationState::Ready);
                Ok(())
            }
            other => Err(CoreError::invalid_state(format!("cannot go back from {}", other))),
        }
    }

    // ===== Step 0: seed collection =====

    /// Validates the seed and starts the backend job. The returned id is the
    /// dataset the job fills in asynchronously.
    pub async fn submit_seed(&mut self, seed: SeedInput) -> Result<DatasetId> {
        self.expect_state(WizardState::Collecting)?;
        let call = SeedCall::build(&seed, self.project.id)?;

        let _ticket = self.guard.try_acquire(Operation::GenerateDataset)?;
        let dataset_id = match &call {
            SeedCall::Generate(req) => self.backend.generate_dataset(req).await,
            SeedCall::Extend(req) => self.backend.extend_dataset(req).await,
        }
        .inspect_err(|e| warn!(error = %e, "dataset job submission failed"))?;

        info!(%dataset_id, samples = seed.sample_count(), "dataset job accepted");
        self.seed = Some(seed);
        self.dataset_id = Some(dataset_id);
        self.reviewed_id = Some(dataset_id);
        self.conversations.clear();
        self.state = WizardState::AwaitingGeneration(GenerationState::Pending);
        Ok(dataset_id)
    }

    // ===== Step 1: poll and review =====

    /// Re-fetches the dataset once. When the backend holds conversations the
    /// job is complete and they become editable locally.
    pub async fn check_status(&mut self) -> Result<GenerationState> {
        let sub = match self.state {
            WizardState::AwaitingGeneration(sub) => sub,
            other => {
                return Err(CoreError::invalid_state(format!(
                    "no generation job to check while {}",
                    other
                )))
            }
        };
        if sub == GenerationState::Ready {
            return Ok(sub);
        }

        let dataset_id = self.require_dataset()?;
        let dataset = self.backend.get_dataset(dataset_id).await?;
        if dataset.is_generated() {
            debug!(%dataset_id, conversations = dataset.conversations.len(), "generation complete");
            self.conversations = dataset.conversations;
            self.state = WizardState::AwaitingGeneration(GenerationState::Ready);
            Ok(GenerationState::Ready)
        } else {
            Ok(GenerationState::Pending)
        }
    }

    pub fn add_conversation(&mut self) -> Result<usize> {
        self.expect_reviewing()?;
        self.conversations.push(Conversation::blank());
        Ok(self.conversations.len() - 1)
    }

    pub fn remove_conversation(&mut self, index: usize) -> Result<Conversation> {
        self.expect_reviewing()?;
        if index >= self.conversations.len() {
            return Err(CoreError::validation(format!("no conversation {}", index + 1)));
        }
        Ok(self.conversations.remove(index))
    }

    /// Appends an empty message whose role follows the previous turn.
    pub fn add_message(&mut self, conversation: usize) -> Result<usize> {
        let conv = self.conversation_mut(conversation)?;
        conv.push_next_turn();
        Ok(conv.messages.len() - 1)
    }

    pub fn edit_message(
        &mut self,
        conversation: usize,
        message: usize,
        content: impl Into<String>,
    ) -> Result<()> {
        let msg = self.message_mut(conversation, message)?;
        msg.content = content.into();
        Ok(())
    }

    pub fn set_message_role(&mut self, conversation: usize, message: usize, role: Role) -> Result<()> {
        let msg = self.message_mut(conversation, message)?;
        msg.role = role;
        Ok(())
    }

    /// Removes a message. A conversation keeps at least one message; remove
    /// the whole conversation instead.
    pub fn remove_message(&mut self, conversation: usize, message: usize) -> Result<Message> {
        let conv = self.conversation_mut(conversation)?;
        if message >= conv.messages.len() {
            return Err(CoreError::validation(format!("no message {}", message + 1)));
        }
        if conv.messages.len() == 1 {
            return Err(CoreError::validation(
                "a conversation needs at least one message",
            ));
        }
        Ok(conv.messages.remove(message))
    }

    /// Persists local edits and moves on. A failed save blocks the
    /// transition.
    pub async fn accept_dataset(&mut self) -> Result<()> {
        self.expect_reviewing()?;
        validate_conversations(&self.conversations)?;
        self.save_conversations().await?;

        let dataset_id = self.require_dataset()?;
        if self.mode == WizardMode::SynthesizeDataset {
            self.outcome = Some(WizardOutcome::DatasetSaved(dataset_id));
            self.state = WizardState::Submitted;
            info!(%dataset_id, "dataset saved");
            return Ok(());
        }

        self.state = WizardState::SelectingParameters(QuoteState::Unquoted);
        self.quote = None;
        if let Err(e) = self.refresh_parameters().await {
            warn!(error = %e, "could not load parameters; refresh manually");
        }
        Ok(())
    }

    // ===== Step 2: parameters, cost, submit =====

    /// Fetches the project's parameter list. Selections whose parameter no
    /// longer exists are dropped.
    pub async fn refresh_parameters(&mut self) -> Result<()> {
        self.expect_selecting()?;
        let parameters = self.backend.list_parameters(self.project.id).await?;
        let before = self.selected.len();
        self.selected
            .retain(|id| parameters.iter().any(|p| &p.id == id));
        if self.selected.len() != before {
            self.invalidate_quote();
        }
        self.parameters = parameters;
        Ok(())
    }

    pub fn select_parameter(&mut self, id: ParameterId) -> Result<()> {
        self.expect_selecting()?;
        if !self.parameters.iter().any(|p| p.id == id) {
            return Err(CoreError::NotFound(format!("parameter {}", id)));
        }
        if self.selected.insert(id) {
            self.invalidate_quote();
        }
        Ok(())
    }

    pub fn deselect_parameter(&mut self, id: ParameterId) -> Result<()> {
        self.expect_selecting()?;
        if self.selected.remove(&id) {
            self.invalidate_quote();
        }
        Ok(())
    }

    /// Points the experiment at a different dataset.
    pub fn select_dataset(&mut self, id: DatasetId) -> Result<()> {
        self.expect_selecting()?;
        if self.dataset_id != Some(id) {
            self.dataset_id = Some(id);
            self.invalidate_quote();
        }
        Ok(())
    }

    /// Creates a parameter right away and selects it. The tolerance text is
    /// validated before anything is sent.
    pub async fn create_parameter(
        &mut self,
        name: &str,
        description: &str,
        tolerance: &str,
    ) -> Result<Parameter> {
        self.expect_selecting()?;
        let new = NewParameter::parse(self.project.id, name, description, tolerance)?;

        let _ticket = self.guard.try_acquire(Operation::CreateParameter)?;
        let created = self.backend.create_parameter(&new).await?;
        info!(parameter = %created.name, id = %created.id, "parameter created");

        self.parameters.push(created.clone());
        self.selected.insert(created.id);
        self.invalidate_quote();
        Ok(created)
    }

    /// Asks the backend to price the current dataset + parameter selection.
    pub async fn request_quote(&mut self) -> Result<CostEstimate> {
        self.expect_selecting()?;
        let dataset_id = self.require_dataset()?;
        if self.selected.is_empty() {
            return Err(CoreError::validation("select at least one parameter"));
        }

        let request = CostQuoteRequest {
            dataset_id,
            parameter_ids: self.selected.iter().copied().collect(),
        };
        let _ticket = self.guard.try_acquire(Operation::QuoteCost)?;
        let estimate = self.backend.calculate_cost(&request).await?;
        debug!(%dataset_id, price = %estimate.price, "cost quoted");

        self.quote = Some(Quote {
            dataset_id,
            parameter_ids: self.selected.clone(),
            estimate: estimate.clone(),
        });
        self.state = WizardState::SelectingParameters(QuoteState::Quoted);
        Ok(estimate)
    }

    /// True only when a quote exists for exactly the current selection.
    pub fn can_submit(&self) -> bool {
        self.state == WizardState::SelectingParameters(QuoteState::Quoted)
            && !self.selected.is_empty()
            && self.quote().is_some()
    }

    /// Launches the experiment. Execution happens on the backend; the call
    /// returns as soon as it is accepted.
    pub async fn submit(&mut self, name: &str, worker_count: u32) -> Result<Experiment> {
        self.expect_selecting()?;
        if !self.can_submit() {
            return Err(CoreError::invalid_state(
                "request a cost estimate for the current selection first",
            ));
        }
        let dataset_id = self.require_dataset()?;

        let request = NewExperiment {
            name: name.trim().to_string(),
            project_id: self.project.id,
            dataset_id,
            parameter_ids: self.selected.iter().copied().collect(),
            worker_count,
            target: self.project.target_endpoint(),
        };
        request.validate()?;

        let _ticket = self.guard.try_acquire(Operation::CreateExperiment)?;
        let experiment = self
            .backend
            .create_experiment(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "experiment submission failed"))?;

        info!(experiment = %experiment.id, %dataset_id, "experiment submitted");
        self.outcome = Some(WizardOutcome::ExperimentCreated(experiment.clone()));
        self.state = WizardState::Submitted;
        Ok(experiment)
    }

    // ===== Internals =====

    async fn save_conversations(&self) -> Result<()> {
        let dataset_id = self.require_dataset()?;
        let _ticket = self.guard.try_acquire(Operation::SaveDataset)?;
        self.backend
            .update_dataset(dataset_id, &self.conversations)
            .await
            .inspect_err(|e| warn!(%dataset_id, error = %e, "saving dataset failed"))
    }

    fn invalidate_quote(&mut self) {
        if self.quote.take().is_some() {
            debug!("selection changed, quote invalidated");
        }
        if let WizardState::SelectingParameters(_) = self.state {
            self.state = WizardState::SelectingParameters(QuoteState::Unquoted);
        }
    }

    fn require_dataset(&self) -> Result<DatasetId> {
        self.dataset_id
            .ok_or_else(|| CoreError::validation("no dataset selected"))
    }

    fn expect_state(&self, expected: WizardState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CoreError::invalid_state(format!(
                "expected {}, wizard is {}",
                expected, self.state
            )))
        }
    }

    fn expect_reviewing(&self) -> Result<()> {
        self.expect_state(WizardState::AwaitingGeneration(GenerationState::Ready))
    }

    fn expect_selecting(&self) -> Result<()> {
        match self.state {
            WizardState::SelectingParameters(_) => Ok(()),
            other => Err(CoreError::invalid_state(format!(
                "parameter selection is not open while {}",
                other
            ))),
        }
    }

    fn conversation_mut(&mut self, index: usize) -> Result<&mut Conversation> {
        self.expect_reviewing()?;
        self.conversations
            .get_mut(index)
            .ok_or_else(|| CoreError::validation(format!("no conversation {}", index + 1)))
    }

    fn message_mut(&mut self, conversation: usize, message: usize) -> Result<&mut Message> {
        self.conversation_mut(conversation)?
            .messages
            .get_mut(message)
            .ok_or_else(|| CoreError::validation(format!("no message {}", message + 1)))
    }
}
