use async_trait::async_trait;
use chrono::Utc;
use llm_eval_core::domain::*;
use llm_eval_core::error::{CoreError, Result};
use llm_eval_core::traits::EvalBackend;
use llm_eval_core::wizard::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ===== Fake backend =====

#[derive(Default)]
struct FakeState {
    calls: Vec<&'static str>,
    datasets: HashMap<DatasetId, Dataset>,
    parameters: Vec<Parameter>,
    experiments: Vec<NewExperiment>,
    fail: Vec<&'static str>,
}

#[derive(Default)]
struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fail_on(&self, call: &'static str) {
        self.state.lock().unwrap().fail.push(call);
    }

    fn heal(&self) {
        self.state.lock().unwrap().fail.clear();
    }

    fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    /// Simulates the backend finishing a generation job.
    fn complete_job(&self, id: DatasetId, conversations: Vec<Conversation>) {
        let mut state = self.state.lock().unwrap();
        if let Some(ds) = state.datasets.get_mut(&id) {
            ds.conversations = conversations;
        }
    }

    fn stored_conversations(&self, id: DatasetId) -> Vec<Conversation> {
        self.state.lock().unwrap().datasets[&id].conversations.clone()
    }

    fn add_parameter(&self, project_id: ProjectId, name: &str) -> ParameterId {
        let param = Parameter {
            id: ParameterId::new(),
            name: name.to_string(),
            description: String::new(),
            tolerance: Tolerance::default(),
            project_id,
            created_at: Utc::now(),
        };
        let id = param.id;
        self.state.lock().unwrap().parameters.push(param);
        id
    }

    fn record(&self, call: &'static str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.fail.contains(&call) {
            return Err(CoreError::Backend(format!("{} failed", call)));
        }
        Ok(())
    }

    fn new_job(&self, project_id: ProjectId, name: &str) -> DatasetId {
        let dataset = Dataset::new(name, project_id);
        let id = dataset.id;
        self.state.lock().unwrap().datasets.insert(id, dataset);
        id
    }
}

#[async_trait]
impl EvalBackend for FakeBackend {
    async fn generate_dataset(&self, request: &GenerateDatasetRequest) -> Result<DatasetId> {
        self.record("generate")?;
        Ok(self.new_job(request.project_id, &request.name))
    }

    async fn extend_dataset(&self, request: &ExtendDatasetRequest) -> Result<DatasetId> {
        self.record("extend")?;
        Ok(self.new_job(request.project_id, "extended"))
    }

    async fn get_dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.record("get_dataset")?;
        self.state
            .lock()
            .unwrap()
            .datasets
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    async fn update_dataset(&self, id: DatasetId, conversations: &[Conversation]) -> Result<()> {
        self.record("update_dataset")?;
        self.complete_job(id, conversations.to_vec());
        Ok(())
    }

    async fn list_parameters(&self, project_id: ProjectId) -> Result<Vec<Parameter>> {
        self.record("list_parameters")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .parameters
            .iter()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create_parameter(&self, parameter: &NewParameter) -> Result<Parameter> {
        self.record("create_parameter")?;
        let created = Parameter {
            id: ParameterId::new(),
            name: parameter.name.clone(),
            description: parameter.description.clone(),
            tolerance: parameter.tolerance,
            project_id: parameter.project_id,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().parameters.push(created.clone());
        Ok(created)
    }

    async fn calculate_cost(&self, request: &CostQuoteRequest) -> Result<CostEstimate> {
        self.record("calculate_cost")?;
        Ok(CostEstimate {
            price: Decimal::from(request.parameter_ids.len() as u64) * Decimal::new(25, 2),
            currency: Some("USD".to_string()),
        })
    }

    async fn create_experiment(&self, experiment: &NewExperiment) -> Result<Experiment> {
        self.record("create_experiment")?;
        self.state.lock().unwrap().experiments.push(experiment.clone());
        Ok(Experiment {
            id: ExperimentId::new(),
            name: experiment.name.clone(),
            project_id: experiment.project_id,
            dataset_id: experiment.dataset_id,
            parameter_ids: experiment.parameter_ids.clone(),
            worker_count: experiment.worker_count,
            created_at: Utc::now(),
            results: None,
        })
    }
}

// ===== Helpers =====

fn project() -> Project {
    Project::new("demo", "secret", "https://bot.example.com/chat")
}

fn sample(turns: &[&str]) -> Conversation {
    let mut conv = Conversation::new(vec![]);
    for text in turns {
        conv.push_next_turn().content = text.to_string();
    }
    conv
}

fn manual_seed() -> SeedInput {
    SeedInput::manual("support", vec![sample(&["Where is my order?", "Checking now."])], 5)
}

async fn wizard_at_review(backend: &Arc<FakeBackend>) -> Wizard<FakeBackend> {
    let mut wizard = Wizard::new(Arc::clone(backend), project(), WizardMode::QuickStart);
    wizard.start().await.unwrap();
    let id = wizard.submit_seed(manual_seed()).await.unwrap();
    backend.complete_job(id, vec![sample(&["Hi", "Hello!"]), sample(&["Refund?", "Sure."])]);
    assert_eq!(wizard.check_status().await.unwrap(), GenerationState::Ready);
    wizard
}

async fn wizard_at_parameters(backend: &Arc<FakeBackend>) -> (Wizard<FakeBackend>, ParameterId, ParameterId) {
    let mut wizard = wizard_at_review(backend).await;
    let a = backend.add_parameter(wizard.project().id, "Accuracy");
    let b = backend.add_parameter(wizard.project().id, "Tone");
    wizard.accept_dataset().await.unwrap();
    (wizard, a, b)
}

// ===== Step 0 =====

#[tokio::test]
async fn test_manual_seed_with_blank_message_makes_no_call() {
    let backend = FakeBackend::new();
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::QuickStart);
    wizard.start().await.unwrap();

    let seed = SeedInput::manual("support", vec![sample(&["Hello", "   "])], 5);
    let err = wizard.submit_seed(seed).await.unwrap_err();

    assert!(matches!(err, CoreError::Validation(_)));
    assert!(backend.calls().is_empty());
    assert_eq!(wizard.state(), WizardState::Collecting);

    wizard.submit_seed(manual_seed()).await.unwrap();
    assert_eq!(wizard.state(), WizardState::AwaitingGeneration(GenerationState::Pending));
}

#[tokio::test]
async fn test_extend_requires_dataset_selection() {
    let backend = FakeBackend::new();
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::SynthesizeDataset);
    wizard.start().await.unwrap();

    assert!(wizard.submit_seed(SeedInput::extend(None, 10)).await.is_err());
    assert!(backend.calls().is_empty());

    wizard
        .submit_seed(SeedInput::extend(Some(DatasetId::new()), 10))
        .await
        .unwrap();
    assert_eq!(backend.calls(), vec!["extend"]);
}

#[tokio::test]
async fn test_backend_failure_keeps_step() {
    let backend = FakeBackend::new();
    backend.fail_on("generate");
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::QuickStart);
    wizard.start().await.unwrap();

    let err = wizard.submit_seed(manual_seed()).await.unwrap_err();
    assert!(matches!(err, CoreError::Backend(_)));
    assert_eq!(wizard.state(), WizardState::Collecting);
    assert_eq!(wizard.dataset_id(), None);

    // No automatic retry; the user re-triggers
    assert_eq!(backend.count("generate"), 1);
    backend.heal();
    wizard.submit_seed(manual_seed()).await.unwrap();
    assert_eq!(backend.count("generate"), 2);
}

#[tokio::test]
async fn test_shared_guard_blocks_duplicate_generation() {
    let backend = FakeBackend::new();
    let guard = InFlightGuard::new();
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::QuickStart)
        .with_guard(Arc::clone(&guard));
    wizard.start().await.unwrap();

    let held = guard.try_acquire(Operation::GenerateDataset).unwrap();
    let err = wizard.submit_seed(manual_seed()).await.unwrap_err();
    assert!(matches!(err, CoreError::Busy(_)));
    assert!(backend.calls().is_empty());

    drop(held);
    assert!(wizard.submit_seed(manual_seed()).await.is_ok());
    assert!(!guard.is_active(Operation::GenerateDataset));
}

// ===== Step 1 =====

#[tokio::test]
async fn test_manual_polling_until_ready() {
    let backend = FakeBackend::new();
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::QuickStart);
    wizard.start().await.unwrap();
    let id = wizard.submit_seed(manual_seed()).await.unwrap();

    assert_eq!(wizard.check_status().await.unwrap(), GenerationState::Pending);
    assert_eq!(wizard.check_status().await.unwrap(), GenerationState::Pending);

    backend.complete_job(id, vec![sample(&["Hi", "Hello"])]);
    assert_eq!(wizard.check_status().await.unwrap(), GenerationState::Ready);
    assert_eq!(wizard.conversations().len(), 1);
    assert_eq!(backend.count("get_dataset"), 3);
}

#[tokio::test]
async fn test_editing_requires_ready_state() {
    let backend = FakeBackend::new();
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::QuickStart);
    wizard.start().await.unwrap();
    wizard.submit_seed(manual_seed()).await.unwrap();

    assert!(matches!(wizard.add_conversation(), Err(CoreError::InvalidState(_))));
}

#[tokio::test]
async fn test_local_edits_are_saved_on_accept() {
    let backend = FakeBackend::new();
    let mut wizard = wizard_at_review(&backend).await;
    let id = wizard.dataset_id().unwrap();

    wizard.edit_message(0, 1, "Hello, how can I help?").unwrap();
    let idx = wizard.add_message(1).unwrap();
    wizard.edit_message(1, idx, "Anything else?").unwrap();
    wizard.remove_conversation(0).unwrap();

    wizard.accept_dataset().await.unwrap();

    let stored = backend.stored_conversations(id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].messages.len(), 3);
    assert_eq!(stored[0].messages[2].role, Role::User);
    assert_eq!(
        wizard.state(),
        WizardState::SelectingParameters(QuoteState::Unquoted)
    );
}

#[tokio::test]
async fn test_accept_rejects_blank_edit() {
    let backend = FakeBackend::new();
    let mut wizard = wizard_at_review(&backend).await;

    let conv = wizard.add_conversation().unwrap();
    assert!(wizard.accept_dataset().await.is_err());
    assert_eq!(backend.count("update_dataset"), 0);

    wizard.edit_message(conv, 0, "New question").unwrap();
    assert!(wizard.accept_dataset().await.is_ok());
}

#[tokio::test]
async fn test_last_message_cannot_be_removed() {
    let backend = FakeBackend::new();
    let mut wizard = wizard_at_review(&backend).await;

    wizard.remove_message(0, 1).unwrap();
    assert!(matches!(wizard.remove_message(0, 0), Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_failed_save_blocks_transition() {
    let backend = FakeBackend::new();
    let mut wizard = wizard_at_review(&backend).await;
    backend.fail_on("update_dataset");

    assert!(wizard.accept_dataset().await.is_err());
    assert_eq!(wizard.state(), WizardState::AwaitingGeneration(GenerationState::Ready));

    backend.heal();
    wizard.accept_dataset().await.unwrap();
    assert_eq!(wizard.state().step(), Some(2));
}

#[tokio::test]
async fn test_synthesize_mode_ends_after_save() {
    let backend = FakeBackend::new();
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::SynthesizeDataset);
    wizard.start().await.unwrap();
    let id = wizard.submit_seed(manual_seed()).await.unwrap();
    backend.complete_job(id, vec![sample(&["Hi"])]);
    wizard.check_status().await.unwrap();
    wizard.accept_dataset().await.unwrap();

    assert_eq!(wizard.state(), WizardState::Submitted);
    assert_eq!(wizard.outcome(), Some(&WizardOutcome::DatasetSaved(id)));
    assert_eq!(backend.count("list_parameters"), 0);
}

// ===== Navigation =====

#[tokio::test]
async fn test_back_from_review_saves_best_effort() {
    let backend = FakeBackend::new();
    let mut wizard = wizard_at_review(&backend).await;
    backend.fail_on("update_dataset");

    wizard.back().await.unwrap();
    assert_eq!(wizard.state(), WizardState::Collecting);
    assert_eq!(backend.count("update_dataset"), 1);
}

#[tokio::test]
async fn test_back_from_parameters_drops_quote() {
    let backend = FakeBackend::new();
    let (mut wizard, a, _) = wizard_at_parameters(&backend).await;
    wizard.select_parameter(a).unwrap();
    wizard.request_quote().await.unwrap();

    wizard.back().await.unwrap();
    assert_eq!(wizard.state(), WizardState::AwaitingGeneration(GenerationState::Ready));
    assert!(wizard.quote().is_none());
}

#[tokio::test]
async fn test_back_after_switching_dataset_keeps_other_dataset_intact() {
    let backend = FakeBackend::new();
    let (mut wizard, _, _) = wizard_at_parameters(&backend).await;
    let generated = wizard.dataset_id().unwrap();

    let other = backend.new_job(wizard.project().id, "existing");
    backend.complete_job(other, vec![sample(&["Untouched", "Leave me be."])]);

    wizard.select_dataset(other).unwrap();
    wizard.back().await.unwrap();
    assert_eq!(wizard.dataset_id(), Some(generated));

    wizard.accept_dataset().await.unwrap();
    assert_eq!(backend.stored_conversations(other)[0].messages[0].content, "Untouched");
    assert_eq!(backend.stored_conversations(generated)[0].messages[0].content, "Hi");
}

#[tokio::test]
async fn test_cancel_discards_everything() {
    let backend = FakeBackend::new();
    let (mut wizard, a, _) = wizard_at_parameters(&backend).await;
    wizard.select_parameter(a).unwrap();

    wizard.cancel();
    assert_eq!(wizard.state(), WizardState::Idle);
    assert!(wizard.conversations().is_empty());
    assert!(wizard.selected_parameters().is_empty());
    assert_eq!(wizard.dataset_id(), None);
    assert!(matches!(wizard.back().await, Err(CoreError::InvalidState(_))));
}

// ===== Step 2 =====

#[tokio::test]
async fn test_submit_is_gated_on_quote() {
    let backend = FakeBackend::new();
    let (mut wizard, a, _) = wizard_at_parameters(&backend).await;

    wizard.select_parameter(a).unwrap();
    assert!(!wizard.can_submit());
    assert!(matches!(
        wizard.submit("nightly", 4).await,
        Err(CoreError::InvalidState(_))
    ));
    assert_eq!(backend.count("create_experiment"), 0);

    let estimate = wizard.request_quote().await.unwrap();
    assert_eq!(estimate.price, Decimal::new(25, 2));
    assert!(wizard.can_submit());
}

#[tokio::test]
async fn test_selection_change_regates_submission() {
    let backend = FakeBackend::new();
    let (mut wizard, a, b) = wizard_at_parameters(&backend).await;

    wizard.select_parameter(a).unwrap();
    wizard.request_quote().await.unwrap();
    assert!(wizard.can_submit());

    wizard.select_parameter(b).unwrap();
    assert!(!wizard.can_submit());
    assert_eq!(wizard.state(), WizardState::SelectingParameters(QuoteState::Unquoted));

    wizard.request_quote().await.unwrap();
    assert!(wizard.can_submit());

    wizard.deselect_parameter(b).unwrap();
    assert!(!wizard.can_submit());

    wizard.request_quote().await.unwrap();
    wizard.select_dataset(DatasetId::new()).unwrap();
    assert!(!wizard.can_submit());
}

#[tokio::test]
async fn test_reselecting_same_dataset_keeps_quote() {
    let backend = FakeBackend::new();
    let (mut wizard, a, _) = wizard_at_parameters(&backend).await;
    wizard.select_parameter(a).unwrap();
    wizard.request_quote().await.unwrap();

    let current = wizard.dataset_id().unwrap();
    wizard.select_dataset(current).unwrap();
    assert!(wizard.can_submit());
}

#[tokio::test]
async fn test_quote_requires_a_parameter() {
    let backend = FakeBackend::new();
    let (mut wizard, _, _) = wizard_at_parameters(&backend).await;

    assert!(matches!(wizard.request_quote().await, Err(CoreError::Validation(_))));
    assert_eq!(backend.count("calculate_cost"), 0);
}

#[tokio::test]
async fn test_inline_parameter_creation() {
    let backend = FakeBackend::new();
    let (mut wizard, _, _) = wizard_at_parameters(&backend).await;

    for bad in ["abc", "-0.1", "1.5", ""] {
        let err = wizard.create_parameter("Empathy", "Shows care", bad).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{:?} accepted", bad);
    }
    assert_eq!(backend.count("create_parameter"), 0);

    let created = wizard.create_parameter("Empathy", "Shows care", "0.3").await.unwrap();
    assert!(wizard.selected_parameters().contains(&created.id));
    assert!(wizard.parameters().iter().any(|p| p.id == created.id));
    assert_eq!(backend.count("create_parameter"), 1);
}

#[tokio::test]
async fn test_submit_packages_project_endpoint() {
    let backend = FakeBackend::new();
    let (mut wizard, a, b) = wizard_at_parameters(&backend).await;
    wizard.select_parameter(a).unwrap();
    wizard.select_parameter(b).unwrap();
    wizard.request_quote().await.unwrap();

    let experiment = wizard.submit("  nightly  ", 8).await.unwrap();
    assert_eq!(experiment.name, "nightly");
    assert_eq!(wizard.state(), WizardState::Submitted);

    let sent = backend.state.lock().unwrap().experiments[0].clone();
    assert_eq!(sent.worker_count, 8);
    assert_eq!(sent.parameter_ids.len(), 2);
    assert_eq!(sent.dataset_id, wizard.dataset_id().unwrap());
    let target = sent.target.unwrap();
    assert_eq!(target.endpoint, "https://bot.example.com/chat");
    assert!(matches!(wizard.outcome(), Some(WizardOutcome::ExperimentCreated(_))));
}

#[tokio::test]
async fn test_failed_submission_stays_in_step() {
    let backend = FakeBackend::new();
    let (mut wizard, a, _) = wizard_at_parameters(&backend).await;
    wizard.select_parameter(a).unwrap();
    wizard.request_quote().await.unwrap();
    backend.fail_on("create_experiment");

    assert!(wizard.submit("nightly", 2).await.is_err());
    assert_eq!(wizard.state(), WizardState::SelectingParameters(QuoteState::Quoted));
    assert!(wizard.can_submit());
}

#[tokio::test]
async fn test_create_experiment_mode_starts_at_parameters() {
    let backend = FakeBackend::new();
    let project = project();
    let a = backend.add_parameter(project.id, "Accuracy");
    let mut wizard = Wizard::new(Arc::clone(&backend), project, WizardMode::CreateExperiment);
    wizard.start().await.unwrap();

    assert_eq!(wizard.state(), WizardState::SelectingParameters(QuoteState::Unquoted));
    assert_eq!(wizard.parameters().len(), 1);

    wizard.select_parameter(a).unwrap();
    assert!(matches!(wizard.request_quote().await, Err(CoreError::Validation(_))));

    wizard.select_dataset(DatasetId::new()).unwrap();
    wizard.request_quote().await.unwrap();
    wizard.submit("from existing", 1).await.unwrap();
    assert!(matches!(wizard.back().await, Err(CoreError::InvalidState(_))));
}

#[tokio::test]
async fn test_failed_parameter_load_keeps_wizard_idle() {
    let backend = FakeBackend::new();
    backend.fail_on("list_parameters");
    let mut wizard = Wizard::new(Arc::clone(&backend), project(), WizardMode::CreateExperiment);

    let err = wizard.start().await.unwrap_err();
    assert!(matches!(err, CoreError::Backend(_)));
    assert_eq!(wizard.state(), WizardState::Idle);
    assert!(wizard.parameters().is_empty());

    backend.heal();
    wizard.start().await.unwrap();
    assert_eq!(wizard.state(), WizardState::SelectingParameters(QuoteState::Unquoted));
    assert_eq!(backend.count("list_parameters"), 2);
}

#[tokio::test]
async fn test_refresh_drops_deleted_selection() {
    let backend = FakeBackend::new();
    let (mut wizard, a, _) = wizard_at_parameters(&backend).await;
    wizard.select_parameter(a).unwrap();
    wizard.request_quote().await.unwrap();

    backend.state.lock().unwrap().parameters.retain(|p| p.id != a);
    wizard.refresh_parameters().await.unwrap();

    assert!(wizard.selected_parameters().is_empty());
    assert!(!wizard.can_submit());
}
