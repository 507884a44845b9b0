//! The HTTP client as the wizard's backend.

use crate::LlmEvalClient;
use async_trait::async_trait;
use llm_eval_core::domain::{
    Conversation, CostEstimate, CostQuoteRequest, Dataset, DatasetId, Experiment,
    ExtendDatasetRequest, GenerateDatasetRequest, NewExperiment, NewParameter, Parameter,
    ProjectId,
};
use llm_eval_core::{EvalBackend, Result};

#[async_trait]
impl EvalBackend for LlmEvalClient {
    async fn generate_dataset(&self, request: &GenerateDatasetRequest) -> Result<DatasetId> {
        Ok(self.datasets().generate(request).await?)
    }

    async fn extend_dataset(&self, request: &ExtendDatasetRequest) -> Result<DatasetId> {
        Ok(self.datasets().extend(request).await?)
    }

    async fn get_dataset(&self, id: DatasetId) -> Result<Dataset> {
        Ok(self.datasets().get(id).await?)
    }

    async fn update_dataset(&self, id: DatasetId, conversations: &[Conversation]) -> Result<()> {
        Ok(self.datasets().update(id, conversations).await?)
    }

    async fn list_parameters(&self, project_id: ProjectId) -> Result<Vec<Parameter>> {
        Ok(self.parameters().list(project_id).await?)
    }

    async fn create_parameter(&self, parameter: &NewParameter) -> Result<Parameter> {
        Ok(self.parameters().create(parameter).await?)
    }

    async fn calculate_cost(&self, request: &CostQuoteRequest) -> Result<CostEstimate> {
        Ok(self.experiments().calculate_cost(request).await?)
    }

    async fn create_experiment(&self, experiment: &NewExperiment) -> Result<Experiment> {
        Ok(self.experiments().create(experiment).await?)
    }
}
