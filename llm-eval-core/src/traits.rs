use async_trait::async_trait;

use crate::domain::{
    Conversation, CostEstimate, CostQuoteRequest, Dataset, DatasetId, Experiment,
    ExtendDatasetRequest, GenerateDatasetRequest, NewExperiment, NewParameter, Parameter,
    ProjectId,
};
use crate::error::Result;

/// The slice of the evaluation backend the wizard drives.
///
/// The HTTP SDK implements this for its client; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait EvalBackend: Send + Sync {
    async fn generate_dataset(&self, request: &GenerateDatasetRequest) -> Result<DatasetId>;

    async fn extend_dataset(&self, request: &ExtendDatasetRequest) -> Result<DatasetId>;

    async fn get_dataset(&self, id: DatasetId) -> Result<Dataset>;

    async fn update_dataset(&self, id: DatasetId, conversations: &[Conversation]) -> Result<()>;

    async fn list_parameters(&self, project_id: ProjectId) -> Result<Vec<Parameter>>;

    async fn create_parameter(&self, parameter: &NewParameter) -> Result<Parameter>;

    async fn calculate_cost(&self, request: &CostQuoteRequest) -> Result<CostEstimate>;

    async fn create_experiment(&self, experiment: &NewExperiment) -> Result<Experiment>;
}
