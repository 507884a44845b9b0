//! Experiments resource client
//!
//! Experiments run entirely on the backend. `create` returns once the run is
//! accepted; results show up on later `get`/`list` calls.

use crate::client::HttpClient;
use crate::error::SdkResult;
use llm_eval_core::domain::{
    CostEstimate, CostQuoteRequest, Experiment, ExperimentId, NewExperiment, ProjectId,
};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Client for experiment operations
#[derive(Debug, Clone)]
pub struct ExperimentsClient {
    client: Arc<HttpClient>,
}

impl ExperimentsClient {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, project_id: ProjectId) -> SdkResult<Vec<Experiment>> {
        self.client
            .get_with_query("/experiments-list", &[("project_id", project_id.to_string())])
            .await
    }

    pub async fn get(&self, id: ExperimentId) -> SdkResult<Experiment> {
        self.client
            .get_with_query("/experiments-details", &[("id", id.to_string())])
            .await
            .map_err(|e| e.with_resource("experiment", id))
    }

    pub async fn create(&self, request: &NewExperiment) -> SdkResult<Experiment> {
        request.validate()?;
        let experiment: Experiment = self.client.post("/experiments-create", request).await?;
        info!(experiment = %experiment.id, "experiment created");
        Ok(experiment)
    }

    /// Price a dataset + parameter combination before launching it
    pub async fn calculate_cost(&self, request: &CostQuoteRequest) -> SdkResult<CostEstimate> {
        self.client
            .post("/experiments-calculate-cost", request)
            .await
    }
}
