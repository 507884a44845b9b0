//! Parameters resource client

use super::IdBody;
use crate::client::HttpClient;
use crate::error::SdkResult;
use llm_eval_core::domain::{NewParameter, Parameter, ParameterId, ProjectId};
use std::sync::Arc;
use validator::Validate;

/// Client for evaluation parameter operations
#[derive(Debug, Clone)]
pub struct ParametersClient {
    client: Arc<HttpClient>,
}

impl ParametersClient {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, project_id: ProjectId) -> SdkResult<Vec<Parameter>> {
        self.client
            .get_with_query("/parameters-list", &[("project_id", project_id.to_string())])
            .await
    }

    pub async fn create(&self, request: &NewParameter) -> SdkResult<Parameter> {
        request.validate()?;
        self.client.post("/parameters-create", request).await
    }

    pub async fn update(&self, parameter: &Parameter) -> SdkResult<Parameter> {
        parameter.validate()?;
        self.client
            .post("/parameters-update", parameter)
            .await
            .map_err(|e| e.with_resource("parameter", parameter.id))
    }

    pub async fn delete(&self, id: ParameterId) -> SdkResult<()> {
        self.client
            .post_no_response("/parameters-delete", &IdBody { id })
            .await
            .map_err(|e| e.with_resource("parameter", id))
    }
}
