//! Datasets resource client
//!
//! Generation and extension are asynchronous on the backend: the call
//! returns a dataset id straight away and the conversations appear on that
//! dataset once the job is done. Poll with [`DatasetsClient::get`].

use super::IdBody;
use crate::client::HttpClient;
use crate::error::SdkResult;
use llm_eval_core::domain::{
    validate_conversations, Conversation, Dataset, DatasetId, ExtendDatasetRequest,
    GenerateDatasetRequest, JobAccepted, ProjectId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Client for dataset operations
#[derive(Debug, Clone)]
pub struct DatasetsClient {
    client: Arc<HttpClient>,
}

impl DatasetsClient {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, project_id: ProjectId) -> SdkResult<Vec<Dataset>> {
        self.client
            .get_with_query("/datasets-list", &[("project_id", project_id.to_string())])
            .await
    }

    /// Fetch a dataset including its conversations
    pub async fn get(&self, id: DatasetId) -> SdkResult<Dataset> {
        self.client
            .get_with_query("/datasets-details", &[("id", id.to_string())])
            .await
            .map_err(|e| e.with_resource("dataset", id))
    }

    /// Start a generation job from seed samples
    pub async fn generate(&self, request: &GenerateDatasetRequest) -> SdkResult<DatasetId> {
        let accepted: JobAccepted = self.client.post("/datasets-generate", request).await?;
        debug!(dataset_id = %accepted.dataset_id, "generation job accepted");
        Ok(accepted.dataset_id)
    }

    /// Start a job that adds samples to an existing dataset
    pub async fn extend(&self, request: &ExtendDatasetRequest) -> SdkResult<DatasetId> {
        let accepted: JobAccepted = self.client.post("/datasets-extend", request).await?;
        debug!(dataset_id = %accepted.dataset_id, "extension job accepted");
        Ok(accepted.dataset_id)
    }

    /// Replace the dataset's conversations
    pub async fn update(&self, id: DatasetId, conversations: &[Conversation]) -> SdkResult<()> {
        validate_conversations(conversations)?;
        self.client
            .post_no_response("/datasets-update", &UpdateConversations { id, conversations })
            .await
            .map_err(|e| e.with_resource("dataset", id))
    }

    /// Create a dataset from conversations the caller already has
    pub async fn create(&self, request: &NewDataset) -> SdkResult<Dataset> {
        request.validate()?;
        self.client.post("/datasets-create", request).await
    }

    pub async fn delete(&self, id: DatasetId) -> SdkResult<()> {
        self.client
            .post_no_response("/datasets-delete", &IdBody { id })
            .await
            .map_err(|e| e.with_resource("dataset", id))
    }
}

#[derive(Debug, Serialize)]
struct UpdateConversations<'a> {
    id: DatasetId,
    conversations: &'a [Conversation],
}

/// A dataset uploaded as-is, without generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDataset {
    pub name: String,
    pub project_id: ProjectId,
    #[serde(alias = "data")]
    pub conversations: Vec<Conversation>,
}

impl NewDataset {
    pub fn new(
        name: impl Into<String>,
        project_id: ProjectId,
        conversations: Vec<Conversation>,
    ) -> Self {
        Self {
            name: name.into(),
            project_id,
            conversations,
        }
    }

    pub fn validate(&self) -> llm_eval_core::Result<()> {
        if self.name.trim().is_empty() {
            return Err(llm_eval_core::CoreError::validation("dataset name is required"));
        }
        validate_conversations(&self.conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_eval_core::domain::Message;

    #[test]
    fn test_new_dataset_validation() {
        let project = ProjectId::new();
        let good = NewDataset::new(
            "faq",
            project,
            vec![Conversation::new(vec![Message::user("Hi"), Message::assistant("Hello")])],
        );
        assert!(good.validate().is_ok());

        assert!(NewDataset::new(" ", project, good.conversations.clone())
            .validate()
            .is_err());
        assert!(NewDataset::new("faq", project, vec![]).validate().is_err());
    }

    #[test]
    fn test_update_body_shape() {
        let id = DatasetId::new();
        let conversations = vec![Conversation::new(vec![Message::user("Hi")])];
        let body = serde_json::to_value(UpdateConversations {
            id,
            conversations: &conversations,
        })
        .unwrap();
        assert_eq!(body["id"], serde_json::json!(id.to_string()));
        assert_eq!(body["conversations"][0]["messages"][0]["role"], "user");
    }
}
