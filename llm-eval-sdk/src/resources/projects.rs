//! Projects resource client

use super::IdBody;
use crate::client::HttpClient;
use crate::error::SdkResult;
use llm_eval_core::domain::{NewProject, Project, ProjectId};
use std::sync::Arc;
use validator::Validate;

/// Client for project operations
#[derive(Debug, Clone)]
pub struct ProjectsClient {
    client: Arc<HttpClient>,
}

impl ProjectsClient {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// List the projects visible to the signed-in user
    pub async fn list(&self) -> SdkResult<Vec<Project>> {
        self.client.get("/projects-list").await
    }

    pub async fn get(&self, id: ProjectId) -> SdkResult<Project> {
        self.client
            .get_with_query("/projects-details", &[("id", id.to_string())])
            .await
            .map_err(|e| e.with_resource("project", id))
    }

    pub async fn create(&self, request: &NewProject) -> SdkResult<Project> {
        request.validate()?;
        self.client.post("/projects-create", request).await
    }

    /// Saves every editable field of `project`
    pub async fn update(&self, project: &Project) -> SdkResult<Project> {
        project.validate()?;
        self.client
            .post("/projects-update", project)
            .await
            .map_err(|e| e.with_resource("project", project.id))
    }

    pub async fn delete(&self, id: ProjectId) -> SdkResult<()> {
        self.client
            .post_no_response("/projects-delete", &IdBody { id })
            .await
            .map_err(|e| e.with_resource("project", id))
    }
}
