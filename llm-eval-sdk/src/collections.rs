//! Locally cached lists of backend resources.
//!
//! Each collection fetches on demand and only changes its local copy after
//! the backend has confirmed a mutation. A failed call leaves the cached
//! list exactly as it was.

use crate::error::{SdkError, SdkResult};
use crate::resources::NewDataset;
use crate::LlmEvalClient;
use llm_eval_core::domain::{
    Dataset, DatasetId, Experiment, ExperimentId, ExperimentStatus, NewParameter, NewProject,
    Parameter, ParameterId, Project, ProjectId,
};
use tracing::debug;

/// The user's projects plus the one currently being worked in.
#[derive(Debug, Clone)]
pub struct ProjectCollection {
    client: LlmEvalClient,
    projects: Vec<Project>,
    active: Option<ProjectId>,
}

impl ProjectCollection {
    pub fn new(client: LlmEvalClient) -> Self {
        Self {
            client,
            projects: Vec::new(),
            active: None,
        }
    }

    /// Remembers a preferred active project before the first load.
    pub fn with_active(mut self, id: Option<ProjectId>) -> Self {
        self.active = id;
        self
    }

    /// Fetches the project list. If the active project is gone (or none was
    /// chosen) the first project becomes active.
    pub async fn load(&mut self) -> SdkResult<&[Project]> {
        let projects = self.client.projects().list().await?;
        if !self
            .active
            .is_some_and(|id| projects.iter().any(|p| p.id == id))
        {
            self.active = projects.first().map(|p| p.id);
        }
        debug!(count = projects.len(), active = ?self.active, "projects loaded");
        self.projects = projects;
        Ok(&self.projects)
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn active(&self) -> Option<&Project> {
        let id = self.active?;
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn set_active(&mut self, id: ProjectId) -> SdkResult<&Project> {
        let project = self
            .projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| SdkError::NotFound {
                resource_type: "project".to_string(),
                resource_id: id.to_string(),
            })?;
        self.active = Some(id);
        Ok(project)
    }

    pub async fn create(&mut self, request: &NewProject) -> SdkResult<&Project> {
        let project = self.client.projects().create(request).await?;
        if self.active.is_none() {
            self.active = Some(project.id);
        }
        self.projects.push(project);
        Ok(&self.projects[self.projects.len() - 1])
    }

    pub async fn update(&mut self, project: &Project) -> SdkResult<Project> {
        let updated = self.client.projects().update(project).await?;
        replace_or_push(&mut self.projects, updated.clone(), |p| p.id == updated.id);
        Ok(updated)
    }

    pub async fn delete(&mut self, id: ProjectId) -> SdkResult<()> {
        self.client.projects().delete(id).await?;
        self.projects.retain(|p| p.id != id);
        if self.active == Some(id) {
            self.active = self.projects.first().map(|p| p.id);
        }
        Ok(())
    }
}

/// Datasets of one project.
#[derive(Debug, Clone)]
pub struct DatasetList {
    client: LlmEvalClient,
    project_id: ProjectId,
    items: Vec<Dataset>,
}

impl DatasetList {
    pub fn new(client: LlmEvalClient, project_id: ProjectId) -> Self {
        Self {
            client,
            project_id,
            items: Vec::new(),
        }
    }

    pub async fn refresh(&mut self) -> SdkResult<&[Dataset]> {
        self.items = self.client.datasets().list(self.project_id).await?;
        Ok(&self.items)
    }

    pub fn items(&self) -> &[Dataset] {
        &self.items
    }

    /// Loads the full dataset and updates the cached entry.
    pub async fn details(&mut self, id: DatasetId) -> SdkResult<Dataset> {
        let dataset = self.client.datasets().get(id).await?;
        replace_or_push(&mut self.items, dataset.clone(), |d| d.id == id);
        Ok(dataset)
    }

    pub async fn upload(&mut self, request: &NewDataset) -> SdkResult<Dataset> {
        let dataset = self.client.datasets().create(request).await?;
        self.items.push(dataset.clone());
        Ok(dataset)
    }

    pub async fn delete(&mut self, id: DatasetId) -> SdkResult<()> {
        self.client.datasets().delete(id).await?;
        self.items.retain(|d| d.id != id);
        Ok(())
    }
}

/// Evaluation parameters of one project.
#[derive(Debug, Clone)]
pub struct ParameterList {
    client: LlmEvalClient,
    project_id: ProjectId,
    items: Vec<Parameter>,
}

impl ParameterList {
    pub fn new(client: LlmEvalClient, project_id: ProjectId) -> Self {
        Self {
            client,
            project_id,
            items: Vec::new(),
        }
    }

    pub async fn refresh(&mut self) -> SdkResult<&[Parameter]> {
        self.items = self.client.parameters().list(self.project_id).await?;
        Ok(&self.items)
    }

    pub fn items(&self) -> &[Parameter] {
        &self.items
    }

    pub async fn create(&mut self, request: &NewParameter) -> SdkResult<Parameter> {
        let created = self.client.parameters().create(request).await?;
        self.items.push(created.clone());
        Ok(created)
    }

    pub async fn update(&mut self, parameter: &Parameter) -> SdkResult<Parameter> {
        let updated = self.client.parameters().update(parameter).await?;
        replace_or_push(&mut self.items, updated.clone(), |p| p.id == updated.id);
        Ok(updated)
    }

    pub async fn delete(&mut self, id: ParameterId) -> SdkResult<()> {
        self.client.parameters().delete(id).await?;
        self.items.retain(|p| p.id != id);
        Ok(())
    }
}

/// Past and running experiments of one project, newest first.
#[derive(Debug, Clone)]
pub struct ExperimentHistory {
    client: LlmEvalClient,
    project_id: ProjectId,
    items: Vec<Experiment>,
}

impl ExperimentHistory {
    pub fn new(client: LlmEvalClient, project_id: ProjectId) -> Self {
        Self {
            client,
            project_id,
            items: Vec::new(),
        }
    }

    /// Refetches the list. Status is re-derived from each payload, so a run
    /// that finished since the last refresh shows up as completed.
    pub async fn refresh(&mut self) -> SdkResult<&[Experiment]> {
        let mut items = self.client.experiments().list(self.project_id).await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.items = items;
        Ok(&self.items)
    }

    pub fn items(&self) -> &[Experiment] {
        &self.items
    }

    pub fn with_status(&self, status: ExperimentStatus) -> impl Iterator<Item = &Experiment> {
        self.items.iter().filter(move |e| e.status() == status)
    }

    /// Fetches one experiment with its results and updates the cached entry.
    pub async fn details(&mut self, id: ExperimentId) -> SdkResult<Experiment> {
        let experiment = self.client.experiments().get(id).await?;
        replace_or_push(&mut self.items, experiment.clone(), |e| e.id == id);
        Ok(experiment)
    }
}

fn replace_or_push<T>(items: &mut Vec<T>, item: T, matches: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|i| matches(i)) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}
