use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::ids::{ConversationId, DatasetId, ExperimentId, ParameterId, ProjectId};
use super::project::LabratConfig;

// ===== Experiment Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Accepted by the client but not yet acknowledged by the backend.
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExperimentStatus {
    /// Infers the status from the result payload: a non-empty result array
    /// means completed, anything else means running.
    ///
    /// The backend exposes no explicit status field, so an experiment that
    /// completes with zero conversations is reported as running.
    pub fn derive(results: Option<&[EvalResult]>) -> ExperimentStatus {
        match results {
            Some(r) if !r.is_empty() => ExperimentStatus::Completed,
            _ => ExperimentStatus::Running,
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ===== Results =====

/// One named judgement of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationScore {
    pub name: String,
    pub score: f64,
    #[serde(default, alias = "justification")]
    pub comment: String,
}

impl EvaluationScore {
    pub fn new(name: impl Into<String>, score: f64, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score,
            comment: comment.into(),
        }
    }
}

/// Raw evaluation record for a single conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Seconds taken by the system under test.
    #[serde(alias = "responseTime")]
    pub response_time: f64,
    #[serde(default, alias = "scores")]
    pub evaluations: Vec<EvaluationScore>,
}

impl EvalResult {
    pub fn score_for(&self, name: &str) -> Option<f64> {
        self.evaluations
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.score)
    }

    pub fn mean_score(&self) -> Option<f64> {
        if self.evaluations.is_empty() {
            return None;
        }
        let sum: f64 = self.evaluations.iter().map(|e| e.score).sum();
        Some(sum / self.evaluations.len() as f64)
    }
}

// ===== Experiment Domain Model =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    pub project_id: ProjectId,
    pub dataset_id: DatasetId,
    #[serde(default)]
    pub parameter_ids: Vec<ParameterId>,
    #[serde(default = "default_workers")]
    pub worker_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<EvalResult>>,
}

fn default_workers() -> u32 {
    1
}

impl Experiment {
    pub fn status(&self) -> ExperimentStatus {
        ExperimentStatus::derive(self.results.as_deref())
    }

    pub fn results(&self) -> &[EvalResult] {
        self.results.as_deref().unwrap_or_default()
    }
}

/// Upper bound on backend workers for one experiment.
pub const MAX_WORKERS: u32 = 64;

/// Payload for launching an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct NewExperiment {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub project_id: ProjectId,
    pub dataset_id: DatasetId,
    #[validate(length(min = 1))]
    pub parameter_ids: Vec<ParameterId>,
    #[validate(range(min = 1, max = MAX_WORKERS))]
    pub worker_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<LabratConfig>,
}
