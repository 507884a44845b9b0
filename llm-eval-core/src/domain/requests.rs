//! Commands sent to the backend's long-running jobs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::dataset::Conversation;
use super::ids::{DatasetId, ParameterId, ProjectId};

/// Asks the backend to synthesise a dataset from hand-written samples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateDatasetRequest {
    pub project_id: ProjectId,
    pub name: String,
    pub samples: Vec<Conversation>,
    pub sample_count: u32,
    #[serde(default)]
    pub instructions: String,
}

/// Asks the backend to grow an existing dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtendDatasetRequest {
    pub project_id: ProjectId,
    pub dataset_id: DatasetId,
    pub sample_count: u32,
}

/// Returned synchronously when a generation job is accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct JobAccepted {
    #[serde(alias = "id")]
    pub dataset_id: DatasetId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostQuoteRequest {
    pub dataset_id: DatasetId,
    pub parameter_ids: Vec<ParameterId>,
}

/// Price quoted by the backend for running an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostEstimate {
    #[serde(alias = "cost", alias = "total_cost")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}
