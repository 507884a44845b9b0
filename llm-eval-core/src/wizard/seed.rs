use serde::{Deserialize, Serialize};

use crate::domain::{
    validate_conversations, Conversation, DatasetId, ExtendDatasetRequest,
    GenerateDatasetRequest, ProjectId,
};
use crate::error::{CoreError, Result};

/// Upper bound on how many conversations a single job may request.
pub const MAX_SAMPLE_COUNT: u32 = 1000;

/// Step 0 input: hand-written samples or an existing dataset to extend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeedInput {
    Manual {
        name: String,
        samples: Vec<Conversation>,
        sample_count: u32,
        #[serde(default)]
        instructions: String,
    },
    Extend {
        dataset_id: Option<DatasetId>,
        sample_count: u32,
    },
}

impl SeedInput {
    pub fn manual(name: impl Into<String>, samples: Vec<Conversation>, sample_count: u32) -> Self {
        SeedInput::Manual {
            name: name.into(),
            samples,
            sample_count,
            instructions: String::new(),
        }
    }

    pub fn extend(dataset_id: Option<DatasetId>, sample_count: u32) -> Self {
        SeedInput::Extend {
            dataset_id,
            sample_count,
        }
    }

    pub fn with_instructions(mut self, text: impl Into<String>) -> Self {
        if let SeedInput::Manual { instructions, .. } = &mut self {
            *instructions = text.into();
        }
        self
    }

    pub fn sample_count(&self) -> u32 {
        match self {
            SeedInput::Manual { sample_count, .. } | SeedInput::Extend { sample_count, .. } => {
                *sample_count
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.sample_count();
        if count == 0 || count > MAX_SAMPLE_COUNT {
            return Err(CoreError::validation(format!(
                "sample count must be between 1 and {}",
                MAX_SAMPLE_COUNT
            )));
        }

        match self {
            SeedInput::Manual { name, samples, .. } => {
                if name.trim().is_empty() {
                    return Err(CoreError::validation("dataset name is required"));
                }
                validate_conversations(samples)
            }
            SeedInput::Extend { dataset_id, .. } => match dataset_id {
                Some(_) => Ok(()),
                None => Err(CoreError::validation("select a dataset to extend")),
            },
        }
    }
}

/// The backend call a validated seed turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedCall {
    Generate(GenerateDatasetRequest),
    Extend(ExtendDatasetRequest),
}

impl SeedCall {
    pub fn build(seed: &SeedInput, project_id: ProjectId) -> Result<Self> {
        seed.validate()?;
        Ok(match seed {
            SeedInput::Manual {
                name,
                samples,
                sample_count,
                instructions,
            } => SeedCall::Generate(GenerateDatasetRequest {
                project_id,
                name: name.trim().to_string(),
                samples: samples.clone(),
                sample_count: *sample_count,
                instructions: instructions.clone(),
            }),
            SeedInput::Extend {
                dataset_id,
                sample_count,
            } => SeedCall::Extend(ExtendDatasetRequest {
                project_id,
                // validate() guarantees the selection exists
                dataset_id: dataset_id.ok_or_else(|| CoreError::validation("select a dataset to extend"))?,
                sample_count: *sample_count,
            }),
        })
    }
}
