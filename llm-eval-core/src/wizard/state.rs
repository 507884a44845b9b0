use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{CostEstimate, DatasetId, Experiment, ParameterId};

/// Which entry point a wizard was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardMode {
    /// Seed → review → parameters → experiment.
    QuickStart,
    /// Seed → review; ends once the dataset is saved.
    SynthesizeDataset,
    /// Starts at parameter selection against an existing dataset.
    CreateExperiment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteState {
    Unquoted,
    Quoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "sub_state", rename_all = "snake_case")]
pub enum WizardState {
    Idle,
    Collecting,
    AwaitingGeneration(GenerationState),
    SelectingParameters(QuoteState),
    Submitted,
}

impl WizardState {
    /// Zero-based step index shown to the user, if inside the flow.
    pub fn step(&self) -> Option<u8> {
        match self {
            WizardState::Collecting => Some(0),
            WizardState::AwaitingGeneration(_) => Some(1),
            WizardState::SelectingParameters(_) => Some(2),
            WizardState::Idle | WizardState::Submitted => None,
        }
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardState::Idle => write!(f, "idle"),
            WizardState::Collecting => write!(f, "collecting seed input"),
            WizardState::AwaitingGeneration(GenerationState::Pending) => {
                write!(f, "waiting for generation")
            }
            WizardState::AwaitingGeneration(GenerationState::Ready) => {
                write!(f, "reviewing generated dataset")
            }
            WizardState::SelectingParameters(QuoteState::Unquoted) => {
                write!(f, "selecting parameters (no quote)")
            }
            WizardState::SelectingParameters(QuoteState::Quoted) => {
                write!(f, "selecting parameters (quoted)")
            }
            WizardState::Submitted => write!(f, "submitted"),
        }
    }
}

/// A price tied to the exact selection it was quoted for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub dataset_id: DatasetId,
    pub parameter_ids: BTreeSet<ParameterId>,
    pub estimate: CostEstimate,
}

impl Quote {
    pub fn covers(&self, dataset_id: Option<DatasetId>, parameter_ids: &BTreeSet<ParameterId>) -> bool {
        dataset_id == Some(self.dataset_id) && &self.parameter_ids == parameter_ids
    }

    pub fn price(&self) -> Decimal {
        self.estimate.price
    }
}

/// What a finished wizard produced.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardOutcome {
    DatasetSaved(DatasetId),
    ExperimentCreated(Experiment),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered() {
        assert_eq!(WizardState::Idle.step(), None);
        assert_eq!(WizardState::Collecting.step(), Some(0));
        assert_eq!(WizardState::AwaitingGeneration(GenerationState::Ready).step(), Some(1));
        assert_eq!(WizardState::SelectingParameters(QuoteState::Quoted).step(), Some(2));
    }

    #[test]
    fn quote_covers_exact_selection_only() {
        let dataset = DatasetId::new();
        let a = ParameterId::new();
        let b = ParameterId::new();
        let quote = Quote {
            dataset_id: dataset,
            parameter_ids: BTreeSet::from([a]),
            estimate: CostEstimate {
                price: Decimal::from(2),
                currency: None,
            },
        };
        assert!(quote.covers(Some(dataset), &BTreeSet::from([a])));
        assert!(!quote.covers(Some(dataset), &BTreeSet::from([a, b])));
        assert!(!quote.covers(Some(DatasetId::new()), &BTreeSet::from([a])));
        assert!(!quote.covers(None, &BTreeSet::from([a])));
    }
}
