//! At-most-one outstanding call per mutating wizard operation.

use dashmap::DashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GenerateDataset,
    SaveDataset,
    CreateParameter,
    QuoteCost,
    CreateExperiment,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerateDataset => write!(f, "generate dataset"),
            Self::SaveDataset => write!(f, "save dataset"),
            Self::CreateParameter => write!(f, "create parameter"),
            Self::QuoteCost => write!(f, "calculate cost"),
            Self::CreateExperiment => write!(f, "create experiment"),
        }
    }
}

/// Tracks which operations currently have a request in flight.
///
/// Cloning the `Arc` and handing it to several wizards makes them share
/// one set of slots, so two wizards cannot both launch a generation job.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    active: DashSet<Operation>,
}

impl InFlightGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the slot for `op`, failing with [`CoreError::Busy`] if it is
    /// already held. The slot is released when the ticket drops.
    pub fn try_acquire(self: &Arc<Self>, op: Operation) -> Result<InFlightTicket> {
        if !self.active.insert(op) {
            return Err(CoreError::Busy(op.to_string()));
        }
        Ok(InFlightTicket {
            guard: Arc::clone(self),
            op,
        })
    }

    pub fn is_active(&self, op: Operation) -> bool {
        self.active.contains(&op)
    }
}

#[must_use = "the slot is released as soon as the ticket is dropped"]
#[derive(Debug)]
pub struct InFlightTicket {
    guard: Arc<InFlightGuard>,
    op: Operation,
}

impl InFlightTicket {
    pub fn operation(&self) -> Operation {
        self.op
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.guard.active.remove(&self.op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy() {
        let guard = InFlightGuard::new();
        let _ticket = guard.try_acquire(Operation::GenerateDataset).unwrap();
        let err = guard.try_acquire(Operation::GenerateDataset).unwrap_err();
        assert_eq!(err, CoreError::Busy("generate dataset".to_string()));
    }

    #[test]
    fn different_operations_do_not_conflict() {
        let guard = InFlightGuard::new();
        let _a = guard.try_acquire(Operation::QuoteCost).unwrap();
        let _b = guard.try_acquire(Operation::CreateExperiment).unwrap();
        assert!(guard.is_active(Operation::QuoteCost));
        assert!(guard.is_active(Operation::CreateExperiment));
    }

    #[test]
    fn drop_releases_slot() {
        let guard = InFlightGuard::new();
        {
            let ticket = guard.try_acquire(Operation::SaveDataset).unwrap();
            assert_eq!(ticket.operation(), Operation::SaveDataset);
        }
        assert!(!guard.is_active(Operation::SaveDataset));
        assert!(guard.try_acquire(Operation::SaveDataset).is_ok());
    }
}
