//! SDK resource modules
//!
//! One client per backend resource. Every path is a backend function name;
//! lookups pass ids as query parameters, mutations post a JSON body.

pub mod datasets;
pub mod experiments;
pub mod parameters;
pub mod projects;

pub use datasets::{DatasetsClient, NewDataset};
pub use experiments::ExperimentsClient;
pub use parameters::ParametersClient;
pub use projects::ProjectsClient;

use serde::Serialize;

/// Body of the `*-delete` functions.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct IdBody<T: Serialize> {
    pub id: T,
}
