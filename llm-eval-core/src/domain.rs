pub mod ids;
pub mod project;
pub mod dataset;
pub mod parameter;
pub mod experiment;
pub mod requests;

pub use ids::*;
pub use project::*;
pub use dataset::*;
pub use parameter::*;
pub use experiment::*;
pub use requests::*;
