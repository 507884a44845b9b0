pub mod domain;
pub mod error;
pub mod report;
pub mod traits;
pub mod wizard;

pub use domain::*;
pub use error::*;
pub use traits::*;
