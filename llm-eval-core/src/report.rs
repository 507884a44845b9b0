//! Client-side aggregation of experiment results.
//!
//! Everything here is a pure function of the raw result payload; nothing is
//! fetched or persisted.

pub mod export;
pub mod grade;
pub mod summary;

pub use export::{ExportMetadata, ReportData, ReportExport};
pub use grade::Grade;
pub use summary::{
    display_parameters, snake_case, LayoutWidth, ParameterAverage, ReportOptions, ReportSummary,
    DEFAULT_PRIORITY, DEFAULT_SUCCESS_METRIC, SUCCESS_THRESHOLD,
};
