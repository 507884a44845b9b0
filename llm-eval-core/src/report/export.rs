use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::summary::{ReportOptions, ReportSummary};
use crate::domain::EvalResult;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub experiment_name: String,
    pub project_name: String,
    pub export_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub conversations_tested: usize,
    pub avg_response_time: f64,
    pub semantic_similarity: f64,
    /// Average score keyed by snake-case parameter name.
    pub parameter_scores: BTreeMap<String, f64>,
    pub insights: Vec<String>,
    pub simulation_data: Vec<EvalResult>,
}

/// The downloadable JSON report artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExport {
    pub metadata: ExportMetadata,
    pub report_data: ReportData,
}

impl ReportExport {
    pub fn build(
        experiment_name: impl Into<String>,
        project_name: impl Into<String>,
        results: &[EvalResult],
        options: &ReportOptions,
        export_date: DateTime<Utc>,
    ) -> Self {
        let summary = ReportSummary::from_results(results, options);
        let semantic_similarity = summary
            .parameter("semantic_similarity")
            .map(|p| p.average)
            .unwrap_or(summary.overall_score);

        Self {
            metadata: ExportMetadata {
                experiment_name: experiment_name.into(),
                project_name: project_name.into(),
                export_date,
            },
            report_data: ReportData {
                conversations_tested: summary.conversations_tested,
                avg_response_time: summary.avg_response_time,
                semantic_similarity,
                parameter_scores: summary
                    .parameters
                    .iter()
                    .map(|p| (p.key.clone(), p.average))
                    .collect(),
                insights: summary.insights(options),
                simulation_data: results.to_vec(),
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Recomputes the aggregates from the embedded raw data.
    pub fn recompute(&self, options: &ReportOptions) -> ReportSummary {
        ReportSummary::from_results(&self.report_data.simulation_data, options)
    }

    /// Suggested file name: the experiment name slugged, plus the date.
    pub fn file_name(&self) -> String {
        let slug = super::summary::snake_case(&self.metadata.experiment_name).replace('_', "-");
        let slug = if slug.is_empty() { "experiment".to_string() } else { slug };
        format!(
            "{}-report-{}.json",
            slug,
            self.metadata.export_date.format("%Y-%m-%d")
        )
    }
}
