//! Report commands

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use llm_eval_core::domain::{Experiment, ExperimentId, ExperimentStatus};
use llm_eval_core::report::{
    display_parameters, LayoutWidth, ReportExport, ReportOptions, ReportSummary, DEFAULT_PRIORITY,
    DEFAULT_SUCCESS_METRIC, SUCCESS_THRESHOLD,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::context::Context;
use crate::output::{
    finish, format_score, grade_badge, print_field, print_section, status_badge, styled_table,
};

/// Columns assumed when the terminal width cannot be detected
const FALLBACK_COLUMNS: u16 = 100;

/// Experiment report commands
#[derive(Debug, Args)]
pub struct ReportCommands {
    #[command(subcommand)]
    pub command: ReportSubcommand,
}

/// Options shared by every report view
#[derive(Debug, Clone, Args)]
pub struct ScoringArgs {
    /// Metric the success rate is measured on
    #[arg(long, default_value = DEFAULT_SUCCESS_METRIC)]
    pub success_metric: String,

    /// Score a conversation needs on that metric to count as a success
    #[arg(long, default_value_t = SUCCESS_THRESHOLD)]
    pub threshold: f64,
}

impl ScoringArgs {
    pub fn options(&self) -> Result<ReportOptions> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("--threshold must be between 0 and 1, got {}", self.threshold);
        }
        Ok(ReportOptions {
            success_metric: self.success_metric.clone(),
            success_threshold: self.threshold,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum ReportSubcommand {
    /// Render an experiment's report in the terminal
    Show {
        /// Experiment ID
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        experiment: Option<ExperimentId>,

        /// Render a previously exported report file instead
        #[arg(long)]
        file: Option<PathBuf>,

        /// Table width in columns (defaults to the terminal width)
        #[arg(long)]
        width: Option<u16>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// Write an experiment's report to a JSON file
    Export {
        /// Experiment ID
        experiment: ExperimentId,

        /// Output file (defaults to <experiment>-report-<date>.json)
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },
}

/// Execute report commands
pub async fn execute(ctx: &Context, cmd: ReportCommands) -> Result<()> {
    match cmd.command {
        ReportSubcommand::Show {
            experiment,
            file,
            width,
            scoring,
        } => {
            let options = scoring.options()?;
            match (experiment, file) {
                (_, Some(path)) => show_file(ctx, &path, width, &options),
                (Some(id), None) => show(ctx, id, width, &options).await,
                (None, None) => bail!("Pass an experiment ID or --file"),
            }
        }
        ReportSubcommand::Export {
            experiment,
            out,
            scoring,
        } => export(ctx, experiment, out, &scoring.options()?).await,
    }
}

/// Machine-readable report view
#[derive(Debug, Serialize)]
struct ReportView<'a> {
    experiment: Option<&'a str>,
    status: Option<ExperimentStatus>,
    success_metric: &'a str,
    #[serde(flatten)]
    summary: &'a ReportSummary,
    insights: Vec<String>,
}

async fn fetch_experiment(ctx: &Context, id: ExperimentId) -> Result<Experiment> {
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Fetching experiment...");
    let result = client.experiments().get(id).await;
    finish(spinner);
    result.context("Failed to get experiment")
}

async fn show(
    ctx: &Context,
    id: ExperimentId,
    width: Option<u16>,
    options: &ReportOptions,
) -> Result<()> {
    let experiment = fetch_experiment(ctx, id).await?;
    render_experiment(ctx, &experiment, width, options)
}

fn show_file(ctx: &Context, path: &Path, width: Option<u16>, options: &ReportOptions) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let export = ReportExport::from_json(&raw)
        .with_context(|| format!("{} is not a report export", path.display()))?;
    let summary = export.recompute(options);

    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&ReportView {
            experiment: Some(&export.metadata.experiment_name),
            status: None,
            success_metric: &options.success_metric,
            summary: &summary,
            insights: summary.insights(options),
        });
    }

    print_section(&format!("Report: {}", export.metadata.experiment_name));
    print_field("Project", &export.metadata.project_name);
    print_field(
        "Exported",
        &crate::output::format_timestamp(&export.metadata.export_date),
    );
    render_summary(&summary, options, width);
    Ok(())
}

/// Renders the report for one experiment, or says it is still running.
pub(crate) fn render_experiment(
    ctx: &Context,
    experiment: &Experiment,
    width: Option<u16>,
    options: &ReportOptions,
) -> Result<()> {
    let status = experiment.status();
    let summary = ReportSummary::from_results(experiment.results(), options);

    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&ReportView {
            experiment: Some(&experiment.name),
            status: Some(status),
            success_metric: &options.success_metric,
            summary: &summary,
            insights: summary.insights(options),
        });
    }

    print_section(&format!("Report: {}", experiment.name));
    print_field("Status", &status_badge(&status.to_string()));
    if status != ExperimentStatus::Completed {
        ctx.output
            .info("Results appear once the experiment completes. Check again later.");
        return Ok(());
    }
    render_summary(&summary, options, width);
    Ok(())
}

fn render_summary(summary: &ReportSummary, options: &ReportOptions, width: Option<u16>) {
    print_field("Conversations tested", &summary.conversations_tested.to_string());
    print_field(
        "Avg response time",
        &format!("{:.2}s", summary.avg_response_time),
    );
    print_field(
        "Overall score",
        &format!(
            "{} ({})",
            format_score(summary.overall_score),
            grade_badge(summary.overall_grade)
        ),
    );
    print_field(
        "Success rate",
        &format!(
            "{} on {}",
            format_score(summary.success_rate),
            options.success_metric
        ),
    );

    let layout = LayoutWidth::from_columns(width.unwrap_or_else(terminal_columns));
    let table = parameter_table(summary, layout);
    println!("\n{table}");
    let hidden = summary
        .parameters
        .len()
        .saturating_sub(layout.max_parameters());
    if hidden > 0 {
        println!(
            "{}",
            format!(
                "{} more parameter(s) hidden; widen the terminal or use -o json",
                hidden
            )
            .dimmed()
        );
    }

    print_section("Grade distribution");
    let most = summary.grade_distribution.values().copied().max().unwrap_or(0);
    for (grade, count) in &summary.grade_distribution {
        println!(
            "  {}  {:<24} {}",
            grade_badge(*grade),
            bar(*count, most, 24),
            count
        );
    }

    print_section("Insights");
    for insight in summary.insights(options) {
        println!("  • {}", insight);
    }
}

fn parameter_table(summary: &ReportSummary, layout: LayoutWidth) -> Table {
    let mut table = styled_table(&["Parameter", "Average", "Grade", "Scores"]);
    for param in display_parameters(&summary.parameters, &DEFAULT_PRIORITY, layout) {
        table.add_row(vec![
            Cell::new(&param.name),
            Cell::new(format_score(param.average)).set_alignment(CellAlignment::Right),
            Cell::new(grade_badge(param.grade())),
            Cell::new(param.count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    "█".repeat((count * width).div_ceil(max))
}

fn terminal_columns() -> u16 {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .or_else(|| Table::new().width())
        .unwrap_or(FALLBACK_COLUMNS)
}

/// Result of writing an export file
#[derive(Debug, Serialize)]
struct ExportWritten {
    path: PathBuf,
    conversations: usize,
}

async fn export(
    ctx: &Context,
    id: ExperimentId,
    out: Option<PathBuf>,
    options: &ReportOptions,
) -> Result<()> {
    let client = ctx.create_client().await?;
    let spinner = ctx.output.spinner("Fetching experiment...");
    let result = client.experiments().get(id).await;
    finish(spinner);
    let experiment = result.context("Failed to get experiment")?;

    if experiment.status() != ExperimentStatus::Completed {
        bail!(
            "Experiment '{}' has no results yet; export once it completes",
            experiment.name
        );
    }

    let project_name = match client.projects().get(experiment.project_id).await {
        Ok(project) => project.name,
        Err(e) => {
            warn!(error = %e, "could not resolve project name for export");
            experiment.project_id.to_string()
        }
    };

    let report = ReportExport::build(
        &experiment.name,
        project_name,
        experiment.results(),
        options,
        chrono::Utc::now(),
    );
    let path = out.unwrap_or_else(|| PathBuf::from(report.file_name()));
    std::fs::write(&path, report.to_json_pretty()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let written = ExportWritten {
        conversations: report.report_data.conversations_tested,
        path,
    };
    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&written);
    }
    ctx.output.success(&format!(
        "Exported report for {} conversation(s) to {}",
        written.conversations,
        written.path.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_eval_core::domain::{EvalResult, EvaluationScore};

    fn summary(names: &[&str]) -> ReportSummary {
        let result = EvalResult {
            conversation_id: None,
            response_time: 1.0,
            evaluations: names
                .iter()
                .map(|n| EvaluationScore::new(*n, 0.8, ""))
                .collect(),
        };
        ReportSummary::from_results(&[result], &ReportOptions::default())
    }

    #[test]
    fn test_bar_scales_to_width() {
        assert_eq!(bar(0, 0, 10), "");
        assert_eq!(bar(5, 5, 10).chars().count(), 10);
        assert_eq!(bar(1, 4, 10).chars().count(), 3);
        assert_eq!(bar(0, 4, 10), "");
    }

    #[test]
    fn test_parameter_table_respects_layout() {
        let s = summary(&["Tone", "Accuracy", "Relevance", "Semantic Similarity", "Brevity"]);
        let narrow = parameter_table(&s, LayoutWidth::Narrow);
        assert_eq!(narrow.row_iter().count(), 2);
        let wide = parameter_table(&s, LayoutWidth::Wide);
        assert_eq!(wide.row_iter().count(), 4);
    }

    #[test]
    fn test_threshold_validation() {
        let args = ScoringArgs {
            success_metric: "accuracy".to_string(),
            threshold: 1.5,
        };
        assert!(args.options().is_err());

        let args = ScoringArgs {
            success_metric: "accuracy".to_string(),
            threshold: 0.6,
        };
        let options = args.options().unwrap();
        assert_eq!(options.success_metric, "accuracy");
        assert_eq!(options.success_threshold, 0.6);
    }
}
