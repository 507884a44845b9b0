use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::grade::Grade;
use crate::domain::EvalResult;

/// Score a conversation must reach on the designated metric to count as a
/// success.
pub const SUCCESS_THRESHOLD: f64 = 0.7;

/// Metric used for the success rate unless configured otherwise.
pub const DEFAULT_SUCCESS_METRIC: &str = "semantic_similarity";

/// Parameters shown first when space is limited.
pub const DEFAULT_PRIORITY: [&str; 4] = ["semantic_similarity", "accuracy", "relevance", "helpfulness"];

/// Lowercases a display name and joins its words with underscores:
/// `"Semantic Similarity"` becomes `semantic_similarity`.
pub fn snake_case(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    static CAMEL: OnceLock<Regex> = OnceLock::new();

    let camel = CAMEL.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let split = camel.replace_all(name.trim(), "${1}_${2}").to_lowercase();
    separators
        .replace_all(&split, "_")
        .trim_matches('_')
        .to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// Snake-case key of the metric the success rate is measured on.
    pub success_metric: String,
    pub success_threshold: f64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            success_metric: DEFAULT_SUCCESS_METRIC.to_string(),
            success_threshold: SUCCESS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAverage {
    pub name: String,
    pub key: String,
    pub average: f64,
    pub count: usize,
}

impl ParameterAverage {
    pub fn grade(&self) -> Grade {
        Grade::from_score(self.average)
    }
}

/// Aggregates derived from a raw result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub conversations_tested: usize,
    pub avg_response_time: f64,
    /// In the order each parameter first appears in the payload.
    pub parameters: Vec<ParameterAverage>,
    pub overall_score: f64,
    pub overall_grade: Grade,
    /// Conversations per grade of their mean score.
    pub grade_distribution: BTreeMap<Grade, usize>,
    pub success_rate: f64,
}

impl ReportSummary {
    pub fn from_results(results: &[EvalResult], options: &ReportOptions) -> Self {
        let conversations_tested = results.len();
        let avg_response_time = mean(results.iter().map(|r| r.response_time)).unwrap_or(0.0);

        let mut parameters: Vec<ParameterAverage> = Vec::new();
        let mut sums: Vec<f64> = Vec::new();
        for eval in results.iter().flat_map(|r| r.evaluations.iter()) {
            let key = snake_case(&eval.name);
            match parameters.iter().position(|p| p.key == key) {
                Some(idx) => {
                    sums[idx] += eval.score;
                    parameters[idx].count += 1;
                }
                None => {
                    parameters.push(ParameterAverage {
                        name: eval.name.clone(),
                        key,
                        average: 0.0,
                        count: 1,
                    });
                    sums.push(eval.score);
                }
            }
        }
        for (param, sum) in parameters.iter_mut().zip(sums) {
            param.average = sum / param.count as f64;
        }

        let overall_score = mean(
            results
                .iter()
                .flat_map(|r| r.evaluations.iter().map(|e| e.score)),
        )
        .unwrap_or(0.0);

        let mut grade_distribution: BTreeMap<Grade, usize> =
            Grade::ALL.iter().map(|g| (*g, 0)).collect();
        for result in results {
            if let Some(score) = result.mean_score() {
                *grade_distribution.entry(Grade::from_score(score)).or_default() += 1;
            }
        }

        let successes = results
            .iter()
            .filter(|r| success_score(r, &options.success_metric) >= options.success_threshold)
            .count();
        let success_rate = if conversations_tested == 0 {
            0.0
        } else {
            successes as f64 / conversations_tested as f64
        };

        Self {
            conversations_tested,
            avg_response_time,
            parameters,
            overall_score,
            overall_grade: Grade::from_score(overall_score),
            grade_distribution,
            success_rate,
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&ParameterAverage> {
        let key = snake_case(key);
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn strongest(&self) -> Option<&ParameterAverage> {
        self.parameters
            .iter()
            .max_by(|a, b| a.average.total_cmp(&b.average))
    }

    pub fn weakest(&self) -> Option<&ParameterAverage> {
        self.parameters
            .iter()
            .min_by(|a, b| a.average.total_cmp(&b.average))
    }

    /// Short human-readable observations, most general first.
    pub fn insights(&self, options: &ReportOptions) -> Vec<String> {
        let mut insights = Vec::new();
        if self.conversations_tested == 0 {
            insights.push("No conversations have been evaluated yet.".to_string());
            return insights;
        }

        insights.push(format!(
            "Tested {} conversation(s) with an average response time of {:.2}s.",
            self.conversations_tested, self.avg_response_time
        ));
        insights.push(format!(
            "{:.0}% of conversations scored at least {:.1} on {}.",
            self.success_rate * 100.0,
            options.success_threshold,
            options.success_metric
        ));
        if let Some(best) = self.strongest() {
            insights.push(format!(
                "Strongest parameter: {} ({:.2}, grade {}).",
                best.name,
                best.average,
                best.grade()
            ));
        }
        if self.parameters.len() > 1 {
            if let Some(worst) = self.weakest() {
                insights.push(format!(
                    "Weakest parameter: {} ({:.2}, grade {}).",
                    worst.name,
                    worst.average,
                    worst.grade()
                ));
            }
        }
        for param in self.parameters.iter().filter(|p| !p.grade().is_passing()) {
            insights.push(format!(
                "{} needs attention: average {:.2} is below {:.1}.",
                param.name, param.average, SUCCESS_THRESHOLD
            ));
        }
        insights
    }
}

/// The score a conversation is judged on for the success rate: the
/// designated metric when present, otherwise the mean of all its scores.
fn success_score(result: &EvalResult, metric: &str) -> f64 {
    let key = snake_case(metric);
    result
        .evaluations
        .iter()
        .find(|e| snake_case(&e.name) == key)
        .map(|e| e.score)
        .or_else(|| result.mean_score())
        .unwrap_or(0.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// How much horizontal room the parameter table has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutWidth {
    Narrow,
    Medium,
    Wide,
}

impl LayoutWidth {
    pub fn from_columns(columns: u16) -> Self {
        match columns {
            0..=79 => LayoutWidth::Narrow,
            80..=119 => LayoutWidth::Medium,
            _ => LayoutWidth::Wide,
        }
    }

    pub fn max_parameters(&self) -> usize {
        match self {
            LayoutWidth::Narrow => 2,
            LayoutWidth::Medium => 3,
            LayoutWidth::Wide => 4,
        }
    }
}

/// Picks the parameters to show as table columns: those named in
/// `priority` first (in that order), then the rest in payload order,
/// truncated to what the layout can hold.
pub fn display_parameters<'a>(
    parameters: &'a [ParameterAverage],
    priority: &[&str],
    width: LayoutWidth,
) -> Vec<&'a ParameterAverage> {
    let keys: Vec<String> = priority.iter().map(|p| snake_case(p)).collect();
    let mut ordered: Vec<&ParameterAverage> = keys
        .iter()
        .filter_map(|k| parameters.iter().find(|p| &p.key == k))
        .collect();
    ordered.extend(parameters.iter().filter(|p| !keys.contains(&p.key)));
    ordered.truncate(width.max_parameters());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvaluationScore;
    use pretty_assertions::assert_eq;

    fn result(time: f64, scores: &[(&str, f64)]) -> EvalResult {
        EvalResult {
            conversation_id: None,
            response_time: time,
            evaluations: scores
                .iter()
                .map(|(n, s)| EvaluationScore::new(*n, *s, "because"))
                .collect(),
        }
    }

    #[test]
    fn snake_case_names() {
        assert_eq!(snake_case("Semantic Similarity"), "semantic_similarity");
        assert_eq!(snake_case("  Tone & Style "), "tone_style");
        assert_eq!(snake_case("responseQuality"), "response_quality");
        assert_eq!(snake_case("accuracy"), "accuracy");
    }

    #[test]
    fn averages_per_parameter() {
        let results = vec![
            result(1.0, &[("Accuracy", 1.0), ("Semantic Similarity", 0.8)]),
            result(3.0, &[("Accuracy", 0.5), ("Semantic Similarity", 0.6)]),
        ];
        let summary = ReportSummary::from_results(&results, &ReportOptions::default());

        assert_eq!(summary.conversations_tested, 2);
        assert_eq!(summary.avg_response_time, 2.0);
        assert_eq!(summary.parameters.len(), 2);
        assert_eq!(summary.parameters[0].key, "accuracy");
        assert_eq!(summary.parameters[0].average, 0.75);
        assert!((summary.parameter("Semantic Similarity").unwrap().average - 0.7).abs() < 1e-12);
    }

    #[test]
    fn success_rate_uses_designated_metric() {
        let results = vec![
            result(1.0, &[("semantic_similarity", 0.9), ("accuracy", 0.1)]),
            result(1.0, &[("semantic_similarity", 0.69), ("accuracy", 1.0)]),
            result(1.0, &[("semantic_similarity", 0.7)]),
            result(1.0, &[("accuracy", 0.8)]),
        ];
        let summary = ReportSummary::from_results(&results, &ReportOptions::default());
        // 0.9 and 0.7 pass; the last falls back to its mean score 0.8
        assert_eq!(summary.success_rate, 0.75);
    }

    #[test]
    fn grade_distribution_counts_conversations() {
        let results = vec![
            result(1.0, &[("a", 0.95)]),
            result(1.0, &[("a", 0.92)]),
            result(1.0, &[("a", 0.4)]),
            result(1.0, &[]),
        ];
        let summary = ReportSummary::from_results(&results, &ReportOptions::default());
        assert_eq!(summary.grade_distribution[&Grade::A], 2);
        assert_eq!(summary.grade_distribution[&Grade::F], 1);
        assert_eq!(summary.grade_distribution[&Grade::B], 0);
    }

    #[test]
    fn empty_payload() {
        let summary = ReportSummary::from_results(&[], &ReportOptions::default());
        assert_eq!(summary.conversations_tested, 0);
        assert_eq!(summary.avg_response_time, 0.0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.overall_grade, Grade::F);
        assert_eq!(
            summary.insights(&ReportOptions::default()),
            vec!["No conversations have been evaluated yet.".to_string()]
        );
    }

    #[test]
    fn insights_name_strongest_and_weakest() {
        let results = vec![result(2.0, &[("Accuracy", 0.95), ("Tone", 0.4)])];
        let summary = ReportSummary::from_results(&results, &ReportOptions::default());
        let insights = summary.insights(&ReportOptions::default());
        assert!(insights.iter().any(|i| i.starts_with("Strongest parameter: Accuracy")));
        assert!(insights.iter().any(|i| i.starts_with("Weakest parameter: Tone")));
        assert!(insights.iter().any(|i| i.starts_with("Tone needs attention")));
    }

    #[test]
    fn display_parameters_respects_priority_and_width() {
        let results = vec![result(
            1.0,
            &[("Tone", 0.5), ("Accuracy", 0.9), ("Brevity", 0.7), ("Semantic Similarity", 0.8), ("Safety", 1.0)],
        )];
        let summary = ReportSummary::from_results(&results, &ReportOptions::default());

        let narrow = display_parameters(&summary.parameters, &DEFAULT_PRIORITY, LayoutWidth::Narrow);
        let keys: Vec<&str> = narrow.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["semantic_similarity", "accuracy"]);

        let wide = display_parameters(&summary.parameters, &DEFAULT_PRIORITY, LayoutWidth::Wide);
        let keys: Vec<&str> = wide.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["semantic_similarity", "accuracy", "tone", "brevity"]);
    }

    #[test]
    fn layout_width_from_terminal_columns() {
        assert_eq!(LayoutWidth::from_columns(60), LayoutWidth::Narrow);
        assert_eq!(LayoutWidth::from_columns(100), LayoutWidth::Medium);
        assert_eq!(LayoutWidth::from_columns(200).max_parameters(), 4);
    }
}
