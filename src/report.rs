use std::collections::HashMap;
use std::fmt::Write;

use crate::advisor::{AdvisorReport, PathOutcome};
use crate::scoring::CohortComparison;
use crate::strategies::RecommendationCandidate;

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub subject: String,
    pub count: usize,
    pub avg_match: f64,
}

pub fn summarize_by_subject(recommendations: &[RecommendationCandidate]) -> Vec<SubjectSummary> {
    let mut map: HashMap<String, (usize, f64)> = HashMap::new();

    for recommendation in recommendations {
        let entry = map
            .entry(recommendation.course.subject.clone())
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += recommendation.match_score;
    }

    let mut summaries: Vec<SubjectSummary> = map
        .into_iter()
        .map(|(subject, (count, total_match))| SubjectSummary {
            subject,
            count,
            avg_match: if count == 0 {
                0.0
            } else {
                total_match / count as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.subject.cmp(&b.subject)));
    summaries
}

pub fn build_report(report: &AdvisorReport) -> String {
    let profile = &report.score_profile;
    let mut output = String::new();

    let _ = writeln!(output, "# Learning Advisor Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        report.learner_id,
        report.metadata.timestamp.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Score");
    let _ = writeln!(
        output,
        "Overall {:.2} ({})",
        profile.overall_score, profile.performance_level
    );
    for (component, value) in profile.component_scores.entries() {
        let _ = writeln!(output, "- {}: {:.2}", component.label(), value);
    }
    for insight in &profile.insights {
        let _ = writeln!(output, "- {insight}");
    }
    for guidance in &profile.guidance {
        let _ = writeln!(
            output,
            "- Guidance ({}): {}. {}",
            guidance.priority, guidance.title, guidance.description
        );
    }

    let analysis = &report.score_analysis;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Strengths and Gaps");
    if analysis.strengths.is_empty() {
        let _ = writeln!(output, "No standout strengths yet.");
    } else {
        for strength in &analysis.strengths {
            let _ = writeln!(output, "- Strength: {strength}");
        }
    }
    for area in &analysis.improvement_areas {
        let _ = writeln!(output, "- Improve: {area}");
    }
    let _ = writeln!(output, "Recommended focus: {}", analysis.recommended_focus);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if report.recommendations.is_empty() {
        let _ = writeln!(output, "No courses matched this learner.");
    } else {
        for (index, recommendation) in report.recommendations.iter().enumerate() {
            let strategies: Vec<&str> = recommendation
                .contributing_strategies
                .iter()
                .map(|kind| kind.as_str())
                .collect();
            let _ = writeln!(
                output,
                "{}. {} ({}, {}) match {:.2} via {}: {}",
                index + 1,
                recommendation.course.title,
                recommendation.course.subject,
                recommendation.course.difficulty,
                recommendation.match_score,
                strategies.join(", "),
                recommendation.rationale
            );
        }
    }

    let summaries = summarize_by_subject(&report.recommendations);
    if !summaries.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Subject Mix");
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {}: {} courses (avg match {:.2})",
                summary.subject, summary.count, summary.avg_match
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Learning Path");
    match &report.learning_path {
        PathOutcome::Ready(path) => {
            let _ = writeln!(
                output,
                "{} ({} minutes total)",
                path.pathway_name, path.total_estimated_duration
            );
            for course in &path.courses {
                let prerequisites = if course.prerequisites_met {
                    ""
                } else {
                    " [prerequisites pending]"
                };
                let _ = writeln!(
                    output,
                    "- {}: {} ({}, {} min){}",
                    course.estimated_completion,
                    course.title,
                    course.difficulty,
                    course.duration,
                    prerequisites
                );
            }
            for milestone in &path.milestones {
                let _ = writeln!(output, "- Milestone: {}", milestone.milestone);
            }
            for point in &path.assessment_points {
                let _ = writeln!(output, "- {}: {}", point.assessment, point.description);
            }
        }
        PathOutcome::Unavailable { error } => {
            let _ = writeln!(output, "No path available: {error}");
        }
    }

    if !report.insights.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Insights");
        for insight in &report.insights {
            let _ = writeln!(output, "- {insight}");
        }
    }

    let metadata = &report.metadata;
    let used: Vec<&str> = metadata.strategies_used.iter().map(|kind| kind.as_str()).collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Metadata");
    let _ = writeln!(
        output,
        "- {} of {} courses recommended",
        metadata.recommendations_generated, metadata.total_courses_evaluated
    );
    let _ = writeln!(output, "- Strategies used: {}", used.join(", "));
    for failure in &metadata.failed_strategies {
        let _ = writeln!(output, "- Strategy {} failed: {}", failure.strategy, failure.reason);
    }
    let _ = writeln!(output, "- {}", metadata.personalization_level);
    if let Some(error) = &metadata.error {
        let _ = writeln!(output, "- Error: {error}");
    }

    output
}

pub fn build_cohort_report(cohort: &str, comparison: &CohortComparison) -> String {
    let stats = &comparison.statistics;
    let mut output = String::new();

    let _ = writeln!(output, "# Cohort Comparison");
    let _ = writeln!(
        output,
        "Generated for {} ({} learners)",
        cohort, comparison.total_learners
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Statistics");
    let _ = writeln!(output, "- Highest: {:.2}", stats.highest_score);
    let _ = writeln!(output, "- Lowest: {:.2}", stats.lowest_score);
    let _ = writeln!(output, "- Average: {:.2}", stats.average_score);
    let _ = writeln!(output, "- Median: {:.2}", stats.median_score);
    let _ = writeln!(output, "- Std dev: {:.2}", stats.standard_deviation);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rankings");
    for ranking in &comparison.rankings {
        let _ = writeln!(
            output,
            "{}. {} score {:.2} ({})",
            ranking.rank, ranking.learner_id, ranking.score, ranking.performance_level
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance Levels");
    for (level, count) in &comparison.performance_distribution {
        let _ = writeln!(output, "- {level}: {count}");
    }

    output
}
