use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::ensemble::{Ensemble, StrategyFailure};
use crate::insights::{self, ScoreAnalysis};
use crate::models::{CourseRecord, LearnerProfile, LearnerScoreProfile};
use crate::path::{LearningPath, PathBuilder};
use crate::scoring::ScoreCalculator;
use crate::strategies::{RecommendationCandidate, StrategyContext, StrategyKind};

pub const DEFAULT_RECOMMENDATION_COUNT: usize = 10;

/// A learning path, or the reason none could be built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathOutcome {
    Ready(LearningPath),
    Unavailable { error: String },
}

impl PathOutcome {
    pub fn path(&self) -> Option<&LearningPath> {
        match self {
            PathOutcome::Ready(path) => Some(path),
            PathOutcome::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationMetadata {
    pub total_courses_evaluated: usize,
    pub recommendations_generated: usize,
    pub strategies_used: Vec<StrategyKind>,
    pub failed_strategies: Vec<StrategyFailure>,
    pub personalization_level: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisorReport {
    pub learner_id: String,
    pub score_profile: LearnerScoreProfile,
    pub recommendations: Vec<RecommendationCandidate>,
    pub learning_path: PathOutcome,
    pub insights: Vec<String>,
    pub score_analysis: ScoreAnalysis,
    pub metadata: RecommendationMetadata,
}

pub struct LearningAdvisor {
    calculator: ScoreCalculator,
    ensemble: Ensemble,
    paths: PathBuilder,
}

impl Default for LearningAdvisor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LearningAdvisor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            calculator: ScoreCalculator::new(config.scoring),
            ensemble: Ensemble::new(config.ensemble),
            paths: PathBuilder::new(config.path),
        }
    }

    pub fn calculator(&self) -> &ScoreCalculator {
        &self.calculator
    }

    pub fn score(&self, learner: &LearnerProfile, as_of: DateTime<Utc>) -> LearnerScoreProfile {
        self.calculator.score(&learner.id, &learner.activities, as_of)
    }

    /// Scores the learner, ranks the catalog and lays out a path.
    ///
    /// Always returns a report: failed strategies and a missing path are
    /// recorded in the result rather than returned as errors.
    pub fn advise(
        &self,
        learner: &LearnerProfile,
        catalog: &[CourseRecord],
        count: usize,
        as_of: DateTime<Utc>,
    ) -> AdvisorReport {
        let score_profile = self.score(learner, as_of);
        let ctx = StrategyContext {
            learner,
            score: &score_profile,
            catalog,
        };
        let outcome = self.ensemble.recommend(&ctx, count);

        let learning_path = match self.paths.build(
            &learner.id,
            score_profile.performance_level,
            &outcome.recommendations,
            &learner.completed_courses(),
        ) {
            Ok(path) => PathOutcome::Ready(path),
            Err(err) => PathOutcome::Unavailable {
                error: err.to_string(),
            },
        };

        let components = &score_profile.component_scores;
        let insights = insights::recommendation_insights(
            score_profile.performance_level,
            components,
            &outcome.recommendations,
        );
        let score_analysis = insights::analyze(score_profile.performance_level, components);

        let metadata = RecommendationMetadata {
            total_courses_evaluated: catalog.len(),
            recommendations_generated: outcome.recommendations.len(),
            strategies_used: outcome.strategies_used,
            failed_strategies: outcome.failures,
            personalization_level: insights::personalization_level(components).to_string(),
            timestamp: as_of,
            error: outcome.error,
        };

        AdvisorReport {
            learner_id: learner.id.clone(),
            score_profile,
            recommendations: outcome.recommendations,
            learning_path,
            insights,
            score_analysis,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityEvent, Difficulty, LearningStyle, PerformanceLevel};
    use crate::strategies::tests::{learner, sample_catalog};
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn active_learner() -> LearnerProfile {
        let mut profile = learner(&["programming", "python"], LearningStyle::Kinesthetic);
        profile.activities = vec![
            ActivityEvent::new("2024-02-01T10:00:00", "test_completed")
                .with_score(82.0)
                .with_difficulty(Difficulty::Intermediate)
                .with_duration(45.0),
            ActivityEvent::new("2024-02-08T10:00:00", "quiz_completed")
                .with_score(74.0)
                .with_duration(15.0),
            ActivityEvent::new("2024-02-15T10:00:00", "course_completed")
                .with_course("python-fundamentals")
                .with_duration(120.0),
            ActivityEvent::new("2024-02-22T10:00:00", "module_completed").with_duration(60.0),
        ];
        profile
    }

    #[test]
    fn full_report_ties_score_recommendations_and_path_together() {
        let catalog = sample_catalog();
        let report = LearningAdvisor::default().advise(&active_learner(), &catalog, 5, as_of());

        assert_eq!(report.learner_id, "learner");
        assert!(!report.recommendations.is_empty());
        assert!(report.recommendations.len() <= 5);
        assert!(report
            .recommendations
            .windows(2)
            .all(|pair| pair[0].match_score >= pair[1].match_score));

        let path = report.learning_path.path().unwrap();
        assert_eq!(path.courses.len(), report.recommendations.len().min(6));
        assert_eq!(path.courses[0].course_id, report.recommendations[0].course.id);

        assert_eq!(report.metadata.total_courses_evaluated, catalog.len());
        assert_eq!(report.metadata.recommendations_generated, report.recommendations.len());
        assert!(report.metadata.failed_strategies.is_empty());
        assert!(report.metadata.error.is_none());
        assert_eq!(report.metadata.timestamp, as_of());
        assert_eq!(report.score_analysis.overall_performance, report.score_profile.performance_level);
        assert!(!report.insights.is_empty());
    }

    #[test]
    fn completed_prerequisites_carry_into_the_path() {
        let catalog: Vec<CourseRecord> = sample_catalog()
            .into_iter()
            .filter(|c| c.id == "python-advanced")
            .collect();
        let advisor = LearningAdvisor::default();

        let report = advisor.advise(&active_learner(), &catalog, 10, as_of());
        let path = report.learning_path.path().unwrap();
        assert_eq!(path.courses.len(), 1);
        assert_eq!(path.courses[0].course_id, "python-advanced");
        assert!(path.courses[0].prerequisites_met);

        let newcomer = learner(&[], LearningStyle::Mixed);
        let report = advisor.advise(&newcomer, &catalog, 10, as_of());
        let path = report.learning_path.path().unwrap();
        assert_eq!(path.courses[0].course_id, "python-advanced");
        assert!(!path.courses[0].prerequisites_met);
    }

    #[test]
    fn new_learner_still_gets_a_starting_path() {
        let profile = learner(&[], LearningStyle::Mixed);
        let report = LearningAdvisor::default().advise(&profile, &sample_catalog(), 10, as_of());

        assert_eq!(report.score_profile.performance_level, PerformanceLevel::NewLearner);
        assert_eq!(report.score_profile.overall_score, 50.0);
        assert!(report.learning_path.path().is_some());
        assert_eq!(report.metadata.personalization_level, "Highly Personalized");
    }

    #[test]
    fn empty_catalog_yields_explicit_path_error() {
        let report = LearningAdvisor::default().advise(&active_learner(), &[], 10, as_of());

        assert!(report.recommendations.is_empty());
        assert_eq!(
            report.learning_path,
            PathOutcome::Unavailable {
                error: "No recommendations available for path generation".to_string()
            }
        );
        assert!(report.metadata.error.is_none());

        let json = serde_json::to_value(&report.learning_path).unwrap();
        assert_eq!(json["error"], "No recommendations available for path generation");
    }

    #[test]
    fn identical_inputs_give_identical_reports() {
        let advisor = LearningAdvisor::default();
        let catalog = sample_catalog();
        let learner = active_learner();
        assert_eq!(
            advisor.advise(&learner, &catalog, 8, as_of()),
            advisor.advise(&learner, &catalog, 8, as_of())
        );
    }
}
