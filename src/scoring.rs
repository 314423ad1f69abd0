use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::insights;
use crate::models::{
    ActivityEvent, ComponentScores, Difficulty, LearnerScoreProfile, PerformanceLevel,
};

pub const NEUTRAL_ASSESSMENT_SCORE: f64 = 75.0;
pub const NEUTRAL_CONSISTENCY_SCORE: f64 = 50.0;
pub const NEW_LEARNER_SCORE: f64 = 50.0;

pub const NEW_LEARNER_COMPONENTS: ComponentScores = ComponentScores {
    test_score: 50.0,
    quiz_score: 50.0,
    engagement_score: 0.0,
    consistency_score: 50.0,
};

const QUIZ_SCALE: f64 = 0.95;

pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores a learner's history relative to `as_of`.
    ///
    /// Never fails: events with malformed timestamps or scores are skipped by
    /// whichever component needs the bad field, and an empty history yields
    /// the fixed new-learner profile.
    pub fn score(
        &self,
        learner_id: &str,
        activities: &[ActivityEvent],
        as_of: DateTime<Utc>,
    ) -> LearnerScoreProfile {
        if activities.is_empty() {
            return self.new_learner(learner_id, as_of);
        }

        let test_score = self.test_score(activities);
        let quiz_score = quiz_score(activities);
        let engagement_score = self.engagement_score(activities, as_of);
        let consistency_score = consistency_score(activities);

        let weights = &self.config.component_weights;
        let overall = test_score * weights.test_score
            + quiz_score * weights.quiz_score
            + engagement_score * weights.engagement_score
            + consistency_score * weights.consistency_score;

        let overall_score = round2(overall);
        let performance_level = self.config.performance_thresholds.level(overall_score);
        let component_scores = ComponentScores {
            test_score: round2(test_score),
            quiz_score: round2(quiz_score),
            engagement_score: round2(engagement_score),
            consistency_score: round2(consistency_score),
        };

        LearnerScoreProfile {
            learner_id: learner_id.to_string(),
            overall_score,
            performance_level,
            component_scores,
            weighting_used: *weights,
            insights: insights::score_insights(&component_scores),
            guidance: vec![insights::score_guidance(performance_level)],
            timestamp: as_of,
        }
    }

    pub fn new_learner(&self, learner_id: &str, as_of: DateTime<Utc>) -> LearnerScoreProfile {
        LearnerScoreProfile {
            learner_id: learner_id.to_string(),
            overall_score: NEW_LEARNER_SCORE,
            performance_level: PerformanceLevel::NewLearner,
            component_scores: NEW_LEARNER_COMPONENTS,
            weighting_used: self.config.component_weights,
            insights: insights::onboarding_insights(),
            guidance: vec![insights::score_guidance(PerformanceLevel::NewLearner)],
            timestamp: as_of,
        }
    }

    /// Difficulty-adjusted tests, most recent weighted heaviest.
    pub fn test_score(&self, activities: &[ActivityEvent]) -> f64 {
        let mut tests: Vec<(Option<DateTime<Utc>>, f64)> = Vec::new();

        for activity in activities.iter().filter(|a| a.activity_type.is_test()) {
            let Some(score) = activity.valid_score() else {
                debug!(activity_type = %activity.activity_type, "skipping test event without a usable score");
                continue;
            };
            let difficulty = activity.difficulty.unwrap_or(Difficulty::Intermediate);
            let adjusted = (score * self.config.difficulty_multipliers.multiplier(difficulty)).min(100.0);
            tests.push((activity.parsed_timestamp(), adjusted));
        }

        match tests.len() {
            0 => NEUTRAL_ASSESSMENT_SCORE,
            1 => tests[0].1,
            count => {
                // Newest first; undated tests keep their input order at the tail.
                tests.sort_by(|a, b| match (a.0, b.0) {
                    (Some(a), Some(b)) => b.cmp(&a),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                });

                let mut weighted_sum = 0.0;
                let mut total_weight = 0.0;
                for (position, (_, score)) in tests.iter().enumerate() {
                    let weight = recency_weight(position, count);
                    weighted_sum += score * weight;
                    total_weight += weight;
                }
                weighted_sum / total_weight
            }
        }
    }

    pub fn engagement_score(&self, activities: &[ActivityEvent], as_of: DateTime<Utc>) -> f64 {
        if activities.is_empty() {
            return 0.0;
        }

        let cutoff = cutoff_instant(as_of, self.config.recent_window_days);
        let recent = activities
            .iter()
            .filter_map(ActivityEvent::parsed_timestamp)
            .filter(|timestamp| *timestamp >= cutoff)
            .count();
        let frequency = (recent as f64 * 10.0).min(100.0);

        let total_minutes: f64 = activities.iter().map(ActivityEvent::valid_duration).sum();
        let duration = (total_minutes / 60.0 * 5.0).min(100.0);

        let distinct_types: HashSet<_> = activities.iter().map(|a| &a.activity_type).collect();
        let diversity = (distinct_types.len() as f64 * 15.0).min(100.0);

        (frequency * 0.4 + duration * 0.4 + diversity * 0.2).min(100.0)
    }
}

/// Weight for the test at `position` (0 = most recent) out of `count`.
pub fn recency_weight(position: usize, count: usize) -> f64 {
    0.3 + 0.2 * (count - 1 - position) as f64
}

pub fn cutoff_instant(as_of: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    as_of - Duration::days(window_days.max(1))
}

pub fn quiz_score(activities: &[ActivityEvent]) -> f64 {
    let scores: Vec<f64> = activities
        .iter()
        .filter(|a| a.activity_type.is_quiz())
        .filter_map(|activity| {
            let score = activity.valid_score();
            if score.is_none() {
                debug!(activity_type = %activity.activity_type, "skipping quiz event without a usable score");
            }
            score
        })
        .map(|score| (score * QUIZ_SCALE).min(100.0))
        .collect();

    if scores.is_empty() {
        NEUTRAL_ASSESSMENT_SCORE
    } else {
        mean(&scores)
    }
}

/// Regularity of the gaps between activities: `100 / (1 + stdev/mean)` over
/// day gaps, capped at 100.
pub fn consistency_score(activities: &[ActivityEvent]) -> f64 {
    if activities.len() < 3 {
        return NEUTRAL_CONSISTENCY_SCORE;
    }

    let mut timestamps: Vec<DateTime<Utc>> = activities
        .iter()
        .filter_map(|activity| {
            let parsed = activity.parsed_timestamp();
            if parsed.is_none() {
                debug!(timestamp = %activity.timestamp, "skipping unparseable timestamp");
            }
            parsed
        })
        .collect();

    if timestamps.len() < 2 {
        return NEUTRAL_CONSISTENCY_SCORE;
    }

    timestamps.sort();
    let gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days() as f64)
        .collect();

    let avg_gap = mean(&gaps);
    if avg_gap == 0.0 {
        return 100.0;
    }

    let variation = sample_std_dev(&gaps) / avg_gap;
    (100.0 / (1.0 + variation)).min(100.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero when fewer than two values.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        0.0
    } else if len % 2 == 1 {
        sorted[len / 2]
    } else {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerRanking {
    pub rank: usize,
    pub learner_id: String,
    pub score: f64,
    pub performance_level: PerformanceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortStatistics {
    pub highest_score: f64,
    pub lowest_score: f64,
    pub average_score: f64,
    pub median_score: f64,
    pub standard_deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortComparison {
    pub total_learners: usize,
    pub rankings: Vec<LearnerRanking>,
    pub statistics: CohortStatistics,
    pub performance_distribution: BTreeMap<PerformanceLevel, usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    #[error("no learner scores provided")]
    Empty,
}

pub fn compare_learners(profiles: &[LearnerScoreProfile]) -> Result<CohortComparison, CohortError> {
    if profiles.is_empty() {
        return Err(CohortError::Empty);
    }

    let mut ranked: Vec<&LearnerScoreProfile> = profiles.iter().collect();
    ranked.sort_by(|a, b| {
        b.overall_score
            .partial_cmp(&a.overall_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let scores: Vec<f64> = ranked.iter().map(|p| p.overall_score).collect();
    let mut ascending = scores.clone();
    ascending.reverse();

    let mut performance_distribution = BTreeMap::new();
    for profile in &ranked {
        *performance_distribution
            .entry(profile.performance_level)
            .or_insert(0) += 1;
    }

    Ok(CohortComparison {
        total_learners: ranked.len(),
        rankings: ranked
            .iter()
            .enumerate()
            .map(|(index, profile)| LearnerRanking {
                rank: index + 1,
                learner_id: profile.learner_id.clone(),
                score: profile.overall_score,
                performance_level: profile.performance_level,
            })
            .collect(),
        statistics: CohortStatistics {
            highest_score: scores[0],
            lowest_score: scores[scores.len() - 1],
            average_score: mean(&scores),
            median_score: median(&ascending),
            standard_deviation: sample_std_dev(&scores),
        },
        performance_distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn days_before(days: i64) -> String {
        (as_of() - Duration::days(days)).to_rfc3339()
    }

    fn weighted_sum(profile: &LearnerScoreProfile) -> f64 {
        let c = profile.component_scores;
        let w = profile.weighting_used;
        c.test_score * w.test_score
            + c.quiz_score * w.quiz_score
            + c.engagement_score * w.engagement_score
            + c.consistency_score * w.consistency_score
    }

    #[test]
    fn empty_history_yields_new_learner_profile() {
        let profile = ScoreCalculator::default().score("learner-1", &[], as_of());

        assert_eq!(profile.learner_id, "learner-1");
        assert_eq!(profile.overall_score, 50.0);
        assert_eq!(profile.performance_level, PerformanceLevel::NewLearner);
        assert_eq!(profile.component_scores, NEW_LEARNER_COMPONENTS);
        assert_eq!(
            profile.insights,
            vec![
                "Welcome! Start with our beginner-friendly courses",
                "Complete your first activities to get a personalized score",
                "Set up your learning preferences for better recommendations",
            ]
        );
        assert_eq!(profile.guidance[0].kind, "getting_started");
        assert_eq!(profile.timestamp, as_of());
    }

    #[test]
    fn beginner_test_and_quiz_over_ten_days() {
        let activities = vec![
            ActivityEvent::new(days_before(10), "test_completed")
                .with_score(90.0)
                .with_difficulty(Difficulty::Beginner),
            ActivityEvent::new(days_before(0), "quiz_completed").with_score(85.0),
        ];
        let profile = ScoreCalculator::default().score("learner-a", &activities, as_of());
        let c = profile.component_scores;

        assert!((c.test_score - 90.0).abs() < 1e-9);
        assert!((c.quiz_score - 80.75).abs() < 1e-9);
        // Two events: both inside the window, no duration, two distinct types.
        assert!((c.engagement_score - (0.4 * 20.0 + 0.2 * 30.0)).abs() < 1e-9);
        assert_eq!(c.consistency_score, NEUTRAL_CONSISTENCY_SCORE);
        assert!((profile.overall_score - 68.025).abs() < 0.006);
        assert!((profile.overall_score - weighted_sum(&profile)).abs() < 0.011);
        assert_eq!(profile.performance_level, PerformanceLevel::Average);
    }

    #[test]
    fn missing_test_difficulty_counts_as_intermediate() {
        let activities = vec![ActivityEvent::new(days_before(1), "exam_taken").with_score(70.0)];
        let score = ScoreCalculator::default().test_score(&activities);
        assert!((score - 84.0).abs() < 1e-9);
    }

    #[test]
    fn recent_tests_weigh_more() {
        let activities = vec![
            ActivityEvent::new(days_before(20), "test_completed")
                .with_score(40.0)
                .with_difficulty(Difficulty::Beginner),
            ActivityEvent::new(days_before(1), "test_completed")
                .with_score(100.0)
                .with_difficulty(Difficulty::Beginner),
        ];
        let score = ScoreCalculator::default().test_score(&activities);
        // Newest gets 0.5, oldest 0.3.
        let expected = (100.0 * 0.5 + 40.0 * 0.3) / 0.8;
        assert!((score - expected).abs() < 1e-9);

        let mut reversed = activities.clone();
        reversed.reverse();
        assert_eq!(ScoreCalculator::default().test_score(&reversed), score);
    }

    #[test]
    fn adjusted_test_scores_are_capped() {
        let activities = vec![ActivityEvent::new(days_before(1), "test_completed")
            .with_score(90.0)
            .with_difficulty(Difficulty::Expert)];
        assert_eq!(ScoreCalculator::default().test_score(&activities), 100.0);
    }

    #[test]
    fn assessments_default_to_neutral_without_scores() {
        let activities = vec![
            ActivityEvent::new(days_before(1), "test_completed"),
            ActivityEvent::new(days_before(2), "module_completed").with_score(60.0),
        ];
        assert_eq!(ScoreCalculator::default().test_score(&activities), 75.0);
        assert_eq!(quiz_score(&activities), 75.0);
    }

    #[test]
    fn engagement_counts_recent_duration_and_diversity() {
        let activities = vec![
            ActivityEvent::new(days_before(1), "module_completed").with_duration(120.0),
            ActivityEvent::new(days_before(5), "quiz_completed").with_duration(60.0),
            ActivityEvent::new(days_before(45), "project_completed").with_duration(-30.0),
            ActivityEvent::new("garbage", "module_completed").with_duration(60.0),
        ];
        let score = ScoreCalculator::default().engagement_score(&activities, as_of());
        let expected = 0.4 * 20.0 + 0.4 * (240.0 / 60.0 * 5.0) + 0.2 * 45.0;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn evenly_spaced_activity_is_fully_consistent() {
        let activities: Vec<_> = (0..4)
            .map(|i| ActivityEvent::new(days_before(i * 7), "module_completed"))
            .collect();
        assert_eq!(consistency_score(&activities), 100.0);
    }

    #[test]
    fn irregular_gaps_lower_consistency_and_bad_timestamps_are_skipped() {
        let activities = vec![
            ActivityEvent::new(days_before(30), "module_completed"),
            ActivityEvent::new(days_before(28), "module_completed"),
            ActivityEvent::new("not-a-date", "module_completed"),
            ActivityEvent::new(days_before(0), "module_completed"),
        ];
        // Gaps 2 and 28: mean 15, sample stdev sqrt(338).
        let expected = 100.0 / (1.0 + 338f64.sqrt() / 15.0);
        assert!((consistency_score(&activities) - expected).abs() < 1e-9);
    }

    #[test]
    fn consistency_is_neutral_without_enough_parseable_timestamps() {
        let activities = vec![
            ActivityEvent::new("bad", "module_completed"),
            ActivityEvent::new("", "module_completed"),
            ActivityEvent::new(days_before(3), "module_completed"),
        ];
        assert_eq!(consistency_score(&activities), NEUTRAL_CONSISTENCY_SCORE);
    }

    #[test]
    fn same_day_activity_counts_as_consistent() {
        let activities: Vec<_> = (0..3)
            .map(|_| ActivityEvent::new(days_before(2), "quiz_completed"))
            .collect();
        assert_eq!(consistency_score(&activities), 100.0);
    }

    #[test]
    fn compare_ranks_learners_and_summarizes() {
        let calculator = ScoreCalculator::default();
        let strong = vec![
            ActivityEvent::new(days_before(1), "test_completed")
                .with_score(95.0)
                .with_difficulty(Difficulty::Advanced),
            ActivityEvent::new(days_before(2), "quiz_completed").with_score(100.0),
        ];
        let profiles = vec![
            calculator.score("newcomer", &[], as_of()),
            calculator.score("strong", &strong, as_of()),
        ];

        let comparison = compare_learners(&profiles).unwrap();
        assert_eq!(comparison.total_learners, 2);
        assert_eq!(comparison.rankings[0].learner_id, "strong");
        assert_eq!(comparison.rankings[1].rank, 2);
        assert_eq!(comparison.statistics.lowest_score, 50.0);
        assert_eq!(
            comparison.performance_distribution.get(&PerformanceLevel::NewLearner),
            Some(&1)
        );
        assert!(comparison.statistics.standard_deviation > 0.0);
    }

    #[test]
    fn compare_rejects_empty_cohort() {
        assert!(matches!(compare_learners(&[]), Err(CohortError::Empty)));
    }

    fn arb_activity() -> impl Strategy<Value = ActivityEvent> {
        let types = prop::sample::select(vec![
            "test_completed",
            "exam_taken",
            "quiz_completed",
            "quick_assessment",
            "module_completed",
            "assignment_submitted",
            "project_completed",
        ]);
        let difficulty = prop::option::of(prop::sample::select(vec![
            Difficulty::Beginner,
            Difficulty::Intermediate,
            Difficulty::Advanced,
            Difficulty::Expert,
        ]));
        let timestamp = prop_oneof![
            (0i64..400).prop_map(days_before),
            Just("not a timestamp".to_string()),
        ];
        (
            timestamp,
            types,
            -10.0f64..600.0,
            prop::option::of(-20.0f64..130.0),
            difficulty,
        )
            .prop_map(|(timestamp, activity_type, duration, score, difficulty)| ActivityEvent {
                timestamp,
                activity_type: ActivityType::from(activity_type),
                duration,
                score,
                difficulty,
                course_id: None,
            })
    }

    proptest! {
        #[test]
        fn components_stay_in_range(activities in prop::collection::vec(arb_activity(), 1..25)) {
            let profile = ScoreCalculator::default().score("p", &activities, as_of());
            for (_, value) in profile.component_scores.entries() {
                prop_assert!((0.0..=100.0).contains(&value), "component out of range: {}", value);
            }
            prop_assert!((0.0..=100.0).contains(&profile.overall_score));
        }

        #[test]
        fn overall_is_the_weighted_component_sum(activities in prop::collection::vec(arb_activity(), 1..25)) {
            let profile = ScoreCalculator::default().score("p", &activities, as_of());
            prop_assert!((profile.overall_score - weighted_sum(&profile)).abs() < 0.011);
            let level = ScoringConfig::default().performance_thresholds.level(profile.overall_score);
            prop_assert_eq!(profile.performance_level, level);
        }

        #[test]
        fn scoring_is_idempotent(activities in prop::collection::vec(arb_activity(), 0..25)) {
            let calculator = ScoreCalculator::default();
            let first = calculator.score("p", &activities, as_of());
            let second = calculator.score("p", &activities, as_of());
            prop_assert_eq!(first, second);
        }
    }
}
