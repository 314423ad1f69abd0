use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{EnsembleConfig, MergePolicy};
use crate::strategies::{rank, RecommendationCandidate, StrategyContext, StrategyKind, StrategyResult};

pub const ALL_STRATEGIES_FAILED: &str = "all recommendation strategies failed";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleOutcome {
    pub recommendations: Vec<RecommendationCandidate>,
    /// Strategies that produced at least one candidate.
    pub strategies_used: Vec<StrategyKind>,
    pub failures: Vec<StrategyFailure>,
    pub error: Option<String>,
}

impl MergePolicy {
    /// Folds `(weight, match)` contributions, given in declaration order.
    pub fn fold(&self, contributions: &[(f64, f64)]) -> f64 {
        match self {
            MergePolicy::RunningAverage => {
                let mut combined = 0.0;
                for (index, (weight, matched)) in contributions.iter().enumerate() {
                    combined += matched * weight;
                    if index > 0 {
                        combined /= (index + 1) as f64;
                    }
                }
                combined
            }
            MergePolicy::WeightedMean => {
                let total_weight: f64 = contributions.iter().map(|(weight, _)| weight).sum();
                if total_weight <= 0.0 {
                    return 0.0;
                }
                contributions
                    .iter()
                    .map(|(weight, matched)| weight * matched)
                    .sum::<f64>()
                    / total_weight
            }
        }
    }
}

struct Combined {
    candidate: RecommendationCandidate,
    contributions: Vec<(f64, f64)>,
    strategies: Vec<StrategyKind>,
}

pub struct Ensemble {
    config: EnsembleConfig,
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new(EnsembleConfig::default())
    }
}

impl Ensemble {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn recommend(&self, ctx: &StrategyContext<'_>, count: usize) -> EnsembleOutcome {
        let outcomes = self.run_strategies(ctx, count);
        self.combine(outcomes, count)
    }

    /// `combine` re-sorts by declaration order, so merge scores never depend
    /// on how the strategies were scheduled.
    pub fn run_strategies(
        &self,
        ctx: &StrategyContext<'_>,
        count: usize,
    ) -> Vec<(StrategyKind, StrategyResult)> {
        if self.config.parallel {
            StrategyKind::ALL
                .par_iter()
                .map(|kind| (*kind, kind.run(ctx, count)))
                .collect()
        } else {
            StrategyKind::ALL
                .iter()
                .map(|kind| (*kind, kind.run(ctx, count)))
                .collect()
        }
    }

    /// Merges per-strategy results into one ranked list of at most `count`.
    ///
    /// Failed strategies are left out and reported; if every strategy failed
    /// the outcome is empty and carries an error message.
    pub fn combine(
        &self,
        mut outcomes: Vec<(StrategyKind, StrategyResult)>,
        count: usize,
    ) -> EnsembleOutcome {
        outcomes.sort_by_key(|(kind, _)| declaration_index(*kind));

        let attempted = outcomes.len();
        let mut strategies_used = Vec::new();
        let mut failures = Vec::new();
        let mut combined: Vec<Combined> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (kind, result) in outcomes {
            let candidates = match result {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(strategy = %kind, error = %err, "strategy excluded from ensemble");
                    failures.push(StrategyFailure {
                        strategy: kind,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if candidates.is_empty() {
                continue;
            }

            strategies_used.push(kind);
            let weight = self.config.strategy_weights.weight(kind);

            for candidate in candidates {
                let contribution = (weight, candidate.match_score);
                match positions.get(&candidate.course.id) {
                    Some(&index) => {
                        let entry = &mut combined[index];
                        entry.contributions.push(contribution);
                        entry.strategies.push(kind);
                    }
                    None => {
                        positions.insert(candidate.course.id.clone(), combined.len());
                        combined.push(Combined {
                            candidate,
                            contributions: vec![contribution],
                            strategies: vec![kind],
                        });
                    }
                }
            }
        }

        let merged: Vec<RecommendationCandidate> = combined
            .into_iter()
            .map(|entry| {
                let mut candidate = entry.candidate;
                candidate.match_score = self.config.merge.fold(&entry.contributions);
                candidate.contributing_strategies = entry.strategies;
                candidate
            })
            .collect();
        let recommendations = rank(merged, count);

        let error = (attempted > 0 && failures.len() == attempted).then(|| ALL_STRATEGIES_FAILED.to_string());

        info!(
            recommendations = recommendations.len(),
            strategies_used = strategies_used.len(),
            failed = failures.len(),
            "ensemble merged"
        );

        EnsembleOutcome {
            recommendations,
            strategies_used,
            failures,
            error,
        }
    }
}

fn declaration_index(kind: StrategyKind) -> usize {
    StrategyKind::ALL
        .iter()
        .position(|candidate| *candidate == kind)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyWeights;
    use crate::models::{CourseRecord, Difficulty, LearningStyle};
    use crate::strategies::tests::{course, flat_components, learner, profile_with, sample_catalog};
    use crate::strategies::StrategyError;
    use proptest::prelude::*;

    fn candidate(course: &CourseRecord, match_score: f64, kind: StrategyKind) -> RecommendationCandidate {
        RecommendationCandidate {
            course: course.clone(),
            match_score,
            rationale: format!("from {kind}"),
            contributing_strategies: vec![kind],
        }
    }

    fn ensemble(merge: MergePolicy) -> Ensemble {
        Ensemble::new(EnsembleConfig {
            strategy_weights: StrategyWeights::default(),
            merge,
            parallel: false,
        })
    }

    fn two_course_outcomes() -> Vec<(StrategyKind, StrategyResult)> {
        let a = course("a", "Programming", Difficulty::Beginner, "video", &[]);
        let b = course("b", "Design", Difficulty::Beginner, "video", &[]);
        vec![
            (
                StrategyKind::ScoreBased,
                Ok(vec![
                    candidate(&a, 0.9, StrategyKind::ScoreBased),
                    candidate(&b, 0.5, StrategyKind::ScoreBased),
                ]),
            ),
            (
                StrategyKind::InterestMatching,
                Ok(vec![candidate(&a, 0.6, StrategyKind::InterestMatching)]),
            ),
        ]
    }

    #[test]
    fn running_average_divides_after_each_contribution() {
        let outcome = ensemble(MergePolicy::RunningAverage).combine(two_course_outcomes(), 10);

        assert_eq!(outcome.recommendations[0].course.id, "a");
        assert!((outcome.recommendations[0].match_score - (0.9 + 0.6 * 0.9) / 2.0).abs() < 1e-9);
        assert_eq!(
            outcome.recommendations[0].contributing_strategies,
            vec![StrategyKind::ScoreBased, StrategyKind::InterestMatching]
        );
        assert!((outcome.recommendations[1].match_score - 0.5).abs() < 1e-9);
        assert_eq!(
            outcome.strategies_used,
            vec![StrategyKind::ScoreBased, StrategyKind::InterestMatching]
        );
        assert!(outcome.error.is_none());
    }

    #[test]
    fn weighted_mean_normalizes_by_total_weight() {
        let outcome = ensemble(MergePolicy::WeightedMean).combine(two_course_outcomes(), 10);
        let expected = (1.0 * 0.9 + 0.9 * 0.6) / 1.9;
        assert!((outcome.recommendations[0].match_score - expected).abs() < 1e-9);
        assert!((outcome.recommendations[1].match_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn running_average_depends_on_order_and_weighted_mean_does_not() {
        let forward = [(1.0, 0.9), (0.8, 0.5), (0.9, 0.7)];
        let mut backward = forward;
        backward.reverse();

        let running = MergePolicy::RunningAverage;
        assert!((running.fold(&forward) - running.fold(&backward)).abs() > 1e-3);

        let mean = MergePolicy::WeightedMean;
        assert!((mean.fold(&forward) - mean.fold(&backward)).abs() < 1e-12);
    }

    #[test]
    fn merge_follows_declaration_order_not_arrival_order() {
        let engine = ensemble(MergePolicy::RunningAverage);
        let forward = engine.combine(two_course_outcomes(), 10);
        let mut shuffled = two_course_outcomes();
        shuffled.reverse();
        assert_eq!(engine.combine(shuffled, 10), forward);
    }

    #[test]
    fn failed_strategies_are_excluded_and_reported() {
        let mut outcomes = two_course_outcomes();
        outcomes.push((
            StrategyKind::PerformanceGap,
            Err(StrategyError::NonFiniteComponent {
                component: "quiz_score",
                value: f64::NAN,
            }),
        ));
        outcomes.push((StrategyKind::DifficultyProgression, Ok(vec![])));

        let outcome = ensemble(MergePolicy::RunningAverage).combine(outcomes, 10);
        assert_eq!(outcome.recommendations.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].strategy, StrategyKind::PerformanceGap);
        assert!(!outcome.strategies_used.contains(&StrategyKind::DifficultyProgression));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn all_failures_yield_empty_outcome_with_error() {
        let outcomes = StrategyKind::ALL
            .iter()
            .map(|kind| (*kind, Err(StrategyError::NonFiniteScore { value: f64::NAN })))
            .collect();
        let outcome = Ensemble::default().combine(outcomes, 5);

        assert!(outcome.recommendations.is_empty());
        assert!(outcome.strategies_used.is_empty());
        assert_eq!(outcome.failures.len(), 5);
        assert_eq!(outcome.error.as_deref(), Some(ALL_STRATEGIES_FAILED));
    }

    #[test]
    fn nothing_to_recommend_is_not_an_error() {
        let learner = learner(&[], LearningStyle::Mixed);
        let score = profile_with(70.0, flat_components(70.0));
        let ctx = StrategyContext { learner: &learner, score: &score, catalog: &[] };
        let outcome = Ensemble::default().recommend(&ctx, 5);
        assert!(outcome.recommendations.is_empty());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn parallel_execution_matches_sequential() {
        let catalog = sample_catalog();
        let learner = learner(&["programming", "design"], LearningStyle::Visual);
        let score = profile_with(63.0, flat_components(20.0));
        let ctx = StrategyContext { learner: &learner, score: &score, catalog: &catalog };

        let sequential = Ensemble::default().recommend(&ctx, 6);
        let parallel = Ensemble::new(EnsembleConfig {
            parallel: true,
            ..EnsembleConfig::default()
        })
        .recommend(&ctx, 6);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.strategies_used.len(), 5);
    }

    proptest! {
        #[test]
        fn output_is_bounded_and_descending(
            overall in 0.0f64..=100.0,
            component in 0.0f64..=100.0,
            count in 0usize..10,
            weighted in any::<bool>(),
        ) {
            let catalog = sample_catalog();
            let learner = learner(&["programming"], LearningStyle::Kinesthetic);
            let score = profile_with(overall, flat_components(component));
            let ctx = StrategyContext { learner: &learner, score: &score, catalog: &catalog };
            let merge = if weighted { MergePolicy::WeightedMean } else { MergePolicy::RunningAverage };

            let outcome = ensemble(merge).recommend(&ctx, count);
            prop_assert!(outcome.recommendations.len() <= count);
            for pair in outcome.recommendations.windows(2) {
                prop_assert!(pair[0].match_score >= pair[1].match_score);
            }
            let mut ids: Vec<&str> = outcome.recommendations.iter().map(|c| c.course.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), outcome.recommendations.len());
        }
    }
}
