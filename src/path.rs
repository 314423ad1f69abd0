use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::config::PathConfig;
use crate::models::{Difficulty, PerformanceLevel};
use crate::strategies::RecommendationCandidate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathCourse {
    pub sequence: usize,
    pub course_id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub duration: u32,
    pub rationale: String,
    pub prerequisites_met: bool,
    pub estimated_completion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub milestone: String,
    pub description: String,
    pub sequence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentPoint {
    pub assessment: String,
    pub description: String,
    pub sequence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningPath {
    pub learner_id: String,
    pub pathway_name: String,
    pub total_estimated_duration: u64,
    pub courses: Vec<PathCourse>,
    pub milestones: Vec<Milestone>,
    pub assessment_points: Vec<AssessmentPoint>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("No recommendations available for path generation")]
    NoRecommendations,
}

pub struct PathBuilder {
    config: PathConfig,
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new(PathConfig::default())
    }
}

impl PathBuilder {
    pub fn new(config: PathConfig) -> Self {
        Self { config }
    }

    /// Sequences the best-matching recommendations into weekly steps with
    /// periodic milestones and assessment checkpoints.
    pub fn build(
        &self,
        learner_id: &str,
        level: PerformanceLevel,
        recommendations: &[RecommendationCandidate],
        completed_courses: &HashSet<String>,
    ) -> Result<LearningPath, PathError> {
        if recommendations.is_empty() {
            warn!(learner_id, "no recommendations to build a learning path from");
            return Err(PathError::NoRecommendations);
        }

        let mut ranked: Vec<&RecommendationCandidate> = recommendations.iter().collect();
        ranked.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.config.max_courses);
        if ranked.is_empty() {
            warn!(learner_id, "path length limit leaves no courses");
            return Err(PathError::NoRecommendations);
        }

        let mut path = LearningPath {
            learner_id: learner_id.to_string(),
            pathway_name: format!("{} Learning Path", title_case(level.as_str())),
            total_estimated_duration: 0,
            courses: Vec::with_capacity(ranked.len()),
            milestones: Vec::new(),
            assessment_points: Vec::new(),
        };

        for (index, recommendation) in ranked.into_iter().enumerate() {
            let sequence = index + 1;
            let course = &recommendation.course;

            path.courses.push(PathCourse {
                sequence,
                course_id: course.id.clone(),
                title: course.title.clone(),
                difficulty: course.difficulty,
                duration: course.duration,
                rationale: recommendation.rationale.clone(),
                prerequisites_met: course.prerequisites_met(completed_courses),
                estimated_completion: format!("Week {sequence}"),
            });
            path.total_estimated_duration += u64::from(course.duration);

            if sequence.checked_rem(self.config.milestone_every) == Some(0) {
                path.milestones.push(Milestone {
                    milestone: format!("Complete {sequence} courses"),
                    description: format!("Assessment and review after completing {sequence} courses"),
                    sequence: sequence / self.config.milestone_every,
                });
            }

            if sequence.checked_rem(self.config.assessment_every) == Some(0) {
                let checkpoint = sequence / self.config.assessment_every;
                path.assessment_points.push(AssessmentPoint {
                    assessment: format!("Progress Check {checkpoint}"),
                    description: format!("Comprehensive assessment after {sequence} courses"),
                    sequence: checkpoint,
                });
            }
        }

        Ok(path)
    }
}

/// Uppercases the first letter of each alphabetic run and lowercases the rest.
pub fn title_case(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_alphabetic = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_alphabetic {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            output.push(ch);
            previous_alphabetic = false;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::tests::course;
    use crate::strategies::StrategyKind;
    use proptest::prelude::*;

    fn recommendations(count: usize) -> Vec<RecommendationCandidate> {
        (0..count)
            .map(|i| {
                let mut record = course(&format!("course-{i}"), "Programming", Difficulty::Beginner, "video", &[]);
                record.duration = 60 + i as u32 * 10;
                RecommendationCandidate {
                    course: record,
                    // Ascending on purpose; the builder re-sorts.
                    match_score: 0.1 + i as f64 * 0.05,
                    rationale: format!("reason {i}"),
                    contributing_strategies: vec![StrategyKind::ScoreBased],
                }
            })
            .collect()
    }

    #[test]
    fn builds_six_week_path_from_best_matches() {
        let recs = recommendations(8);
        let path = PathBuilder::default()
            .build("learner-1", PerformanceLevel::Good, &recs, &HashSet::new())
            .unwrap();

        assert_eq!(path.pathway_name, "Good Learning Path");
        assert_eq!(path.courses.len(), 6);
        assert_eq!(path.courses[0].course_id, "course-7");
        assert_eq!(path.courses[5].course_id, "course-2");
        assert_eq!(path.courses[0].estimated_completion, "Week 1");
        assert_eq!(path.courses[5].sequence, 6);

        let expected: u64 = (2..8).map(|i| 60 + i * 10).sum();
        assert_eq!(path.total_estimated_duration, expected);

        assert_eq!(path.milestones.len(), 3);
        assert_eq!(path.milestones[1].milestone, "Complete 4 courses");
        assert_eq!(path.milestones[1].sequence, 2);
        assert_eq!(path.assessment_points.len(), 2);
        assert_eq!(path.assessment_points[1].assessment, "Progress Check 2");
        assert_eq!(
            path.assessment_points[0].description,
            "Comprehensive assessment after 3 courses"
        );
    }

    #[test]
    fn short_paths_get_fewer_checkpoints() {
        let path = PathBuilder::default()
            .build("learner-1", PerformanceLevel::Average, &recommendations(1), &HashSet::new())
            .unwrap();
        assert_eq!(path.courses.len(), 1);
        assert!(path.milestones.is_empty());
        assert!(path.assessment_points.is_empty());
    }

    #[test]
    fn flags_unmet_prerequisites() {
        let mut recs = recommendations(2);
        recs[1].course.prerequisites = vec!["Python-Fundamentals".to_string()];
        recs[0].course.prerequisites = vec!["calculus".to_string()];
        let completed: HashSet<String> = ["python-fundamentals".to_string()].into_iter().collect();

        let path = PathBuilder::default()
            .build("learner-1", PerformanceLevel::Good, &recs, &completed)
            .unwrap();
        assert!(path.courses[0].prerequisites_met);
        assert!(!path.courses[1].prerequisites_met);
    }

    #[test]
    fn empty_recommendations_are_an_explicit_error() {
        let result = PathBuilder::default().build("learner-1", PerformanceLevel::Good, &[], &HashSet::new());
        assert_eq!(result, Err(PathError::NoRecommendations));
    }

    #[test]
    fn long_courses_sum_without_overflow() {
        let mut recs = recommendations(3);
        for rec in &mut recs {
            rec.course.duration = i32::MAX as u32;
        }
        let path = PathBuilder::default()
            .build("learner-1", PerformanceLevel::Good, &recs, &HashSet::new())
            .unwrap();
        assert_eq!(path.total_estimated_duration, 3 * i32::MAX as u64);
    }

    #[test]
    fn zero_course_limit_is_not_an_empty_path() {
        let builder = PathBuilder::new(PathConfig {
            max_courses: 0,
            ..PathConfig::default()
        });
        let result = builder.build("learner-1", PerformanceLevel::Good, &recommendations(4), &HashSet::new());
        assert_eq!(result, Err(PathError::NoRecommendations));
    }

    #[test]
    fn pathway_names_title_case_each_word() {
        assert_eq!(title_case("very_good"), "Very_Good");
        assert_eq!(title_case("new_learner"), "New_Learner");
        assert_eq!(title_case("EXCELLENT"), "Excellent");
    }

    proptest! {
        #[test]
        fn checkpoint_counts_follow_cadence(count in 1usize..15) {
            let recs = recommendations(count);
            let path = PathBuilder::default()
                .build("p", PerformanceLevel::Good, &recs, &HashSet::new())
                .unwrap();
            let k = path.courses.len();
            prop_assert_eq!(k, count.min(6));
            prop_assert_eq!(path.milestones.len(), k / 2);
            prop_assert_eq!(path.assessment_points.len(), k / 3);
            let total: u64 = path.courses.iter().map(|c| u64::from(c.duration)).sum();
            prop_assert_eq!(path.total_estimated_duration, total);
        }
    }
}
