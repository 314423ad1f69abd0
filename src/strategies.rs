use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{
    Component, ComponentScores, CourseRecord, Difficulty, LearnerProfile, LearnerScoreProfile,
    PerformanceLevel,
};

const SCORE_MATCH_THRESHOLD: f64 = 0.3;
const INTEREST_THRESHOLD: f64 = 0.2;
const GAP_THRESHOLD: f64 = 0.1;
const WEAK_COMPONENT_BELOW: f64 = 65.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ScoreBased,
    DifficultyProgression,
    InterestMatching,
    PerformanceGap,
    Comprehensive,
}

pub type StrategyResult = Result<Vec<RecommendationCandidate>, StrategyError>;

type StrategyFn = fn(&StrategyContext<'_>, usize) -> StrategyResult;

impl StrategyKind {
    /// Declaration order. The ensemble merges in exactly this order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::ScoreBased,
        StrategyKind::DifficultyProgression,
        StrategyKind::InterestMatching,
        StrategyKind::PerformanceGap,
        StrategyKind::Comprehensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoreBased => "score_based",
            Self::DifficultyProgression => "difficulty_progression",
            Self::InterestMatching => "interest_matching",
            Self::PerformanceGap => "performance_gap",
            Self::Comprehensive => "comprehensive",
        }
    }

    fn runner(self) -> StrategyFn {
        match self {
            Self::ScoreBased => score_based,
            Self::DifficultyProgression => difficulty_progression,
            Self::InterestMatching => interest_matching,
            Self::PerformanceGap => performance_gap,
            Self::Comprehensive => comprehensive,
        }
    }

    /// Runs the strategy and rejects any candidate whose match is not a number.
    pub fn run(self, ctx: &StrategyContext<'_>, count: usize) -> StrategyResult {
        let candidates = (self.runner())(ctx, count)?;
        if let Some(bad) = candidates.iter().find(|c| !c.match_score.is_finite()) {
            return Err(StrategyError::NonFiniteMatch {
                course_id: bad.course.id.clone(),
            });
        }
        Ok(candidates)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("overall score {value} is not a finite number")]
    NonFiniteScore { value: f64 },

    #[error("component `{component}` score {value} is not a finite number")]
    NonFiniteComponent { component: &'static str, value: f64 },

    #[error("course `{course_id}` produced a non-finite match score")]
    NonFiniteMatch { course_id: String },
}

/// Shared read-only inputs for every strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub learner: &'a LearnerProfile,
    pub score: &'a LearnerScoreProfile,
    pub catalog: &'a [CourseRecord],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationCandidate {
    pub course: CourseRecord,
    pub match_score: f64,
    pub rationale: String,
    pub contributing_strategies: Vec<StrategyKind>,
}

impl RecommendationCandidate {
    fn new(course: &CourseRecord, match_score: f64, rationale: String, source: StrategyKind) -> Self {
        Self {
            course: course.clone(),
            match_score,
            rationale,
            contributing_strategies: vec![source],
        }
    }
}

/// Stable sort by match score, highest first, then keep `count`.
pub fn rank(mut candidates: Vec<RecommendationCandidate>, count: usize) -> Vec<RecommendationCandidate> {
    candidates.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(count);
    candidates
}

fn finite_overall(score: &LearnerScoreProfile) -> Result<f64, StrategyError> {
    let value = score.overall_score;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StrategyError::NonFiniteScore { value })
    }
}

fn finite_components(scores: &ComponentScores) -> Result<(), StrategyError> {
    for (component, value) in scores.entries() {
        if !value.is_finite() {
            return Err(StrategyError::NonFiniteComponent {
                component: component.as_str(),
                value,
            });
        }
    }
    Ok(())
}

// ── score_based ───────────────────────────────────────────────────────────

pub fn score_based(ctx: &StrategyContext<'_>, count: usize) -> StrategyResult {
    let score = finite_overall(ctx.score)?;
    let level = ctx.score.performance_level;

    let candidates = ctx
        .catalog
        .iter()
        .filter_map(|course| {
            let matched = score_difficulty_match(score, course.difficulty);
            (matched > SCORE_MATCH_THRESHOLD).then(|| {
                RecommendationCandidate::new(
                    course,
                    matched,
                    score_reason(level, course.difficulty),
                    StrategyKind::ScoreBased,
                )
            })
        })
        .collect();

    Ok(rank(candidates, count))
}

/// How well an overall score fits a difficulty's band.
///
/// Inside the band a beginner course decays toward the upper edge only;
/// other bands decay around their midpoint. Outside, the match falls off
/// with distance from the nearest edge and never drops below 0.1.
pub fn score_difficulty_match(score: f64, difficulty: Difficulty) -> f64 {
    let Some((min, max)) = difficulty.band() else {
        return 0.5;
    };

    if (min..=max).contains(&score) {
        let width = max - min;
        if difficulty == Difficulty::Beginner {
            1.0 - (score - min) / width * 0.3
        } else {
            let midpoint = (min + max) / 2.0;
            1.0 - (score - midpoint).abs() / width * 0.5
        }
    } else if score < min {
        if min <= 0.0 {
            return 0.1;
        }
        (1.0 - (min - score) / min).max(0.1)
    } else {
        (1.0 - (score - max) / 30.0).max(0.1)
    }
}

fn score_reason(level: PerformanceLevel, difficulty: Difficulty) -> String {
    match level {
        PerformanceLevel::Excellent => {
            format!("Advanced {difficulty} content suitable for excellent performers")
        }
        PerformanceLevel::VeryGood | PerformanceLevel::Good => {
            format!("Challenging {difficulty} content matched to your skill level")
        }
        PerformanceLevel::Average => {
            format!("Skill-building {difficulty} content to enhance performance")
        }
        _ => format!("Foundational {difficulty} content to build core skills"),
    }
}

// ── difficulty_progression ────────────────────────────────────────────────

pub fn difficulty_progression(ctx: &StrategyContext<'_>, count: usize) -> StrategyResult {
    let score = finite_overall(ctx.score)?;
    let targets = target_difficulties(score);
    let completed = ctx.learner.completed_courses();

    let candidates = ctx
        .catalog
        .iter()
        .filter(|course| targets.contains(&course.difficulty))
        .filter(|course| course.prerequisites_met(&completed))
        .map(|course| {
            RecommendationCandidate::new(
                course,
                progression_score(course.difficulty, score),
                format!("Progressive difficulty match for {} level", course.difficulty),
                StrategyKind::DifficultyProgression,
            )
        })
        .collect();

    Ok(rank(candidates, count))
}

pub fn target_difficulties(score: f64) -> &'static [Difficulty] {
    if score >= 85.0 {
        &[Difficulty::Advanced, Difficulty::Expert]
    } else if score >= 70.0 {
        &[Difficulty::Intermediate, Difficulty::Advanced]
    } else if score >= 60.0 {
        &[Difficulty::Beginner, Difficulty::Intermediate]
    } else {
        &[Difficulty::Beginner]
    }
}

/// Ideal difficulty for a score and the bracket's progression factor.
fn ideal_difficulty(score: f64) -> (Difficulty, f64) {
    if score < 60.0 {
        (Difficulty::Beginner, 1.0)
    } else if score < 75.0 {
        (Difficulty::Intermediate, 1.0)
    } else if score < 90.0 {
        (Difficulty::Advanced, 0.9)
    } else {
        (Difficulty::Expert, 0.8)
    }
}

/// `base × (factor + 0.2 if at most one level above ideal)`, capped at 1.0.
pub fn progression_score(difficulty: Difficulty, score: f64) -> f64 {
    let (ideal, mut factor) = ideal_difficulty(score);
    let base = if difficulty == ideal { 1.0 } else { 0.6 };

    if let (Some(course_level), Some(ideal_level)) = (difficulty.level(), ideal.level()) {
        if course_level <= ideal_level + 1 {
            factor += 0.2;
        }
    }

    (base * factor).min(1.0)
}

// ── interest_matching ─────────────────────────────────────────────────────

pub fn interest_matching(ctx: &StrategyContext<'_>, count: usize) -> StrategyResult {
    let preferences = ctx.learner.normalized_preferences();
    let content_types = ctx.learner.learning_style.preferred_content_types();

    let candidates = ctx
        .catalog
        .iter()
        .filter_map(|course| {
            let matched = interest_score(course, &preferences, content_types);
            (matched > INTEREST_THRESHOLD).then(|| {
                RecommendationCandidate::new(
                    course,
                    matched,
                    interest_reason(course, &preferences),
                    StrategyKind::InterestMatching,
                )
            })
        })
        .collect();

    Ok(rank(candidates, count))
}

/// `preferences` must already be lowercased.
pub fn interest_score(course: &CourseRecord, preferences: &[String], content_types: &[&str]) -> f64 {
    let mut score: f64 = 0.0;

    let subject = course.subject.to_lowercase();
    let subject_match = preferences.iter().any(|pref| {
        subject.contains(pref.as_str()) || (!subject.is_empty() && pref.contains(subject.as_str()))
    });
    if subject_match {
        score += 0.3;
    }

    let tags: Vec<String> = course.tags.iter().map(|tag| tag.to_lowercase()).collect();
    let tag_match = preferences
        .iter()
        .any(|pref| tags.iter().any(|tag| tag.contains(pref.as_str())));
    if tag_match {
        score += 0.2;
    }

    let content_type = course.content_type.to_lowercase();
    if content_types.iter().any(|preferred| *preferred == content_type) {
        score += 0.2;
    }

    score.min(1.0)
}

fn interest_reason(course: &CourseRecord, preferences: &[String]) -> String {
    if preferences.is_empty() {
        format!("Recommended based on your learning profile in {}", course.subject)
    } else {
        let named: Vec<&str> = preferences.iter().take(2).map(String::as_str).collect();
        format!("Matches your interests in {}", named.join(", "))
    }
}

// ── performance_gap ───────────────────────────────────────────────────────

pub fn performance_gap(ctx: &StrategyContext<'_>, count: usize) -> StrategyResult {
    let components = &ctx.score.component_scores;
    finite_components(components)?;

    let weak_areas = weak_areas(components);
    if weak_areas.is_empty() {
        tracing::debug!("no weak components, deferring to score_based");
        return score_based(ctx, count);
    }

    let reason = gap_reason(&weak_areas);
    let candidates = ctx
        .catalog
        .iter()
        .filter_map(|course| {
            let matched = gap_score(course, &weak_areas);
            (matched > GAP_THRESHOLD).then(|| {
                RecommendationCandidate::new(
                    course,
                    matched,
                    reason.clone(),
                    StrategyKind::PerformanceGap,
                )
            })
        })
        .collect();

    Ok(rank(candidates, count))
}

/// Components scoring below 65, in declaration order.
pub fn weak_areas(scores: &ComponentScores) -> Vec<(Component, f64)> {
    scores
        .entries()
        .into_iter()
        .filter(|(_, value)| *value < WEAK_COMPONENT_BELOW)
        .collect()
}

pub fn gap_keywords(component: Component) -> &'static [&'static str] {
    match component {
        Component::TestScore => &["assessment", "exam", "test", "evaluation"],
        Component::QuizScore => &["quiz", "practice", "assessment", "interactive"],
        Component::EngagementScore => &["interactive", "project", "hands-on", "practical"],
        Component::ConsistencyScore => &["fundamentals", "basics", "structure", "regular"],
    }
}

/// Severity of the first weak area the course addresses, scaled to 0.25.
pub fn gap_score(course: &CourseRecord, weak_areas: &[(Component, f64)]) -> f64 {
    let subject = course.subject.to_lowercase();
    let tags: Vec<String> = course.tags.iter().map(|tag| tag.to_lowercase()).collect();

    let addresses =
        |keyword: &&str| subject.contains(*keyword) || tags.iter().any(|tag| tag.contains(*keyword));

    weak_areas
        .iter()
        .find(|(component, _)| gap_keywords(*component).iter().any(|keyword| addresses(keyword)))
        .map(|(_, weak_score)| ((70.0 - weak_score) / 70.0 * 0.25).min(1.0))
        .unwrap_or(0.0)
}

fn gap_reason(weak_areas: &[(Component, f64)]) -> String {
    let labels: Vec<&str> = weak_areas.iter().take(2).map(|(c, _)| c.label()).collect();
    format!("Addresses performance gaps in {}", labels.join(", "))
}

// ── comprehensive ─────────────────────────────────────────────────────────

/// Half from score_based, half from interest_matching; overlapping courses
/// average their matches and are relabeled as comprehensive.
pub fn comprehensive(ctx: &StrategyContext<'_>, count: usize) -> StrategyResult {
    let half = count / 2;
    let by_score = score_based(ctx, half)?;
    let by_interest = interest_matching(ctx, half)?;

    let mut merged: Vec<RecommendationCandidate> = Vec::with_capacity(by_score.len() + by_interest.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for candidate in by_score.into_iter().chain(by_interest) {
        match positions.get(&candidate.course.id) {
            Some(&index) => {
                let existing = &mut merged[index];
                existing.match_score = (existing.match_score + candidate.match_score) / 2.0;
                existing.contributing_strategies = vec![StrategyKind::Comprehensive];
            }
            None => {
                positions.insert(candidate.course.id.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged.truncate(count);
    Ok(merged)
}
