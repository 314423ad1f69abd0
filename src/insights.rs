use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Component, ComponentScores, Difficulty, PerformanceLevel, ScoreGuidance};
use crate::strategies::RecommendationCandidate;

pub const STRENGTH_THRESHOLD: f64 = 80.0;
pub const IMPROVEMENT_THRESHOLD: f64 = 65.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreAnalysis {
    pub overall_performance: PerformanceLevel,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
    pub recommended_focus: String,
}

pub fn analyze(level: PerformanceLevel, scores: &ComponentScores) -> ScoreAnalysis {
    ScoreAnalysis {
        overall_performance: level,
        strengths: strengths(scores),
        improvement_areas: improvement_areas(scores),
        recommended_focus: recommended_focus(scores).to_string(),
    }
}

/// One line per component, in component order.
pub fn score_insights(scores: &ComponentScores) -> Vec<String> {
    let test = if scores.test_score >= 85.0 {
        "Excellent test performance - strong grasp of concepts"
    } else if scores.test_score >= 70.0 {
        "Good test performance with room for improvement"
    } else {
        "Test scores suggest need for concept review"
    };

    let quiz = if scores.quiz_score >= 80.0 {
        "Strong quiz performance - quick recall and understanding"
    } else if scores.quiz_score >= 65.0 {
        "Steady quiz performance"
    } else {
        "Quiz scores indicate need for more practice"
    };

    let engagement = if scores.engagement_score >= 80.0 {
        "Highly engaged learner with consistent activity"
    } else if scores.engagement_score >= 60.0 {
        "Good engagement level"
    } else {
        "Consider increasing learning activity frequency"
    };

    let consistency = if scores.consistency_score >= 75.0 {
        "Consistent learning schedule detected"
    } else if scores.consistency_score >= 50.0 {
        "Moderate learning consistency"
    } else {
        "Irregular learning pattern - consider scheduling"
    };

    [test, quiz, engagement, consistency]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn onboarding_insights() -> Vec<String> {
    [
        "Welcome! Start with our beginner-friendly courses",
        "Complete your first activities to get a personalized score",
        "Set up your learning preferences for better recommendations",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn score_guidance(level: PerformanceLevel) -> ScoreGuidance {
    let (kind, title, description, priority, suggested_difficulty) = match level {
        PerformanceLevel::Excellent => (
            "advanced_content",
            "Challenge Yourself with Advanced Topics",
            "Your excellent performance suggests you're ready for more challenging material.",
            "high",
            Difficulty::Advanced,
        ),
        PerformanceLevel::VeryGood | PerformanceLevel::Good => (
            "skill_building",
            "Reinforce Core Concepts",
            "Continue building on your solid foundation with targeted practice.",
            "medium",
            Difficulty::Intermediate,
        ),
        PerformanceLevel::Average => (
            "foundational_review",
            "Strengthen Fundamentals",
            "Focus on reviewing core concepts to improve overall performance.",
            "high",
            Difficulty::Beginner,
        ),
        PerformanceLevel::NewLearner => (
            "getting_started",
            "Start Your Learning Journey",
            "Begin with foundational courses to establish your learning profile.",
            "high",
            Difficulty::Beginner,
        ),
        PerformanceLevel::BelowAverage | PerformanceLevel::NeedsImprovement => (
            "remedial_support",
            "Comprehensive Review Needed",
            "Consider starting with foundational materials and seeking additional support.",
            "urgent",
            Difficulty::Beginner,
        ),
    };

    ScoreGuidance {
        kind: kind.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        priority: priority.to_string(),
        suggested_difficulty,
    }
}

pub fn strengths(scores: &ComponentScores) -> Vec<String> {
    scores
        .entries()
        .into_iter()
        .filter(|(_, value)| *value >= STRENGTH_THRESHOLD)
        .map(|(component, _)| {
            match component {
                Component::TestScore => "Strong test-taking abilities",
                Component::QuizScore => "Excellent quick learning and recall",
                Component::EngagementScore => "High learning engagement and activity",
                Component::ConsistencyScore => "Consistent learning habits",
            }
            .to_string()
        })
        .collect()
}

pub fn improvement_areas(scores: &ComponentScores) -> Vec<String> {
    scores
        .entries()
        .into_iter()
        .filter(|(_, value)| *value < IMPROVEMENT_THRESHOLD)
        .map(|(component, _)| {
            match component {
                Component::TestScore => "Test performance and concept retention",
                Component::QuizScore => "Quick knowledge assessment and recall",
                Component::EngagementScore => "Learning activity and participation",
                Component::ConsistencyScore => "Regular learning schedule",
            }
            .to_string()
        })
        .collect()
}

/// Focus phrase for the weakest component; ties go to the earlier component.
pub fn recommended_focus(scores: &ComponentScores) -> &'static str {
    let entries = scores.entries();
    let mut weakest = entries[0];
    for entry in &entries[1..] {
        if entry.1 < weakest.1 {
            weakest = *entry;
        }
    }

    match weakest.0 {
        Component::TestScore => "Practice tests and concept reinforcement",
        Component::QuizScore => "Quick assessments and interactive learning",
        Component::EngagementScore => "Hands-on projects and interactive content",
        Component::ConsistencyScore => "Structured learning schedule and routine",
    }
}

pub fn personalization_level(scores: &ComponentScores) -> &'static str {
    let data_rich = scores
        .entries()
        .iter()
        .filter(|(_, value)| *value > 0.0)
        .count();

    match data_rich {
        n if n >= 3 => "Highly Personalized",
        2 => "Moderately Personalized",
        _ => "Basic Personalization",
    }
}

pub fn recommendation_insights(
    level: PerformanceLevel,
    scores: &ComponentScores,
    recommendations: &[RecommendationCandidate],
) -> Vec<String> {
    let mut insights = Vec::new();

    insights.push(
        match level {
            PerformanceLevel::Excellent => {
                "Your excellent performance opens doors to advanced specialized content"
            }
            PerformanceLevel::VeryGood | PerformanceLevel::Good => {
                "Your solid performance qualifies you for intermediate and advanced courses"
            }
            PerformanceLevel::Average => {
                "Focus on strengthening fundamentals with our recommended beginner courses"
            }
            _ => "Personalized foundational content will help build your knowledge base",
        }
        .to_string(),
    );

    if scores.test_score < 60.0 {
        insights.push(
            "Recommended courses include more practice opportunities to improve test performance"
                .to_string(),
        );
    }
    if scores.quiz_score < 60.0 {
        insights.push("Interactive content and quick assessments will boost your quiz scores".to_string());
    }
    if scores.engagement_score < 50.0 {
        insights.push(
            "Highly engaging, interactive courses recommended to increase participation".to_string(),
        );
    }

    if recommendations.len() > 5 {
        insights.push("Diverse course mix covering multiple subjects and skill levels".to_string());
    }

    let content_types: HashSet<&str> = recommendations
        .iter()
        .map(|r| r.course.content_type.as_str())
        .collect();
    if content_types.len() > 3 {
        insights.push(
            "Varied content types (videos, interactive, projects) to match different learning preferences"
                .to_string(),
        );
    }

    insights
}
