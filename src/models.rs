use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ComponentWeights;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    TestCompleted,
    ExamTaken,
    AssessmentCompleted,
    QuizCompleted,
    QuizTaken,
    QuickAssessment,
    ModuleCompleted,
    AssignmentSubmitted,
    ProjectCompleted,
    CourseCompleted,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TestCompleted => "test_completed",
            Self::ExamTaken => "exam_taken",
            Self::AssessmentCompleted => "assessment_completed",
            Self::QuizCompleted => "quiz_completed",
            Self::QuizTaken => "quiz_taken",
            Self::QuickAssessment => "quick_assessment",
            Self::ModuleCompleted => "module_completed",
            Self::AssignmentSubmitted => "assignment_submitted",
            Self::ProjectCompleted => "project_completed",
            Self::CourseCompleted => "course_completed",
            Self::Other(value) => value,
        }
    }

    /// Activities that feed the test component.
    pub fn is_test(&self) -> bool {
        matches!(
            self,
            Self::TestCompleted | Self::ExamTaken | Self::AssessmentCompleted
        )
    }

    /// Activities that feed the quiz component.
    pub fn is_quiz(&self) -> bool {
        matches!(
            self,
            Self::QuizCompleted | Self::QuizTaken | Self::QuickAssessment
        )
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "test_completed" => Self::TestCompleted,
            "exam_taken" => Self::ExamTaken,
            "assessment_completed" => Self::AssessmentCompleted,
            "quiz_completed" => Self::QuizCompleted,
            "quiz_taken" => Self::QuizTaken,
            "quick_assessment" => Self::QuickAssessment,
            "module_completed" => Self::ModuleCompleted,
            "assignment_submitted" => Self::AssignmentSubmitted,
            "project_completed" => Self::ProjectCompleted,
            "course_completed" => Self::CourseCompleted,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ActivityType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Mixed,
    #[serde(other)]
    Unrated,
}

impl Difficulty {
    pub const PROGRESSION: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Self::Beginner,
            "intermediate" => Self::Intermediate,
            "advanced" => Self::Advanced,
            "expert" => Self::Expert,
            "mixed" => Self::Mixed,
            _ => Self::Unrated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
            Self::Mixed => "mixed",
            Self::Unrated => "unrated",
        }
    }

    /// Position on the beginner → expert ladder. `Mixed` and `Unrated` sit off it.
    pub fn level(&self) -> Option<usize> {
        Self::PROGRESSION.iter().position(|d| d == self)
    }

    /// Overall-score range a course of this difficulty is aimed at.
    pub fn band(&self) -> Option<(f64, f64)> {
        match self {
            Self::Beginner => Some((0.0, 70.0)),
            Self::Intermediate => Some((60.0, 85.0)),
            Self::Advanced => Some((75.0, 100.0)),
            Self::Expert => Some((85.0, 100.0)),
            Self::Mixed => Some((50.0, 100.0)),
            Self::Unrated => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
    #[default]
    Mixed,
    Other(String),
}

impl LearningStyle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Visual => "Visual",
            Self::Auditory => "Auditory",
            Self::Kinesthetic => "Kinesthetic",
            Self::ReadingWriting => "Reading/Writing",
            Self::Mixed => "Mixed",
            Self::Other(value) => value,
        }
    }

    /// Content types that suit this style.
    pub fn preferred_content_types(&self) -> &'static [&'static str] {
        match self {
            Self::Visual => &["video", "interactive", "infographic"],
            Self::Auditory => &["video", "audio", "discussion"],
            Self::Kinesthetic => &["interactive", "project", "assignment"],
            Self::ReadingWriting => &["article", "assignment", "quiz"],
            Self::Mixed => &["video", "article", "interactive", "project"],
            Self::Other(_) => &["video", "article"],
        }
    }
}

impl From<String> for LearningStyle {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "visual" => Self::Visual,
            "auditory" => Self::Auditory,
            "kinesthetic" => Self::Kinesthetic,
            "reading/writing" | "reading" | "reading_writing" => Self::ReadingWriting,
            "mixed" | "" => Self::Mixed,
            _ => Self::Other(value),
        }
    }
}

impl From<LearningStyle> for String {
    fn from(value: LearningStyle) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(default)]
    pub timestamp: String,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub course_id: Option<String>,
}

impl ActivityEvent {
    pub fn new(timestamp: impl Into<String>, activity_type: impl Into<ActivityType>) -> Self {
        Self {
            timestamp: timestamp.into(),
            activity_type: activity_type.into(),
            duration: 0.0,
            score: None,
            difficulty: None,
            course_id: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_duration(mut self, minutes: f64) -> Self {
        self.duration = minutes;
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_course(mut self, course_id: impl Into<String>) -> Self {
        self.course_id = Some(course_id.into());
        self
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Score if present, finite and inside 0..=100.
    pub fn valid_score(&self) -> Option<f64> {
        self.score
            .filter(|score| score.is_finite() && (0.0..=100.0).contains(score))
    }

    /// Duration in minutes, with negative or non-finite values read as zero.
    pub fn valid_duration(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration
        } else {
            0.0
        }
    }
}

/// Parses an ISO-8601 timestamp. Offsets are honored; naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(value.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|value| value.and_utc())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cohort: Option<String>,
    #[serde(default)]
    pub learning_style: LearningStyle,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub activities: Vec<ActivityEvent>,
}

impl LearnerProfile {
    /// Lowercased preference tokens; comma-joined entries are split.
    pub fn normalized_preferences(&self) -> Vec<String> {
        self.preferences
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(|token| token.trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// Lowercased ids of courses the learner has a `course_completed` event for.
    pub fn completed_courses(&self) -> HashSet<String> {
        completed_courses(&self.activities)
    }
}

pub fn completed_courses(activities: &[ActivityEvent]) -> HashSet<String> {
    activities
        .iter()
        .filter(|activity| activity.activity_type == ActivityType::CourseCompleted)
        .filter_map(|activity| activity.course_id.as_deref())
        .map(|course_id| course_id.trim().to_lowercase())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub content_type: String,
    pub duration: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl CourseRecord {
    pub fn prerequisites_met(&self, completed: &HashSet<String>) -> bool {
        self.prerequisites
            .iter()
            .all(|prereq| completed.contains(&prereq.trim().to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    TestScore,
    QuizScore,
    EngagementScore,
    ConsistencyScore,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestScore => "test_score",
            Self::QuizScore => "quiz_score",
            Self::EngagementScore => "engagement_score",
            Self::ConsistencyScore => "consistency_score",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TestScore => "test score",
            Self::QuizScore => "quiz score",
            Self::EngagementScore => "engagement score",
            Self::ConsistencyScore => "consistency score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub test_score: f64,
    pub quiz_score: f64,
    pub engagement_score: f64,
    pub consistency_score: f64,
}

impl ComponentScores {
    /// Components in declaration order: test, quiz, engagement, consistency.
    pub fn entries(&self) -> [(Component, f64); 4] {
        [
            (Component::TestScore, self.test_score),
            (Component::QuizScore, self.quiz_score),
            (Component::EngagementScore, self.engagement_score),
            (Component::ConsistencyScore, self.consistency_score),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Excellent,
    VeryGood,
    Good,
    Average,
    BelowAverage,
    NeedsImprovement,
    NewLearner,
}

impl PerformanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::VeryGood => "very_good",
            Self::Good => "good",
            Self::Average => "average",
            Self::BelowAverage => "below_average",
            Self::NeedsImprovement => "needs_improvement",
            Self::NewLearner => "new_learner",
        }
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreGuidance {
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub suggested_difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerScoreProfile {
    pub learner_id: String,
    pub overall_score: f64,
    pub performance_level: PerformanceLevel,
    pub component_scores: ComponentScores,
    pub weighting_used: ComponentWeights,
    pub insights: Vec<String>,
    pub guidance: Vec<ScoreGuidance>,
    pub timestamp: DateTime<Utc>,
}
