//! Weighting tables for the score calculator, the recommendation ensemble
//! and the path builder.
//!
//! Every table has a built-in default; a TOML file only needs to name the
//! values it overrides:
//!
//! ```toml
//! [scoring.component_weights]
//! test_score = 0.5
//! quiz_score = 0.2
//! engagement_score = 0.2
//! consistency_score = 0.1
//!
//! [ensemble]
//! merge = "weighted_mean"
//! parallel = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{Difficulty, PerformanceLevel};
use crate::strategies::StrategyKind;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("component weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },

    #[error("weight `{name}` must be a finite non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("performance thresholds must descend from excellent to below_average")]
    ThresholdOrder,

    #[error("`{name}` must be at least 1")]
    ZeroCadence { name: &'static str },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub ensemble: EnsembleConfig,
    pub path: PathConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.ensemble.strategy_weights.validate()?;
        self.path.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub component_weights: ComponentWeights,
    pub difficulty_multipliers: DifficultyMultipliers,
    pub performance_thresholds: PerformanceThresholds,
    /// Window for the activity-frequency part of engagement.
    pub recent_window_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            component_weights: ComponentWeights::default(),
            difficulty_multipliers: DifficultyMultipliers::default(),
            performance_thresholds: PerformanceThresholds::default(),
            recent_window_days: 30,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.component_weights.validate()?;
        self.difficulty_multipliers.validate()?;
        self.performance_thresholds.validate()?;
        if self.recent_window_days < 1 {
            return Err(ConfigError::ZeroCadence {
                name: "recent_window_days",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub test_score: f64,
    pub quiz_score: f64,
    pub engagement_score: f64,
    pub consistency_score: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            test_score: 0.4,
            quiz_score: 0.3,
            engagement_score: 0.2,
            consistency_score: 0.1,
        }
    }
}

impl ComponentWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        check_weight("test_score", self.test_score)?;
        check_weight("quiz_score", self.quiz_score)?;
        check_weight("engagement_score", self.engagement_score)?;
        check_weight("consistency_score", self.consistency_score)?;

        let sum = self.test_score + self.quiz_score + self.engagement_score + self.consistency_score;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyMultipliers {
    pub beginner: f64,
    pub intermediate: f64,
    pub advanced: f64,
    pub expert: f64,
}

impl Default for DifficultyMultipliers {
    fn default() -> Self {
        Self {
            beginner: 1.0,
            intermediate: 1.2,
            advanced: 1.5,
            expert: 1.8,
        }
    }
}

impl DifficultyMultipliers {
    pub fn multiplier(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Beginner => self.beginner,
            Difficulty::Intermediate => self.intermediate,
            Difficulty::Advanced => self.advanced,
            Difficulty::Expert => self.expert,
            Difficulty::Mixed | Difficulty::Unrated => 1.0,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_weight("beginner", self.beginner)?;
        check_weight("intermediate", self.intermediate)?;
        check_weight("advanced", self.advanced)?;
        check_weight("expert", self.expert)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceThresholds {
    pub excellent: f64,
    pub very_good: f64,
    pub good: f64,
    pub average: f64,
    pub below_average: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            very_good: 80.0,
            good: 70.0,
            average: 60.0,
            below_average: 50.0,
        }
    }
}

impl PerformanceThresholds {
    /// Step function evaluated top-down; a score on a boundary takes the higher tier.
    pub fn level(&self, score: f64) -> PerformanceLevel {
        if score >= self.excellent {
            PerformanceLevel::Excellent
        } else if score >= self.very_good {
            PerformanceLevel::VeryGood
        } else if score >= self.good {
            PerformanceLevel::Good
        } else if score >= self.average {
            PerformanceLevel::Average
        } else if score >= self.below_average {
            PerformanceLevel::BelowAverage
        } else {
            PerformanceLevel::NeedsImprovement
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ordered = [
            self.excellent,
            self.very_good,
            self.good,
            self.average,
            self.below_average,
        ];
        if ordered.iter().any(|value| !value.is_finite())
            || ordered.windows(2).any(|pair| pair[0] <= pair[1])
        {
            return Err(ConfigError::ThresholdOrder);
        }
        Ok(())
    }
}

/// How the ensemble folds a course's per-strategy scores into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Add `match × weight` then divide by the number of contributing
    /// strategies, once per strategy. Depends on strategy order.
    #[default]
    RunningAverage,
    /// `Σ(weight × match) / Σ(weight)` over contributing strategies.
    WeightedMean,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub strategy_weights: StrategyWeights,
    pub merge: MergePolicy,
    /// Run strategies on the rayon pool. Merge order is unaffected.
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
    pub score_based: f64,
    pub difficulty_progression: f64,
    pub interest_matching: f64,
    pub performance_gap: f64,
    pub comprehensive: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            score_based: 1.0,
            difficulty_progression: 0.8,
            interest_matching: 0.9,
            performance_gap: 0.7,
            comprehensive: 1.2,
        }
    }
}

impl StrategyWeights {
    pub fn weight(&self, kind: StrategyKind) -> f64 {
        match kind {
            StrategyKind::ScoreBased => self.score_based,
            StrategyKind::DifficultyProgression => self.difficulty_progression,
            StrategyKind::InterestMatching => self.interest_matching,
            StrategyKind::PerformanceGap => self.performance_gap,
            StrategyKind::Comprehensive => self.comprehensive,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for kind in StrategyKind::ALL {
            check_weight(kind.as_str(), self.weight(kind))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub max_courses: usize,
    pub milestone_every: usize,
    pub assessment_every: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_courses: 6,
            milestone_every: 2,
            assessment_every: 3,
        }
    }
}

impl PathConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_courses == 0 {
            return Err(ConfigError::ZeroCadence { name: "max_courses" });
        }
        if self.milestone_every == 0 {
            return Err(ConfigError::ZeroCadence {
                name: "milestone_every",
            });
        }
        if self.assessment_every == 0 {
            return Err(ConfigError::ZeroCadence {
                name: "assessment_every",
            });
        }
        Ok(())
    }
}

fn check_weight(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight { name, value })
    }
}
