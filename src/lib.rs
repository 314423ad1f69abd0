pub mod advisor;
pub mod config;
pub mod db;
pub mod ensemble;
pub mod insights;
pub mod models;
pub mod path;
pub mod report;
pub mod scoring;
pub mod strategies;

pub use advisor::{AdvisorReport, LearningAdvisor, PathOutcome};
pub use config::EngineConfig;
pub use models::{ActivityEvent, CourseRecord, LearnerProfile, LearnerScoreProfile};
pub use scoring::ScoreCalculator;
