use std::collections::HashMap;
use std::io::Read;

use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{ActivityEvent, ActivityType, CourseRecord, Difficulty, LearnerProfile, LearningStyle};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct SeedCourse {
    id: &'static str,
    title: &'static str,
    subject: &'static str,
    difficulty: Difficulty,
    content_type: &'static str,
    duration: i32,
    tags: &'static [&'static str],
    skills: &'static [&'static str],
    prerequisites: &'static [&'static str],
}

const SEED_COURSES: &[SeedCourse] = &[
    SeedCourse {
        id: "python-fundamentals",
        title: "Python Programming Fundamentals",
        subject: "Programming",
        difficulty: Difficulty::Beginner,
        content_type: "interactive",
        duration: 180,
        tags: &["python", "programming", "fundamentals", "syntax"],
        skills: &["problem_solving", "logical_thinking", "basic_programming"],
        prerequisites: &[],
    },
    SeedCourse {
        id: "python-advanced",
        title: "Advanced Python Programming",
        subject: "Programming",
        difficulty: Difficulty::Advanced,
        content_type: "video",
        duration: 240,
        tags: &["python", "oop", "design_patterns", "advanced"],
        skills: &["object_oriented_programming", "code_optimization", "software_design"],
        prerequisites: &["python-fundamentals"],
    },
    SeedCourse {
        id: "web-development-html-css",
        title: "Web Development: HTML & CSS",
        subject: "Web Development",
        difficulty: Difficulty::Beginner,
        content_type: "interactive",
        duration: 150,
        tags: &["html", "css", "web", "responsive", "design"],
        skills: &["web_design", "responsive_design", "ui_design"],
        prerequisites: &[],
    },
    SeedCourse {
        id: "javascript-mastery",
        title: "JavaScript Mastery",
        subject: "Web Development",
        difficulty: Difficulty::Intermediate,
        content_type: "video",
        duration: 300,
        tags: &["javascript", "es6", "async", "programming", "web"],
        skills: &["modern_javascript", "async_programming", "dom_manipulation"],
        prerequisites: &["web-development-html-css"],
    },
    SeedCourse {
        id: "react-complete-guide",
        title: "Complete React Development Guide",
        subject: "Web Development",
        difficulty: Difficulty::Intermediate,
        content_type: "project",
        duration: 360,
        tags: &["react", "hooks", "state_management", "frontend"],
        skills: &["react_development", "component_design", "spa_development"],
        prerequisites: &["javascript-mastery"],
    },
    SeedCourse {
        id: "data-science-intro",
        title: "Introduction to Data Science",
        subject: "Data Science",
        difficulty: Difficulty::Beginner,
        content_type: "article",
        duration: 200,
        tags: &["data_science", "statistics", "pandas", "numpy", "visualization"],
        skills: &["data_analysis", "statistical_thinking", "data_visualization"],
        prerequisites: &["python-fundamentals"],
    },
    SeedCourse {
        id: "machine-learning-foundations",
        title: "Machine Learning Foundations",
        subject: "Machine Learning",
        difficulty: Difficulty::Intermediate,
        content_type: "video",
        duration: 280,
        tags: &["machine_learning", "algorithms", "scikit-learn", "models"],
        skills: &["algorithm_understanding", "model_training", "performance_evaluation"],
        prerequisites: &["data-science-intro"],
    },
    SeedCourse {
        id: "deep-learning-specialization",
        title: "Deep Learning Specialization",
        subject: "Machine Learning",
        difficulty: Difficulty::Advanced,
        content_type: "project",
        duration: 400,
        tags: &["deep_learning", "neural_networks", "tensorflow", "pytorch"],
        skills: &["neural_network_design", "deep_learning_frameworks", "model_optimization"],
        prerequisites: &["machine-learning-foundations"],
    },
    SeedCourse {
        id: "calculus-essentials",
        title: "Essential Calculus",
        subject: "Mathematics",
        difficulty: Difficulty::Intermediate,
        content_type: "video",
        duration: 320,
        tags: &["calculus", "derivatives", "integrals", "mathematical_analysis"],
        skills: &["mathematical_reasoning", "problem_solving", "analytical_thinking"],
        prerequisites: &["algebra-basics"],
    },
    SeedCourse {
        id: "linear-algebra-programmers",
        title: "Linear Algebra for Programmers",
        subject: "Mathematics",
        difficulty: Difficulty::Intermediate,
        content_type: "interactive",
        duration: 240,
        tags: &["linear_algebra", "matrices", "vectors", "ml_foundations"],
        skills: &["matrix_operations", "vector_math", "mathematical_modeling"],
        prerequisites: &["calculus-essentials"],
    },
    SeedCourse {
        id: "project-management-fundamentals",
        title: "Project Management Fundamentals",
        subject: "Business",
        difficulty: Difficulty::Beginner,
        content_type: "article",
        duration: 180,
        tags: &["project_management", "planning", "leadership", "business"],
        skills: &["project_planning", "team_leadership", "risk_management"],
        prerequisites: &[],
    },
    SeedCourse {
        id: "agile-scrum-master",
        title: "Agile & Scrum Master Certification",
        subject: "Business",
        difficulty: Difficulty::Intermediate,
        content_type: "interactive",
        duration: 200,
        tags: &["agile", "scrum", "methodology", "software_development"],
        skills: &["agile_methodology", "scrum_framework", "team_facilitation"],
        prerequisites: &["project-management-fundamentals"],
    },
    SeedCourse {
        id: "ui-ux-design-principles",
        title: "UI/UX Design Principles",
        subject: "Design",
        difficulty: Difficulty::Beginner,
        content_type: "interactive",
        duration: 160,
        tags: &["ui_design", "ux_design", "user_experience", "prototyping"],
        skills: &["user_research", "wireframing", "prototyping", "visual_design"],
        prerequisites: &[],
    },
    SeedCourse {
        id: "figma-advanced-design",
        title: "Advanced Figma Design Techniques",
        subject: "Design",
        difficulty: Difficulty::Intermediate,
        content_type: "video",
        duration: 220,
        tags: &["figma", "advanced_design", "prototyping", "collaboration"],
        skills: &["advanced_figma", "complex_prototyping", "design_systems"],
        prerequisites: &["ui-ux-design-principles"],
    },
    SeedCourse {
        id: "technical-writing",
        title: "Technical Writing & Documentation",
        subject: "Language",
        difficulty: Difficulty::Intermediate,
        content_type: "article",
        duration: 140,
        tags: &["technical_writing", "documentation", "communication", "writing"],
        skills: &["technical_writing", "documentation_design", "clear_communication"],
        prerequisites: &[],
    },
    SeedCourse {
        id: "comprehensive-programming-assessment",
        title: "Comprehensive Programming Skills Assessment",
        subject: "Assessment",
        difficulty: Difficulty::Mixed,
        content_type: "assessment",
        duration: 120,
        tags: &["programming", "assessment", "algorithms", "problem_solving"],
        skills: &["programming_logic", "algorithm_design", "problem_solving"],
        prerequisites: &["python-fundamentals"],
    },
    SeedCourse {
        id: "data-science-certification",
        title: "Data Science Certification Exam",
        subject: "Assessment",
        difficulty: Difficulty::Advanced,
        content_type: "assessment",
        duration: 180,
        tags: &["data_science", "certification", "statistics", "machine_learning"],
        skills: &["data_analysis", "statistical_modeling", "ml_implementation"],
        prerequisites: &["data-science-intro", "machine-learning-foundations"],
    },
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for course in SEED_COURSES {
        sqlx::query(
            r#"
            INSERT INTO learning_advisor.courses
            (id, title, subject, difficulty, content_type, duration, tags, skills, prerequisites)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, subject = EXCLUDED.subject,
                difficulty = EXCLUDED.difficulty, content_type = EXCLUDED.content_type,
                duration = EXCLUDED.duration, tags = EXCLUDED.tags,
                skills = EXCLUDED.skills, prerequisites = EXCLUDED.prerequisites
            "#,
        )
        .bind(course.id)
        .bind(course.title)
        .bind(course.subject)
        .bind(course.difficulty.as_str())
        .bind(course.content_type)
        .bind(course.duration)
        .bind(strings(course.tags))
        .bind(strings(course.skills))
        .bind(strings(course.prerequisites))
        .execute(pool)
        .await?;
    }

    let learners = vec![
        ("avery-lee", "Avery Lee", "2026", "Visual", vec!["programming", "python"]),
        ("jules-moreno", "Jules Moreno", "2025", "Reading/Writing", vec!["writing", "business"]),
        ("kiara-patel", "Kiara Patel", "2026", "Kinesthetic", vec!["machine_learning", "data science"]),
    ];

    for (id, name, cohort, style, preferences) in learners {
        upsert_learner(pool, id, Some(name), Some(cohort), Some(style)).await?;
        sqlx::query("UPDATE learning_advisor.learners SET preferences = $2 WHERE id = $1")
            .bind(id)
            .bind(strings(&preferences))
            .execute(pool)
            .await?;
    }

    let activities: Vec<(&str, &str, &str, &str, f64, Option<f64>, Option<&str>, Option<&str>)> = vec![
        ("seed-001", "avery-lee", "course_completed", "2026-01-05T09:00:00", 180.0, None, None, Some("python-fundamentals")),
        ("seed-002", "avery-lee", "test_completed", "2026-01-12T10:30:00", 50.0, Some(88.0), Some("intermediate"), None),
        ("seed-003", "avery-lee", "quiz_completed", "2026-01-19T18:15:00", 15.0, Some(92.0), None, None),
        ("seed-004", "avery-lee", "module_completed", "2026-01-26T20:00:00", 60.0, None, None, None),
        ("seed-005", "jules-moreno", "quiz_taken", "2026-01-08T08:00:00", 10.0, Some(61.0), None, None),
        ("seed-006", "jules-moreno", "assignment_submitted", "2026-01-09T08:00:00", 90.0, None, None, None),
        ("seed-007", "jules-moreno", "exam_taken", "2026-01-30T14:00:00", 75.0, Some(58.0), Some("beginner"), None),
        ("seed-008", "kiara-patel", "test_completed", "2026-01-28T11:00:00", 45.0, Some(71.0), Some("advanced"), None),
        ("seed-009", "kiara-patel", "project_completed", "2026-02-02T16:00:00", 240.0, None, None, None),
    ];

    for (source_key, learner_id, activity_type, occurred_at, duration, score, difficulty, course_id) in activities {
        insert_activity(
            pool,
            learner_id,
            &ActivityEvent {
                timestamp: occurred_at.to_string(),
                activity_type: ActivityType::from(activity_type),
                duration,
                score,
                difficulty: difficulty.map(Difficulty::parse),
                course_id: course_id.map(str::to_string),
            },
            source_key,
        )
        .await?;
    }

    Ok(())
}

async fn upsert_learner(
    pool: &PgPool,
    id: &str,
    full_name: Option<&str>,
    cohort: Option<&str>,
    learning_style: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO learning_advisor.learners (id, full_name, cohort, learning_style)
        VALUES ($1, COALESCE($2, ''), $3, COALESCE($4, 'Mixed'))
        ON CONFLICT (id) DO UPDATE
        SET full_name = COALESCE($2, learning_advisor.learners.full_name),
            cohort = COALESCE($3, learning_advisor.learners.cohort),
            learning_style = COALESCE($4, learning_advisor.learners.learning_style)
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(cohort)
    .bind(learning_style)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_activity(
    pool: &PgPool,
    learner_id: &str,
    event: &ActivityEvent,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO learning_advisor.activities
        (id, learner_id, activity_type, occurred_at, duration, score, difficulty, course_id, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(learner_id)
    .bind(event.activity_type.as_str())
    .bind(&event.timestamp)
    .bind(event.duration)
    .bind(event.score)
    .bind(event.difficulty.map(|d| d.as_str()))
    .bind(event.course_id.as_deref())
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, serde::Deserialize)]
struct ActivityCsvRow {
    learner_id: String,
    full_name: Option<String>,
    cohort: Option<String>,
    learning_style: Option<String>,
    activity_type: String,
    occurred_at: String,
    duration: Option<f64>,
    score: Option<f64>,
    difficulty: Option<String>,
    course_id: Option<String>,
    source_key: Option<String>,
}

impl ActivityCsvRow {
    fn event(&self) -> ActivityEvent {
        ActivityEvent {
            timestamp: self.occurred_at.clone(),
            activity_type: ActivityType::from(self.activity_type.as_str()),
            duration: self.duration.unwrap_or(0.0),
            score: self.score,
            difficulty: self.difficulty.as_deref().map(Difficulty::parse),
            course_id: self.course_id.clone(),
        }
    }
}

fn read_rows<R: Read>(reader: R) -> anyhow::Result<Vec<ActivityCsvRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<ActivityCsvRow>().enumerate() {
        rows.push(result.with_context(|| format!("invalid activity row {}", line + 1))?);
    }
    Ok(rows)
}

/// Imports activity rows, creating learners on first sight.
///
/// Rows without a `source_key` get a fresh one, so re-importing such a file
/// duplicates them.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_rows(file)?;
    let mut inserted = 0usize;

    for row in rows {
        upsert_learner(
            pool,
            &row.learner_id,
            row.full_name.as_deref(),
            row.cohort.as_deref(),
            row.learning_style.as_deref(),
        )
        .await?;

        let source_key = row
            .source_key
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_activity(pool, &row.learner_id, &row.event(), &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn learner_from_row(row: &PgRow) -> LearnerProfile {
    let style: String = row.get("learning_style");
    LearnerProfile {
        id: row.get("id"),
        name: row.get("full_name"),
        cohort: row.get("cohort"),
        learning_style: LearningStyle::from(style),
        preferences: row.get("preferences"),
        activities: Vec::new(),
    }
}

fn activity_from_row(row: &PgRow) -> ActivityEvent {
    let activity_type: String = row.get("activity_type");
    let difficulty: Option<String> = row.get("difficulty");
    ActivityEvent {
        timestamp: row.get("occurred_at"),
        activity_type: ActivityType::from(activity_type),
        duration: row.get("duration"),
        score: row.get("score"),
        difficulty: difficulty.as_deref().map(Difficulty::parse),
        course_id: row.get("course_id"),
    }
}

async fn fetch_activities(
    pool: &PgPool,
    learner_ids: &[String],
) -> anyhow::Result<HashMap<String, Vec<ActivityEvent>>> {
    let rows = sqlx::query(
        "SELECT learner_id, activity_type, occurred_at, duration, score, difficulty, course_id \
         FROM learning_advisor.activities \
         WHERE learner_id = ANY($1) \
         ORDER BY created_at, occurred_at",
    )
    .bind(learner_ids)
    .fetch_all(pool)
    .await?;

    let mut activities: HashMap<String, Vec<ActivityEvent>> = HashMap::new();
    for row in rows {
        let learner_id: String = row.get("learner_id");
        activities
            .entry(learner_id)
            .or_default()
            .push(activity_from_row(&row));
    }
    Ok(activities)
}

pub async fn fetch_learner(pool: &PgPool, learner_id: &str) -> anyhow::Result<Option<LearnerProfile>> {
    let row = sqlx::query(
        "SELECT id, full_name, cohort, learning_style, preferences \
         FROM learning_advisor.learners WHERE id = $1",
    )
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut learner = learner_from_row(&row);
    let mut activities = fetch_activities(pool, &[learner.id.clone()]).await?;
    learner.activities = activities.remove(&learner.id).unwrap_or_default();
    Ok(Some(learner))
}

pub async fn fetch_learners_in_cohort(pool: &PgPool, cohort: &str) -> anyhow::Result<Vec<LearnerProfile>> {
    let rows = sqlx::query(
        "SELECT id, full_name, cohort, learning_style, preferences \
         FROM learning_advisor.learners WHERE cohort = $1 ORDER BY id",
    )
    .bind(cohort)
    .fetch_all(pool)
    .await?;

    let mut learners: Vec<LearnerProfile> = rows.iter().map(learner_from_row).collect();
    let ids: Vec<String> = learners.iter().map(|learner| learner.id.clone()).collect();
    let mut activities = fetch_activities(pool, &ids).await?;

    for learner in &mut learners {
        learner.activities = activities.remove(&learner.id).unwrap_or_default();
    }
    Ok(learners)
}

pub async fn fetch_catalog(pool: &PgPool) -> anyhow::Result<Vec<CourseRecord>> {
    let rows = sqlx::query(
        "SELECT id, title, subject, difficulty, content_type, duration, tags, skills, prerequisites \
         FROM learning_advisor.courses ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut catalog = Vec::with_capacity(rows.len());
    for row in rows {
        let difficulty: String = row.get("difficulty");
        let duration: i32 = row.get("duration");
        catalog.push(CourseRecord {
            id: row.get("id"),
            title: row.get("title"),
            subject: row.get("subject"),
            difficulty: Difficulty::parse(&difficulty),
            content_type: row.get("content_type"),
            duration: u32::try_from(duration).unwrap_or(0),
            tags: row.get("tags"),
            skills: row.get("skills"),
            prerequisites: row.get("prerequisites"),
        });
    }

    Ok(catalog)
}
