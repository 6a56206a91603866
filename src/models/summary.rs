// src/models/summary.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Number of attempts a user made per subject.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubjectQuizCount {
    pub subject_id: i64,
    pub subject_name: String,
    pub quiz_count: i64,
}

/// Number of attempts a user made per calendar month ("YYYY-MM").
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonthlyQuizCount {
    pub month: String,
    pub quiz_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub user_id: i64,
    pub subject_summary: Vec<SubjectQuizCount>,
    pub total_subjects_with_quizzes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub user_id: i64,
    pub monthly_summary: Vec<MonthlyQuizCount>,
    pub total_months_with_quizzes: usize,
}
