// src/models/quiz.rs

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub name: String,
    pub chapter_id: i64,
    pub date_of_quiz: Option<NaiveDate>,
    /// Allowed time in minutes.
    pub time_duration: Option<i32>,
    pub remarks: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Row joined with the owning chapter, used by the full quiz listing.
#[derive(Debug, FromRow)]
pub struct QuizWithChapter {
    pub id: i64,
    pub name: String,
    pub chapter_id: i64,
    pub chapter_name: String,
    pub date_of_quiz: Option<NaiveDate>,
    pub time_duration: Option<i32>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionBrief {
    #[serde(skip)]
    pub quiz_id: i64,
    pub id: i64,
    pub question_statement: String,
}

/// One entry of `GET /api/quizzes`.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizListItem {
    pub id: i64,
    pub name: String,
    pub chapter_id: i64,
    pub chapter_name: String,
    pub date_of_quiz: Option<NaiveDate>,
    pub time_duration: Option<i32>,
    pub remarks: Option<String>,
    pub questions: Vec<QuestionBrief>,
}

impl QuizListItem {
    pub fn new(quiz: QuizWithChapter, questions: Vec<QuestionBrief>) -> Self {
        Self {
            id: quiz.id,
            name: quiz.name,
            chapter_id: quiz.chapter_id,
            chapter_name: quiz.chapter_name,
            date_of_quiz: quiz.date_of_quiz,
            time_duration: quiz.time_duration,
            remarks: quiz.remarks,
            questions,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    pub chapter_id: i64,
    /// Format: YYYY-MM-DD
    pub date_of_quiz: Option<NaiveDate>,
    #[validate(range(min = 1, max = 1440, message = "time_duration is in minutes (1-1440)"))]
    pub time_duration: Option<i32>,
    #[validate(length(max = 5000))]
    pub remarks: Option<String>,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub chapter_id: Option<i64>,
    pub date_of_quiz: Option<NaiveDate>,
    #[validate(range(min = 1, max = 1440))]
    pub time_duration: Option<i32>,
    #[validate(length(max = 5000))]
    pub remarks: Option<String>,
}

/// A user's answers to one quiz.
/// Key: question id. Value: the chosen option.
#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
    pub answers: HashMap<i64, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptResult {
    pub score_id: i64,
    pub total_scored: i32,
    pub total_questions: i32,
    pub percentage: f64,
}
