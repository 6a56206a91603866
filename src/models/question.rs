// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_statement: String,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    pub option4: Option<String>,
    /// The option text (or key) that counts as correct.
    pub correct_option: Option<String>,
}

/// DTO for sending a question to a quiz taker.
/// `correct_option` is only filled in for admins.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub question_statement: String,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    pub option4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<String>,
}

impl QuizQuestion {
    pub fn from_question(q: Question, reveal_answer: bool) -> Self {
        Self {
            id: q.id,
            question_statement: q.question_statement,
            option1: q.option1,
            option2: q.option2,
            option3: q.option3,
            option4: q.option4,
            correct_option: if reveal_answer { q.correct_option } else { None },
        }
    }
}

/// DTO for creating a new question. Every field is required.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, max = 5000, message = "question_statement is required"))]
    pub question_statement: String,
    #[validate(length(min = 1, max = 200))]
    pub option1: String,
    #[validate(length(min = 1, max = 200))]
    pub option2: String,
    #[validate(length(min = 1, max = 200))]
    pub option3: String,
    #[validate(length(min = 1, max = 200))]
    pub option4: String,
    #[validate(length(min = 1, max = 200, message = "correct_option is required"))]
    pub correct_option: String,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_statement: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub option1: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub option2: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub option3: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub option4: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub correct_option: Option<String>,
}
