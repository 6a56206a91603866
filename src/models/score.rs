// src/models/score.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'scores' table in the database.
/// One row per quiz attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub total_scored: i32,
    pub total_questions: i32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `scored / total` as a percentage rounded to two decimals; zero when `total` is zero.
pub fn percentage(scored: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((scored as f64 / total as f64) * 10000.0).round() / 100.0
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScoreRequest {
    pub quiz_id: i64,
    pub user_id: i64,
    #[validate(range(min = 0))]
    pub total_scored: i32,
    #[validate(range(min = 0))]
    pub total_questions: Option<i32>,
}

/// DTO for updating a score. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateScoreRequest {
    #[validate(range(min = 0))]
    pub total_scored: Option<i32>,
    #[validate(range(min = 0))]
    pub total_questions: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(4, 4), 100.0);
        assert_eq!(percentage(3, 0), 0.0);
    }
}
