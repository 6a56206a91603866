// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    cache::{Cache, keys},
    error::AppError,
    extract::AppJson,
    models::{
        quiz::{
            AttemptRequest, AttemptResult, CreateQuizRequest, QuestionBrief, Quiz, QuizListItem,
            QuizWithChapter, UpdateQuizRequest,
        },
        score::percentage,
    },
    utils::{
        html::clean_optional,
        jwt::Claims,
    },
};

/// Helper struct for fetching answer keys from the database.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    correct_option: Option<String>,
}

/// Counts answers matching the key. Unknown question ids score nothing.
fn grade(answer_keys: &[AnswerKey], answers: &HashMap<i64, String>) -> i32 {
    answer_keys
        .iter()
        .filter(|key| {
            match (answers.get(&key.id), key.correct_option.as_deref()) {
                (Some(given), Some(correct)) => given.trim() == correct.trim(),
                _ => false,
            }
        })
        .count() as i32
}

/// Creates a quiz under an existing chapter.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "Name and chapter_id are required".to_string(),
        ));
    }

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO quizzes (name, chapter_id, date_of_quiz, time_duration, remarks)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(payload.chapter_id)
    .bind(payload.date_of_quiz)
    .bind(payload.time_duration)
    .bind(clean_optional(payload.remarks))
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, "Quiz"))?;

    cache.invalidate(keys::QUIZZES).await;
    tracing::info!(quiz_id = id, "Quiz created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Quiz created", "id": id })),
    ))
}

/// Updates a quiz by ID. Absent fields keep their value.
/// Admin only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");
    let mut changed = false;

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
        changed = true;
    }

    if let Some(chapter_id) = payload.chapter_id {
        separated.push("chapter_id = ");
        separated.push_bind_unseparated(chapter_id);
        changed = true;
    }

    if let Some(date) = payload.date_of_quiz {
        separated.push("date_of_quiz = ");
        separated.push_bind_unseparated(date);
        changed = true;
    }

    if let Some(minutes) = payload.time_duration {
        separated.push("time_duration = ");
        separated.push_bind_unseparated(minutes);
        changed = true;
    }

    if let Some(remarks) = payload.remarks {
        separated.push("remarks = ");
        separated.push_bind_unseparated(clean_optional(Some(remarks)));
        changed = true;
    }

    if !changed {
        super::ensure_exists(&pool, "quizzes", id, "Quiz").await?;
        return Ok(Json(json!({ "message": "Quiz updated" })));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| AppError::from_db(e, "Quiz"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    cache.invalidate(keys::QUIZZES).await;
    // Moving a quiz changes which subject its attempts count under.
    cache.invalidate_prefix(keys::SUMMARY).await;

    Ok(Json(json!({ "message": "Quiz updated" })))
}

/// Deletes a quiz with its questions and scores.
/// Admin only.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    cache.invalidate(keys::QUIZZES).await;
    cache.invalidate_prefix(keys::SUMMARY).await;

    Ok(Json(json!({ "message": "Quiz deleted" })))
}

/// Lists every quiz with its chapter name and question headlines. Cached.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes: Vec<QuizListItem> = cache
        .get_or_set(keys::QUIZZES, || async {
            let quizzes = sqlx::query_as::<_, QuizWithChapter>(
                r#"
                SELECT q.id, q.name, q.chapter_id, c.name AS chapter_name,
                       q.date_of_quiz, q.time_duration, q.remarks
                FROM quizzes q
                JOIN chapters c ON q.chapter_id = c.id
                ORDER BY q.id
                "#,
            )
            .fetch_all(&pool)
            .await?;

            let briefs = sqlx::query_as::<_, QuestionBrief>(
                "SELECT quiz_id, id, question_statement FROM questions ORDER BY id",
            )
            .fetch_all(&pool)
            .await?;

            let mut by_quiz: HashMap<i64, Vec<QuestionBrief>> = HashMap::new();
            for brief in briefs {
                by_quiz.entry(brief.quiz_id).or_default().push(brief);
            }

            Ok::<_, AppError>(quizzes
                .into_iter()
                .map(|quiz| {
                    let questions = by_quiz.remove(&quiz.id).unwrap_or_default();
                    QuizListItem::new(quiz, questions)
                })
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(Json(quizzes))
}

/// Quizzes belonging to one chapter.
pub async fn list_quizzes_for_chapter(
    State(pool): State<PgPool>,
    Path(chapter_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, name, chapter_id, date_of_quiz, time_duration, remarks, created_at
        FROM quizzes
        WHERE chapter_id = $1
        ORDER BY id
        "#,
    )
    .bind(chapter_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// Grades a user's answers and records the attempt as a score.
///
/// * Every question of the quiz counts towards `total_questions`.
/// * An answer is correct when it equals `correct_option` (whitespace-trimmed).
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    AppJson(req): AppJson<AttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    super::ensure_exists(&pool, "quizzes", quiz_id, "Quiz").await?;
    let user_id = claims.user_id()?;

    let answer_keys = sqlx::query_as::<_, AnswerKey>(
        "SELECT id, correct_option FROM questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    if answer_keys.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    let total_scored = grade(&answer_keys, &req.answers);
    let total_questions = answer_keys.len() as i32;

    let (score_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO scores (quiz_id, user_id, total_scored, total_questions)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .bind(total_scored)
    .bind(total_questions)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, "Score"))?;

    cache.invalidate_prefix(&keys::user_summaries(user_id)).await;
    tracing::info!(quiz_id, user_id, total_scored, total_questions, "Attempt recorded");

    Ok((
        StatusCode::CREATED,
        Json(AttemptResult {
            score_id,
            total_scored,
            total_questions,
            percentage: percentage(total_scored as i64, total_questions as i64),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: i64, correct: Option<&str>) -> AnswerKey {
        AnswerKey {
            id,
            correct_option: correct.map(str::to_string),
        }
    }

    #[test]
    fn grading_counts_exact_matches_only() {
        let answer_keys = vec![key(1, Some("Paris")), key(2, Some("4")), key(3, None)];
        let answers = HashMap::from([
            (1, " Paris ".to_string()),
            (2, "5".to_string()),
            (3, "anything".to_string()),
            (99, "Paris".to_string()),
        ]);

        assert_eq!(grade(&answer_keys, &answers), 1);
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let answer_keys = vec![key(1, Some("a")), key(2, Some("b"))];
        assert_eq!(grade(&answer_keys, &HashMap::new()), 0);
    }
}
