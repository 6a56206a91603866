// src/handlers/question.rs

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
    models::question::{CreateQuestionRequest, Question, QuizQuestion, UpdateQuestionRequest},
    utils::jwt::Claims,
};

const SELECT_QUESTION: &str = r#"
    SELECT id, quiz_id, question_statement, option1, option2, option3, option4, correct_option
    FROM questions
"#;

/// Creates a question. Every field is required.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO questions
            (quiz_id, question_statement, option1, option2, option3, option4, correct_option)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(payload.quiz_id)
    .bind(payload.question_statement.trim())
    .bind(payload.option1.trim())
    .bind(payload.option2.trim())
    .bind(payload.option3.trim())
    .bind(payload.option4.trim())
    .bind(payload.correct_option.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, "Question"))?;

    cache.invalidate(keys::QUIZZES).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Question created", "id": id })),
    ))
}

/// Updates a question by ID. Absent fields keep their value.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let fields = [
        ("question_statement", payload.question_statement),
        ("option1", payload.option1),
        ("option2", payload.option2),
        ("option3", payload.option3),
        ("option4", payload.option4),
        ("correct_option", payload.correct_option),
    ];

    if fields.iter().all(|(_, value)| value.is_none()) {
        super::ensure_exists(&pool, "questions", id, "Question").await?;
        return Ok(Json(json!({ "message": "Question updated" })));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    for (column, value) in fields {
        if let Some(value) = value {
            separated.push(format!("{} = ", column));
            separated.push_bind_unseparated(value.trim().to_string());
        }
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| AppError::from_db(e, "Question"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    cache.invalidate(keys::QUIZZES).await;

    Ok(Json(json!({ "message": "Question updated" })))
}

/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    cache.invalidate(keys::QUIZZES).await;

    Ok(Json(json!({ "message": "Question deleted" })))
}

/// Lists every question including the answer key.
/// Admin only.
pub async fn list_questions(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!("{} ORDER BY id", SELECT_QUESTION))
        .fetch_all(&pool)
        .await?;

    Ok(Json(questions))
}

/// Questions of one quiz. The answer key is only revealed to admins.
pub async fn list_quiz_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    super::ensure_exists(&pool, "quizzes", quiz_id, "Quiz").await?;

    let questions = sqlx::query_as::<_, Question>(&format!(
        "{} WHERE quiz_id = $1 ORDER BY id",
        SELECT_QUESTION
    ))
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let reveal = claims.is_admin();
    let questions: Vec<QuizQuestion> = questions
        .into_iter()
        .map(|q| QuizQuestion::from_question(q, reveal))
        .collect();

    Ok(Json(questions))
}
