// src/handlers/score.rs

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
    models::score::{CreateScoreRequest, Score, UpdateScoreRequest},
    utils::jwt::Claims,
};

const SELECT_SCORE: &str =
    "SELECT id, quiz_id, user_id, total_scored, total_questions, timestamp FROM scores";

/// Records a score directly.
/// `total_questions` defaults to the number of questions in the quiz.
/// Admin only.
pub async fn create_score(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    AppJson(payload): AppJson<CreateScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let total_questions = match payload.total_questions {
        Some(total) => total,
        None => {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
                    .bind(payload.quiz_id)
                    .fetch_one(&pool)
                    .await?;
            count as i32
        }
    };

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO scores (quiz_id, user_id, total_scored, total_questions)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(payload.quiz_id)
    .bind(payload.user_id)
    .bind(payload.total_scored)
    .bind(total_questions)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, "Score"))?;

    cache
        .invalidate_prefix(&keys::user_summaries(payload.user_id))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Score created", "id": id })),
    ))
}

/// Admin only.
pub async fn update_score(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.total_scored.is_none() && payload.total_questions.is_none() {
        super::ensure_exists(&pool, "scores", id, "Score").await?;
        return Ok(Json(json!({ "message": "Score updated" })));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE scores SET ");
    let mut separated = builder.separated(", ");

    if let Some(scored) = payload.total_scored {
        separated.push("total_scored = ");
        separated.push_bind_unseparated(scored);
    }

    if let Some(total) = payload.total_questions {
        separated.push("total_questions = ");
        separated.push_bind_unseparated(total);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Score not found".to_string()));
    }

    Ok(Json(json!({ "message": "Score updated" })))
}

/// Admin only.
pub async fn delete_score(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted: Option<(i64,)> =
        sqlx::query_as("DELETE FROM scores WHERE id = $1 RETURNING user_id")
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete score: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

    let (user_id,) = deleted.ok_or_else(|| AppError::NotFound("Score not found".to_string()))?;
    cache.invalidate_prefix(&keys::user_summaries(user_id)).await;

    Ok(Json(json!({ "message": "Score deleted" })))
}

/// All scores, newest first.
/// Admin only.
pub async fn list_scores(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let scores = sqlx::query_as::<_, Score>(&format!("{} ORDER BY timestamp DESC", SELECT_SCORE))
        .fetch_all(&pool)
        .await?;

    Ok(Json(scores))
}

/// Scores recorded for one quiz.
pub async fn list_quiz_scores(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let scores = sqlx::query_as::<_, Score>(&format!(
        "{} WHERE quiz_id = $1 ORDER BY timestamp DESC",
        SELECT_SCORE
    ))
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(scores))
}

/// Scores of one user. Self or admin.
pub async fn list_user_scores(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_self_or_admin(user_id)?;

    let scores = sqlx::query_as::<_, Score>(&format!(
        "{} WHERE user_id = $1 ORDER BY timestamp DESC",
        SELECT_SCORE
    ))
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(scores))
}
