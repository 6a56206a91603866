// src/handlers/chapter.rs

use axum::{
    Json,
    extract::{Path, Query, State},
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
        SearchParams,
        chapter::{Chapter, CreateChapterRequest, UpdateChapterRequest},
    },
    utils::html::clean_optional,
};

const SELECT_CHAPTER: &str = "SELECT id, name, description, subject_id FROM chapters";

/// Creates a chapter under an existing subject.
/// Admin only.
pub async fn create_chapter(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    AppJson(payload): AppJson<CreateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "Name and subject_id are required".to_string(),
        ));
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO chapters (name, description, subject_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(clean_optional(payload.description))
    .bind(payload.subject_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, "Chapter"))?;

    cache.invalidate(keys::CHAPTERS).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Chapter created", "id": id })),
    ))
}

/// Updates a chapter by ID. Absent fields keep their value.
/// Admin only.
pub async fn update_chapter(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.name.is_none() && payload.description.is_none() && payload.subject_id.is_none() {
        super::ensure_exists(&pool, "chapters", id, "Chapter").await?;
        return Ok(Json(json!({ "message": "Chapter updated" })));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE chapters SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(description)));
    }

    if let Some(subject_id) = payload.subject_id {
        separated.push("subject_id = ");
        separated.push_bind_unseparated(subject_id);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| AppError::from_db(e, "Chapter"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Chapter not found".to_string()));
    }

    cache.invalidate(keys::CHAPTERS).await;
    cache.invalidate(keys::QUIZZES).await;

    Ok(Json(json!({ "message": "Chapter updated" })))
}

/// Deletes a chapter with its quizzes.
/// Admin only.
pub async fn delete_chapter(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM chapters WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete chapter: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Chapter not found".to_string()));
    }

    cache.invalidate_catalogue().await;
    cache.invalidate_prefix(keys::SUMMARY).await;

    Ok(Json(json!({ "message": "Chapter deleted" })))
}

/// Lists all chapters. Cached.
pub async fn list_chapters(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
) -> Result<impl IntoResponse, AppError> {
    let chapters: Vec<Chapter> = cache
        .get_or_set(keys::CHAPTERS, || async {
            Ok::<_, AppError>(
                sqlx::query_as::<_, Chapter>(&format!("{} ORDER BY id", SELECT_CHAPTER))
                    .fetch_all(&pool)
                    .await?,
            )
        })
        .await?;

    Ok(Json(chapters))
}

pub async fn search_chapters(
    State(pool): State<PgPool>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let chapters =
        sqlx::query_as::<_, Chapter>(&format!("{} WHERE name ILIKE $1 ORDER BY id", SELECT_CHAPTER))
            .bind(params.pattern())
            .fetch_all(&pool)
            .await?;

    Ok(Json(chapters))
}

/// Chapters belonging to one subject.
pub async fn list_chapters_for_subject(
    State(pool): State<PgPool>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let chapters = sqlx::query_as::<_, Chapter>(&format!(
        "{} WHERE subject_id = $1 ORDER BY id",
        SELECT_CHAPTER
    ))
    .bind(subject_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(chapters))
}
