// src/handlers/subject.rs

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
        subject::{CreateSubjectRequest, Subject, UpdateSubjectRequest},
    },
    utils::html::clean_optional,
};

/// Creates a subject.
/// Admin only.
pub async fn create_subject(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    AppJson(payload): AppJson<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }

    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO subjects (name, description) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(clean_optional(payload.description))
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::from_db(e, "Subject"))?;

    cache.invalidate(keys::SUBJECTS).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Subject created", "id": id })),
    ))
}

/// Updates a subject by ID. Absent fields keep their value.
/// Admin only.
pub async fn update_subject(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.name.is_none() && payload.description.is_none() {
        super::ensure_exists(&pool, "subjects", id, "Subject").await?;
        return Ok(Json(json!({ "message": "Subject updated" })));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE subjects SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(description)));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| AppError::from_db(e, "Subject"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Subject not found".to_string()));
    }

    cache.invalidate(keys::SUBJECTS).await;

    Ok(Json(json!({ "message": "Subject updated" })))
}

/// Deletes a subject and, by cascade, its chapters, quizzes, questions and scores.
/// Admin only.
pub async fn delete_subject(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete subject: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Subject not found".to_string()));
    }

    cache.invalidate_catalogue().await;
    cache.invalidate_prefix(keys::SUMMARY).await;

    Ok(Json(json!({ "message": "Subject deleted" })))
}

/// Lists all subjects. Cached.
pub async fn list_subjects(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
) -> Result<impl IntoResponse, AppError> {
    let subjects: Vec<Subject> = cache
        .get_or_set(keys::SUBJECTS, || async {
            Ok::<_, AppError>(sqlx::query_as::<_, Subject>(
                "SELECT id, name, description FROM subjects ORDER BY id",
            )
            .fetch_all(&pool)
            .await?)
        })
        .await?;

    Ok(Json(subjects))
}

/// Case-insensitive substring search on subject names.
pub async fn search_subjects(
    State(pool): State<PgPool>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, Subject>(
        "SELECT id, name, description FROM subjects WHERE name ILIKE $1 ORDER BY id",
    )
    .bind(params.pattern())
    .fetch_all(&pool)
    .await?;

    Ok(Json(subjects))
}
