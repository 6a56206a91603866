// src/handlers/summary.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    cache::{Cache, keys},
    error::AppError,
    models::summary::{MonthlyQuizCount, MonthlySummary, SubjectQuizCount, SubjectSummary},
    utils::jwt::Claims,
};

/// Attempts per subject for one user. Self or admin, cached.
pub async fn subject_summary(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_self_or_admin(user_id)?;
    super::ensure_exists(&pool, "users", user_id, "User").await?;

    let summary: SubjectSummary = cache
        .get_or_set(&keys::subject_summary(user_id), || async {
            let counts = sqlx::query_as::<_, SubjectQuizCount>(
                r#"
                SELECT sub.id AS subject_id, sub.name AS subject_name, COUNT(s.id) AS quiz_count
                FROM scores s
                JOIN quizzes q ON s.quiz_id = q.id
                JOIN chapters c ON q.chapter_id = c.id
                JOIN subjects sub ON c.subject_id = sub.id
                WHERE s.user_id = $1
                GROUP BY sub.id, sub.name
                ORDER BY sub.name
                "#,
            )
            .bind(user_id)
            .fetch_all(&pool)
            .await?;

            Ok::<_, AppError>(SubjectSummary {
                user_id,
                total_subjects_with_quizzes: counts.len(),
                subject_summary: counts,
            })
        })
        .await?;

    Ok(Json(summary))
}

/// Attempts per calendar month for one user, newest first. Self or admin, cached.
pub async fn monthly_summary(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_self_or_admin(user_id)?;
    super::ensure_exists(&pool, "users", user_id, "User").await?;

    let summary: MonthlySummary = cache
        .get_or_set(&keys::monthly_summary(user_id), || async {
            let counts = sqlx::query_as::<_, MonthlyQuizCount>(
                r#"
                SELECT to_char(timestamp AT TIME ZONE 'UTC', 'YYYY-MM') AS month,
                       COUNT(id) AS quiz_count
                FROM scores
                WHERE user_id = $1
                GROUP BY month
                ORDER BY month DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&pool)
            .await?;

            Ok::<_, AppError>(MonthlySummary {
                user_id,
                total_months_with_quizzes: counts.len(),
                monthly_summary: counts,
            })
        })
        .await?;

    Ok(Json(summary))
}
