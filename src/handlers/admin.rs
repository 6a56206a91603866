// src/handlers/admin.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    cache::{Cache, keys},
    error::AppError,
    extract::{AppJson, optional_json},
    jobs::{Job, JobQueue, report::ReportMonth},
    models::user::User,
    utils::jwt::Claims,
};

/// Admin landing check.
pub async fn welcome(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(json!({ "message": format!("Welcome Admin {}!", claims.username) }))
}

/// Lists all non-admin users.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, full_name, qualification, dob, created_at
        FROM users
        WHERE role <> 'admin'
        ORDER BY id
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Deletes a user by ID together with their scores.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    cache.invalidate_prefix(&keys::user_summaries(id)).await;
    tracing::info!(user_id = id, "User deleted");

    Ok(Json(json!({ "message": "User deleted" })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct MonthlyReportRequest {
    pub user_id: i64,
    /// Format: YYYY-MM
    pub month_year: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

/// Queues the monthly report for one user, mailed to the given address.
/// Admin only.
pub async fn queue_monthly_report(
    State(pool): State<PgPool>,
    State(jobs): State<JobQueue>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<MonthlyReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let month: ReportMonth = payload.month_year.parse()?;
    super::ensure_exists(&pool, "users", payload.user_id, "User").await?;

    let task_id = jobs
        .enqueue(
            Job::MonthlyReport {
                user_id: payload.user_id,
                month,
                email: Some(payload.email.clone()),
            },
            Some(claims.user_id()?),
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Monthly report job submitted",
            "task_id": task_id,
            "status": "PENDING",
            "user_id": payload.user_id,
            "month_year": month,
            "email": payload.email,
        })),
    ))
}

#[derive(Debug, Deserialize, Default)]
pub struct AllReportsRequest {
    /// Defaults to the current month.
    pub month_year: Option<String>,
}

/// Queues monthly reports for every user.
/// Admin only.
pub async fn queue_all_monthly_reports(
    State(jobs): State<JobQueue>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: AllReportsRequest = optional_json(&body)?;
    let month = match payload.month_year.as_deref() {
        Some(raw) => raw.parse()?,
        None => ReportMonth::of(Utc::now()),
    };

    let task_id = jobs
        .enqueue(Job::AllMonthlyReports { month }, Some(claims.user_id()?))
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Monthly report batch submitted",
            "task_id": task_id,
            "status": "PENDING",
            "month_year": month,
        })),
    ))
}

/// Queues the daily new-quiz reminder immediately.
/// Admin only.
pub async fn queue_reminders(
    State(jobs): State<JobQueue>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let task_id = jobs
        .enqueue(Job::DailyReminders, Some(claims.user_id()?))
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Daily reminder job submitted",
            "task_id": task_id,
            "status": "PENDING",
        })),
    ))
}
