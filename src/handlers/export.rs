// src/handlers/export.rs

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::optional_json,
    jobs::{Job, JobQueue, export::ExportFilters},
    utils::jwt::Claims,
};

/// Body of the export endpoints. Every field is optional and so is the body.
#[derive(Debug, Deserialize, Default)]
pub struct ExportRequest {
    /// Format: YYYY-MM-DD
    pub start_date: Option<String>,
    /// Format: YYYY-MM-DD
    pub end_date: Option<String>,
    /// Admin exports only.
    pub subject_id: Option<i64>,
    /// Admin exports only.
    pub user_id: Option<i64>,
}

impl ExportRequest {
    fn filters(&self) -> Result<ExportFilters, AppError> {
        let filters =
            ExportFilters::from_strings(self.start_date.as_deref(), self.end_date.as_deref())?;

        if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
            if start > end {
                return Err(AppError::BadRequest(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }

        Ok(filters)
    }
}

/// Queues a CSV export of one user's attempts. Self or admin.
pub async fn export_user(
    State(pool): State<PgPool>,
    State(jobs): State<JobQueue>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    claims.require_self_or_admin(user_id)?;
    let filters = optional_json::<ExportRequest>(&body)?.filters()?;
    super::ensure_exists(&pool, "users", user_id, "User").await?;

    let task_id = jobs
        .enqueue(
            Job::UserExport {
                user_id,
                filters: filters.clone(),
            },
            Some(claims.user_id()?),
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "CSV export job submitted",
            "task_id": task_id,
            "status": "PENDING",
            "user_id": user_id,
            "filters": filters,
        })),
    ))
}

/// Queues a CSV export of all attempts, optionally filtered.
/// Admin only.
pub async fn export_all(
    State(jobs): State<JobQueue>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request = optional_json::<ExportRequest>(&body)?;
    let filters = ExportFilters {
        subject_id: request.subject_id,
        user_id: request.user_id,
        ..request.filters()?
    };

    let task_id = jobs
        .enqueue(
            Job::AdminExport {
                filters: filters.clone(),
            },
            Some(claims.user_id()?),
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Admin CSV export job submitted",
            "task_id": task_id,
            "status": "PENDING",
            "filters": filters,
        })),
    ))
}

/// Current state of a background job.
/// Visible to the user who submitted it and to admins.
pub async fn job_status(
    State(jobs): State<JobQueue>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = jobs
        .status(task_id)
        .await
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

    if !claims.is_admin() && record.owner_id != Some(claims.user_id()?) {
        return Err(AppError::Forbidden("Access forbidden".to_string()));
    }

    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_means_no_filters() {
        let request = optional_json::<ExportRequest>(&Bytes::new()).unwrap();
        assert_eq!(request.filters().unwrap(), ExportFilters::default());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let body = Bytes::from_static(br#"{"start_date":"2024-05-10","end_date":"2024-05-01"}"#);
        let request = optional_json::<ExportRequest>(&body).unwrap();
        assert!(matches!(request.filters(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let body = Bytes::from_static(br#"{"start_date":"10/05/2024"}"#);
        let request = optional_json::<ExportRequest>(&body).unwrap();
        match request.filters() {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "Invalid start_date format. Use YYYY-MM-DD")
            }
            other => panic!("expected bad request, got {:?}", other.map(|_| ())),
        }
    }
}
