// src/handlers/mod.rs

use sqlx::PgPool;

use crate::error::AppError;

pub mod admin;
pub mod auth;
pub mod chapter;
pub mod export;
pub mod question;
pub mod quiz;
pub mod score;
pub mod subject;
pub mod summary;
pub mod user;

/// Returns 404 unless a row with `id` exists in `table`.
pub(crate) async fn ensure_exists(
    pool: &PgPool,
    table: &'static str,
    id: i64,
    label: &str,
) -> Result<(), AppError> {
    let found: Option<(i64,)> = sqlx::query_as(&format!("SELECT id FROM {} WHERE id = $1", table))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("{} not found", label)))
}
