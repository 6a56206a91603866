// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    extract::AppJson,
    models::user::{LoginRequest, LoginResponse, RegisterRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{ROLE_USER, sign_jwt},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it. Self-registration
/// always creates a plain 'user'; admins are seeded from configuration.
/// Returns 201 Created and the new user id.
pub async fn register(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let username = payload.username.trim().to_string();
    let hashed_password = hash_password(&payload.password)?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (username, password, role, full_name, qualification, dob)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&username)
    .bind(hashed_password)
    .bind(ROLE_USER)
    .bind(payload.full_name)
    .bind(payload.qualification)
    .bind(payload.dob)
    .fetch_one(&pool)
    .await
    .map_err(|e| match AppError::from_db(e, "User") {
        AppError::Conflict(_) => AppError::Conflict(format!("Username '{}' already exists", username)),
        other => other,
    })?;

    tracing::info!(user_id = id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "id": id })),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// Unknown usernames and wrong passwords get the same 401 so the endpoint
/// does not reveal which accounts exist.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, full_name, qualification, dob, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(payload.username.trim())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let invalid = || AppError::AuthError("Invalid credentials".to_string());
    let user = user.ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let access_token = sign_jwt(
        user.id,
        &user.username,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        user_id: user.id,
        username: user.username,
        role: user.role,
        full_name: user.full_name,
    }))
}
