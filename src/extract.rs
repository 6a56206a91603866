// src/extract.rs

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json` extractor whose rejections (syntax errors, missing or mistyped
/// fields, wrong content type) come back as a 400 `AppError` body instead of
/// axum's plain-text 415/422 responses.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(AppJson(value))
    }
}

/// Parses a JSON body that clients may omit. An empty or whitespace-only body
/// yields `T::default()`.
pub fn optional_json<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Filters {
        month_year: Option<String>,
    }

    #[test]
    fn blank_bodies_use_defaults() {
        for raw in ["", "  ", "\r\n\t"] {
            let parsed: Filters = optional_json(&Bytes::from(raw)).unwrap();
            assert_eq!(parsed, Filters::default());
        }
    }

    #[test]
    fn json_bodies_are_parsed_and_garbage_rejected() {
        let parsed: Filters = optional_json(&Bytes::from_static(br#"{"month_year":"2024-01"}"#)).unwrap();
        assert_eq!(parsed.month_year.as_deref(), Some("2024-01"));

        let bad: Result<Filters, _> = optional_json(&Bytes::from_static(b"month=1"));
        assert!(matches!(bad, Err(AppError::BadRequest(_))));
    }
}
