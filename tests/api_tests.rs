// tests/api_tests.rs
//
// Requests that are answered before any query runs: authentication,
// role checks and payload validation. No database needed.

mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use quiz_master::utils::jwt::{ROLE_ADMIN, ROLE_USER};
use serde_json::{Value, json};
use tower::ServiceExt;

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = common::offline_app();

    let response = app
        .oneshot(request("GET", "/random_path_that_does_not_exist", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = common::offline_app();

    for (method, uri) in [
        ("GET", "/api/users/me"),
        ("POST", "/api/subjects"),
        ("POST", "/api/quizzes/1/attempts"),
        ("GET", "/api/summary/users/1/subjects"),
        ("GET", "/api/admin/users"),
        ("GET", "/api/jobs/00000000-0000-0000-0000-000000000000"),
    ] {
        let response = app
            .clone()
            .oneshot(request(method, uri, None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn malformed_or_forged_tokens_are_rejected() {
    let app = common::offline_app();
    let forged = quiz_master::utils::jwt::sign_jwt(1, "x", ROLE_ADMIN, "wrong-secret", 600).unwrap();

    for token in ["not-a-jwt", forged.as_str()] {
        let response = app
            .clone()
            .oneshot(request("GET", "/api/admin", Some(token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn admin_routes_forbid_plain_users() {
    let app = common::offline_app();
    let user = common::token(7, ROLE_USER);

    for (method, uri, body) in [
        ("GET", "/api/admin", None),
        ("GET", "/api/admin/users", None),
        ("POST", "/api/subjects", Some(json!({ "name": "Maths" }))),
        ("PUT", "/api/chapters/1", Some(json!({ "name": "Algebra" }))),
        ("DELETE", "/api/quizzes/1", None),
        ("GET", "/api/questions", None),
        ("GET", "/api/scores", None),
        ("POST", "/api/exports/all", None),
        ("POST", "/api/admin/reminders", None),
    ] {
        let response = app
            .clone()
            .oneshot(request(method, uri, Some(&user), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn admin_welcome_greets_by_name() {
    let app = common::offline_app();
    let admin = common::token(1, ROLE_ADMIN);

    let response = app
        .oneshot(request("GET", "/api/admin", Some(&admin), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Welcome Admin user1!");
}

#[tokio::test]
async fn users_cannot_read_or_export_other_users_data() {
    let app = common::offline_app();
    let user = common::token(7, ROLE_USER);

    for (method, uri) in [
        ("GET", "/api/users/8/scores"),
        ("GET", "/api/summary/users/8/subjects"),
        ("GET", "/api/summary/users/8/monthly"),
        ("POST", "/api/exports/users/8"),
    ] {
        let response = app
            .clone()
            .oneshot(request(method, uri, Some(&user), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Access forbidden");
    }
}

#[tokio::test]
async fn invalid_payloads_are_bad_requests() {
    let app = common::offline_app();
    let admin = common::token(1, ROLE_ADMIN);
    let user = common::token(7, ROLE_USER);

    let cases = [
        (
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "ab", "password": "password123" }),
        ),
        (
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "someone" }),
        ),
        (
            "POST",
            "/api/quizzes",
            Some(&admin),
            json!({ "name": "Weekly", "chapter_id": 1, "time_duration": 0 }),
        ),
        (
            "POST",
            "/api/quizzes",
            Some(&admin),
            json!({ "name": "Weekly", "chapter_id": 1, "date_of_quiz": "15/01/2024" }),
        ),
        (
            "POST",
            "/api/questions",
            Some(&admin),
            json!({ "quiz_id": 1, "question_statement": "2+2?", "option1": "4" }),
        ),
        (
            "POST",
            "/api/quizzes/1/attempts",
            Some(&user),
            json!({ "answers": "none" }),
        ),
        (
            "POST",
            "/api/exports/users/7",
            Some(&user),
            json!({ "start_date": "2024-13-01" }),
        ),
        (
            "POST",
            "/api/admin/reports/monthly",
            Some(&admin),
            json!({ "user_id": 2, "month_year": "2024-01", "email": "not-an-email" }),
        ),
        (
            "POST",
            "/api/admin/reports/monthly/all",
            Some(&admin),
            json!({ "month_year": "January" }),
        ),
    ];

    for (method, uri, token, body) in cases {
        let response = app
            .clone()
            .oneshot(request(method, uri, token.map(String::as_str), Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{} {} {}",
            method,
            uri,
            body
        );
        let body = json_body(response).await;
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn unknown_task_is_404() {
    let app = common::offline_app();
    let user = common::token(7, ROLE_USER);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/jobs/{}", uuid::Uuid::new_v4()),
            Some(&user),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn queued_job_is_visible_to_its_owner_only() {
    let app = common::offline_app();
    let admin = common::token(1, ROLE_ADMIN);
    let other_admin = common::token(2, ROLE_ADMIN);
    let user = common::token(7, ROLE_USER);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/admin/reports/monthly/all",
            Some(&admin),
            Some(json!({ "month_year": "2024-01" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["month_year"], "2024-01");
    let task_id = body["task_id"].as_str().unwrap().to_string();
    let status_uri = format!("/api/jobs/{}", task_id);

    let response = app
        .clone()
        .oneshot(request("GET", &status_uri, Some(&admin), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["task_id"], task_id);
    assert_eq!(body["job"], "all_monthly_reports");
    assert!(body["state"].is_string());

    let response = app
        .clone()
        .oneshot(request("GET", &status_uri, Some(&other_admin), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", &status_uri, Some(&user), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn batch_report_without_body_defaults_to_current_month() {
    let app = common::offline_app();
    let admin = common::token(1, ROLE_ADMIN);

    let response = app
        .oneshot(request("POST", "/api/admin/reports/monthly/all", Some(&admin), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    let expected = chrono::Utc::now().format("%Y-%m").to_string();
    assert_eq!(body["month_year"], expected);
}

#[tokio::test]
async fn blank_optional_bodies_are_accepted() {
    let app = common::offline_app();
    let admin = common::token(1, ROLE_ADMIN);

    for uri in ["/api/admin/reports/monthly/all", "/api/exports/all"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(" \n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED, "{}", uri);
    }
}
