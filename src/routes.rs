// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, chapter, export, question, quiz, score, subject, summary, user},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Wraps `router` so every route requires a valid bearer token.
fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Wraps `router` so every route requires an admin token.
/// Layers run outside in: auth first, then the role check.
fn admin_only(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Catalogue reads (subjects, chapters, quizzes) are public.
/// * Attempts, per-quiz questions and scores, summaries and exports need a token.
/// * Every write to the catalogue is admin only.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let admin_routes = admin_only(
        Router::new()
            .route("/", get(admin::welcome))
            .route("/users", get(admin::list_users))
            .route("/users/{id}", delete(admin::delete_user))
            .route("/reports/monthly", post(admin::queue_monthly_report))
            .route("/reports/monthly/all", post(admin::queue_all_monthly_reports))
            .route("/reminders", post(admin::queue_reminders)),
        &state,
    );

    let user_routes = authenticated(
        Router::new()
            .route("/me", get(user::get_me))
            .route("/{id}/scores", get(score::list_user_scores)),
        &state,
    );

    let subject_routes = Router::new()
        .route("/", get(subject::list_subjects))
        .route("/search", get(subject::search_subjects))
        .route("/{id}/chapters", get(chapter::list_chapters_for_subject))
        .merge(admin_only(
            Router::new()
                .route("/", post(subject::create_subject))
                .route(
                    "/{id}",
                    put(subject::update_subject).delete(subject::delete_subject),
                ),
            &state,
        ));

    let chapter_routes = Router::new()
        .route("/", get(chapter::list_chapters))
        .route("/search", get(chapter::search_chapters))
        .route("/{id}/quizzes", get(quiz::list_quizzes_for_chapter))
        .merge(admin_only(
            Router::new()
                .route("/", post(chapter::create_chapter))
                .route(
                    "/{id}",
                    put(chapter::update_chapter).delete(chapter::delete_chapter),
                ),
            &state,
        ));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .merge(authenticated(
            Router::new()
                .route("/{id}/questions", get(question::list_quiz_questions))
                .route("/{id}/scores", get(score::list_quiz_scores))
                .route("/{id}/attempts", post(quiz::submit_attempt)),
            &state,
        ))
        .merge(admin_only(
            Router::new()
                .route("/", post(quiz::create_quiz))
                .route("/{id}", put(quiz::update_quiz).delete(quiz::delete_quiz)),
            &state,
        ));

    let question_routes = admin_only(
        Router::new()
            .route(
                "/",
                get(question::list_questions).post(question::create_question),
            )
            .route(
                "/{id}",
                put(question::update_question).delete(question::delete_question),
            ),
        &state,
    );

    let score_routes = admin_only(
        Router::new()
            .route("/", get(score::list_scores).post(score::create_score))
            .route(
                "/{id}",
                put(score::update_score).delete(score::delete_score),
            ),
        &state,
    );

    let summary_routes = authenticated(
        Router::new()
            .route("/users/{id}/subjects", get(summary::subject_summary))
            .route("/users/{id}/monthly", get(summary::monthly_summary)),
        &state,
    );

    let export_routes = authenticated(
        Router::new().route("/users/{id}", post(export::export_user)),
        &state,
    )
    .merge(admin_only(
        Router::new().route("/all", post(export::export_all)),
        &state,
    ));

    let job_routes = authenticated(
        Router::new().route("/{task_id}", get(export::job_status)),
        &state,
    );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/users", user_routes)
        .nest("/api/subjects", subject_routes)
        .nest("/api/chapters", chapter_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/scores", score_routes)
        .nest("/api/summary", summary_routes)
        .nest("/api/exports", export_routes)
        .nest("/api/jobs", job_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
