// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, exam, presentation, question, session, ws},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, sessions, live socket, exams, bank, files).
/// * Public routes: register/login, session join, exam join and the
///   attempt surface (students have no accounts).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool + config + realtime hub).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let session_routes = Router::new()
        .route("/join", post(session::join_session))
        // Protected session routes
        .merge(
            Router::new()
                .route(
                    "/",
                    get(session::list_sessions).post(session::create_session),
                )
                .route("/{code}", delete(session::delete_session))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    // Authentication for the socket happens inside the handler: presenters
    // pass their JWT as a query parameter, spectators just a name.
    let live_routes = Router::new().route("/{code}/ws", get(ws::live_socket));

    let exam_routes = Router::new()
        .route("/join", post(exam::join_exam))
        .merge(
            Router::new()
                .route("/", get(exam::list_exams).post(exam::create_exam))
                .route("/{id}", delete(exam::delete_exam))
                .route("/{id}/activate", post(exam::activate_exam))
                .route("/{id}/deactivate", post(exam::deactivate_exam))
                .route("/{id}/attempts", get(exam::exam_attempts))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    // Students are anonymous; the attempt id is their capability.
    let attempt_routes = Router::new()
        .route("/{id}/answers", put(exam::save_answer))
        .route("/{id}/submit", post(exam::submit_attempt))
        .route("/{id}/results", get(exam::attempt_result));

    let question_routes = Router::new()
        .route(
            "/",
            get(question::list_saved_questions).post(question::create_saved_question),
        )
        .route("/{id}", delete(question::delete_saved_question))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let presentation_routes = Router::new()
        .route(
            "/",
            get(presentation::list_interactive).post(presentation::create_interactive),
        )
        .route(
            "/{id}",
            get(presentation::get_interactive).delete(presentation::delete_interactive),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let file_routes = Router::new()
        .route(
            "/",
            get(presentation::list_files).post(presentation::register_file),
        )
        .route("/{id}", delete(presentation::delete_file))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/live", live_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/presentations", presentation_routes)
        .nest("/api/files", file_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
