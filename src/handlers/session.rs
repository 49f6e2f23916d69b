// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    live::hub::LiveHub,
    models::session::{JoinSessionRequest, Session, SessionCreatedResponse},
    utils::{codes::{generate_session_code, is_valid_session_code}, jwt::Claims},
};

/// How many times a colliding join code is re-rolled before giving up.
const CODE_RETRIES: usize = 5;

/// Creates a new live session owned by the authenticated presenter.
///
/// Generates a fresh join code, persists the session and opens its topic on
/// the realtime fabric so participants can subscribe immediately.
pub async fn create_session(
    State(pool): State<PgPool>,
    State(hub): State<LiveHub>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let presenter_id = claims.presenter_id();

    // The 5-digit space is small enough that collisions happen in practice;
    // re-roll instead of failing the request.
    let mut inserted: Option<Session> = None;
    for _ in 0..CODE_RETRIES {
        let code = generate_session_code();
        let result = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (session_code, presenter_id)
            VALUES ($1, $2)
            ON CONFLICT (session_code) DO NOTHING
            RETURNING id, session_code, presenter_id, created_at
            "#,
        )
        .bind(&code)
        .bind(presenter_id)
        .fetch_optional(&pool)
        .await?;

        if let Some(session) = result {
            inserted = Some(session);
            break;
        }
    }

    let session = inserted.ok_or_else(|| {
        AppError::InternalServerError("Could not allocate a session code".to_string())
    })?;

    hub.open_topic(&session.session_code).await;
    tracing::info!(
        "Session {} created by presenter {}",
        session.session_code,
        presenter_id
    );

    Ok((
        StatusCode::CREATED,
        Json(SessionCreatedResponse {
            topic: LiveHub::topic_for(&session.session_code),
            session_code: session.session_code,
        }),
    ))
}

/// Validates a spectator's join request: code format first, then existence.
/// Returns the topic to subscribe to; the actual subscription happens over
/// the live socket.
pub async fn join_session(
    State(pool): State<PgPool>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !is_valid_session_code(&payload.session_code) {
        return Err(AppError::BadRequest(
            "Session code has an invalid format.".to_string(),
        ));
    }

    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT id, session_code, presenter_id, created_at
        FROM sessions
        WHERE session_code = $1
        "#,
    )
    .bind(&payload.session_code)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Session not found.".to_string()))?;

    Ok(Json(json!({
        "session_code": session.session_code,
        "topic": LiveHub::topic_for(&session.session_code),
        "spectator_name": payload.spectator_name,
    })))
}

/// Lists the authenticated presenter's sessions.
pub async fn list_sessions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = sqlx::query_as::<_, Session>(
        r#"
        SELECT id, session_code, presenter_id, created_at
        FROM sessions
        WHERE presenter_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(claims.presenter_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(sessions))
}

/// Deletes a session the presenter owns. Spectators are evicted first via a
/// `session_delete` broadcast, then the topic is closed and the row removed.
pub async fn delete_session(
    State(pool): State<PgPool>,
    State(hub): State<LiveHub>,
    Extension(claims): Extension<Claims>,
    Path(session_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT id, session_code, presenter_id, created_at
        FROM sessions
        WHERE session_code = $1
        "#,
    )
    .bind(&session_code)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Session not found.".to_string()))?;

    if session.presenter_id != claims.presenter_id() {
        return Err(AppError::Forbidden(
            "This session belongs to another presenter.".to_string(),
        ));
    }

    hub.publish(
        &session_code,
        crate::live::protocol::Envelope::Broadcast {
            event: crate::live::protocol::BroadcastEvent::SessionDelete(
                crate::live::protocol::SessionDelete {
                    message: "The presenter has ended this session.".to_string(),
                },
            ),
        },
    )
    .await;
    hub.close_topic(&session_code).await;

    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session.id)
        .execute(&pool)
        .await?;

    tracing::info!("Session {} deleted", session_code);
    Ok(StatusCode::NO_CONTENT)
}
