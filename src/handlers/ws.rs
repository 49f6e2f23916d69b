// src/handlers/ws.rs

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use crate::{
    error::AppError,
    live::{
        content::Direction,
        protocol::{ClientCommand, QuestionPush, Role},
        session::ChannelSession,
    },
    models::{
        presentation::InteractivePresentation, question::SavedQuestion, session::Session,
    },
    state::AppState,
    utils::{codes::is_valid_session_code, jwt::verify_jwt},
};

#[derive(Deserialize)]
pub struct WsQuery {
    pub role: Role,
    /// Spectator display name; ignored for presenters (the JWT carries it).
    #[serde(default)]
    pub name: Option<String>,
    /// Presenter JWT, passed as a query parameter since browsers cannot set
    /// headers on WebSocket upgrades.
    #[serde(default)]
    pub token: Option<String>,
}

/// Upgrades a participant onto a live session's socket.
///
/// Presenters must authenticate with a JWT; spectators only supply a display
/// name. All checks happen before the upgrade so failures surface as normal
/// HTTP errors.
pub async fn live_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_code): Path<String>,
    Query(params): Query<WsQuery>,
) -> Result<impl IntoResponse, AppError> {
    if !is_valid_session_code(&session_code) {
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
    .bind(&session_code)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Session not found.".to_string()))?;

    let (name, presenter_id) = match params.role {
        Role::Presenter => {
            let token = params.token.as_deref().ok_or_else(|| {
                AppError::AuthError("Presenter connections require a token.".to_string())
            })?;
            let claims = verify_jwt(token, &state.config.jwt_secret)?;
            if claims.presenter_id() != session.presenter_id {
                return Err(AppError::Forbidden(
                    "This session belongs to another presenter.".to_string(),
                ));
            }
            (claims.name.clone(), claims.presenter_id())
        }
        Role::Spectator => {
            let name = params
                .name
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("Spectators must supply a display name.".to_string())
                })?;
            (name, session.presenter_id)
        }
    };

    let role = params.role;
    Ok(ws.on_upgrade(move |socket| {
        run_socket(socket, state, session_code, role, name, presenter_id)
    }))
}

/// Drives one upgraded connection until either side closes.
///
/// The channel session handles typed state (timer, content mirror, roster);
/// this loop bridges it to the wire: every topic envelope is forwarded to
/// the client as JSON, and inbound frames are parsed as commands and
/// dispatched with role authorization.
async fn run_socket(
    socket: WebSocket,
    state: AppState,
    session_code: String,
    role: Role,
    name: String,
    presenter_id: i64,
) {
    // Subscribe the wire forwarder before the session handshake runs:
    // opening the session publishes presence, and a spectator's sync
    // request can be answered immediately, so a receiver created later
    // would miss those frames.
    let forward = state.hub.subscribe(&session_code).await;

    let mut session = ChannelSession::open(&state.hub, &session_code, role, &name).await;

    let (mut sink, mut stream) = socket.split();

    // Direct frames (error feedback) bypass the topic.
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<String>();
    let forward_task = tokio::spawn(async move {
        let mut receiver = match forward {
            Some((_, receiver)) => receiver,
            // Stub mode: only direct frames flow.
            None => {
                while let Some(frame) = direct_rx.recv().await {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                return;
            }
        };

        loop {
            tokio::select! {
                result = receiver.recv() => match result {
                    Ok(envelope) => {
                        let Ok(frame) = serde_json::to_string(&envelope) else {
                            continue;
                        };
                        if sink.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Socket forwarder lagged, {} frames dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                frame = direct_rx.recv() => match frame {
                    Some(frame) => {
                        if sink.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Socket error for {} in {}: {}", name, session_code, e);
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let command = match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(command) => command,
                    Err(e) => {
                        send_error(&direct_tx, &format!("Unrecognized command: {}", e));
                        continue;
                    }
                };
                if let Err(e) =
                    dispatch(&state, &mut session, presenter_id, command).await
                {
                    send_error(&direct_tx, &error_text(e));
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum; pongs and binary are ignored.
            _ => {}
        }
    }

    forward_task.abort();
    session.close().await;
    tracing::info!("{} disconnected from session {}", name, session_code);
}

fn send_error(direct_tx: &mpsc::UnboundedSender<String>, message: &str) {
    let frame = json!({ "type": "error", "message": message }).to_string();
    let _ = direct_tx.send(frame);
}

fn error_text(err: AppError) -> String {
    match err {
        AppError::InternalServerError(_) => "Internal error".to_string(),
        AppError::BadRequest(msg)
        | AppError::AuthError(msg)
        | AppError::Forbidden(msg)
        | AppError::NotFound(msg)
        | AppError::Conflict(msg) => msg,
    }
}

/// Applies one inbound command to the channel session. Authorization is by
/// role: the presenter drives content, timer, questions and teardown;
/// reactions and sync requests are open to everyone.
async fn dispatch(
    state: &AppState,
    session: &mut ChannelSession,
    presenter_id: i64,
    command: ClientCommand,
) -> Result<(), AppError> {
    let role = session.role();
    let presenter_only = move || -> Result<(), AppError> {
        if role != Role::Presenter {
            return Err(AppError::Forbidden(
                "Only the presenter may do that.".to_string(),
            ));
        }
        Ok(())
    };

    match command {
        ClientCommand::StartTimer { total_seconds } => {
            presenter_only()?;
            session.start_timer(total_seconds).await
        }
        ClientCommand::PauseTimer => {
            presenter_only()?;
            session.pause_timer().await
        }
        ClientCommand::ResumeTimer => {
            presenter_only()?;
            session.resume_timer().await
        }
        ClientCommand::ResetTimer => {
            presenter_only()?;
            session.reset_timer().await;
            Ok(())
        }
        ClientCommand::NextSlide => {
            presenter_only()?;
            session.advance(Direction::Next).await;
            Ok(())
        }
        ClientCommand::PrevSlide => {
            presenter_only()?;
            session.advance(Direction::Previous).await;
            Ok(())
        }
        ClientCommand::LoadPdf {
            title,
            file_url,
            total_pages,
        } => {
            presenter_only()?;
            session.load_pdf(&title, &file_url, total_pages).await
        }
        ClientCommand::LoadInteractive { presentation_id } => {
            presenter_only()?;
            let presentation = sqlx::query_as::<_, InteractivePresentation>(
                r#"
                SELECT id, creator_id, title, slides, created_at
                FROM interactive_presentations
                WHERE id = $1 AND creator_id = $2
                "#,
            )
            .bind(presentation_id)
            .bind(presenter_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Presentation not found.".to_string()))?;

            session
                .load_interactive(&presentation.title, presentation.slides.0)
                .await
        }
        ClientCommand::LoadVideo { title, url } => {
            presenter_only()?;
            session.load_video(&title, &url).await
        }
        ClientCommand::EndPresentation => {
            presenter_only()?;
            session.end_presentation().await;
            Ok(())
        }
        ClientCommand::PushQuestion { question_id } => {
            presenter_only()?;
            let question = sqlx::query_as::<_, SavedQuestion>(
                r#"
                SELECT id, creator_id, title, question_type, options, created_at
                FROM saved_questions
                WHERE id = $1 AND creator_id = $2
                "#,
            )
            .bind(question_id)
            .bind(presenter_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Question not found.".to_string()))?;

            session.push_question(QuestionPush {
                question_id: question.id,
                title: question.title,
                qtype: question.question_type,
                options: question.options.0.choices,
            });
            Ok(())
        }
        ClientCommand::DeleteSession => {
            presenter_only()?;
            session.announce_session_delete("The presenter has ended this session.");
            let code = session.session_code().to_string();
            state.hub.close_topic(&code).await;
            sqlx::query("DELETE FROM sessions WHERE session_code = $1 AND presenter_id = $2")
                .bind(&code)
                .bind(presenter_id)
                .execute(&state.pool)
                .await?;
            Ok(())
        }
        ClientCommand::SendReaction { kind } => session.send_reaction(&kind),
        ClientCommand::RequestSlideSync => {
            session.request_slide_sync();
            Ok(())
        }
    }
}
