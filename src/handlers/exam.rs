// src/handlers/exam.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::Mutex;
use validator::Validate;

use crate::{
    error::AppError,
    exam::machine::{AttemptRunner, AttemptStore, PgAttemptStore, enforce_deadline},
    models::{
        exam::{
            AnswerValue, AttemptResultResponse, CreateExamRequest, Exam, ExamAttempt,
            ExamJoinedResponse, JoinExamRequest, QuestionResult, SaveAnswerRequest,
            SubmitAttemptRequest,
        },
        question::{PublicQuestion, Question, QuestionOptions},
    },
    state::AppState,
    utils::{
        codes::{generate_session_code, is_valid_session_code},
        html::clean_html,
        jwt::Claims,
    },
};

/// Creates an exam with its full question list in one transaction.
///
/// Per-question shape rules (choice counts, correct-answer membership) are
/// validated up front so either everything lands or nothing does.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    for question in &payload.questions {
        question.validate_shape().map_err(AppError::BadRequest)?;
    }

    let mut tx = pool.begin().await?;

    let exam = sqlx::query_as::<_, Exam>(
        r#"
        INSERT INTO exams (title, time_limit_minutes, creator_id)
        VALUES ($1, $2, $3)
        RETURNING id, title, time_limit_minutes, creator_id, join_code, is_active, created_at
        "#,
    )
    .bind(clean_html(&payload.title))
    .bind(payload.time_limit_minutes)
    .bind(claims.presenter_id())
    .fetch_one(&mut *tx)
    .await?;

    for question in &payload.questions {
        let options = QuestionOptions {
            choices: question.effective_choices(),
            correct_answer: question.correct_answer.clone(),
        };
        sqlx::query(
            r#"
            INSERT INTO questions (exam_id, question_text, question_type, options)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(exam.id)
        .bind(clean_html(&question.text))
        .bind(question.question_type.as_str())
        .bind(sqlx::types::Json(options))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Exam {} created by presenter {} with {} questions",
        exam.id,
        claims.presenter_id(),
        payload.questions.len()
    );

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Lists the authenticated presenter's exams.
pub async fn list_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let exams = sqlx::query_as::<_, Exam>(
        r#"
        SELECT id, title, time_limit_minutes, creator_id, join_code, is_active, created_at
        FROM exams
        WHERE creator_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(claims.presenter_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}

/// Deletes an exam the presenter owns, cascading to its questions,
/// attempts and answers.
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let _ = owned_exam(&pool, exam_id, claims.presenter_id()).await?;

    sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(exam_id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Activates an exam: allocates a join code and opens it to students.
pub async fn activate_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let _ = owned_exam(&pool, exam_id, claims.presenter_id()).await?;

    // Re-roll on join-code collisions, same as session creation.
    for _ in 0..5 {
        let code = generate_session_code();
        let updated = sqlx::query_as::<_, Exam>(
            r#"
            UPDATE exams
            SET join_code = $1, is_active = TRUE
            WHERE id = $2
              AND NOT EXISTS (SELECT 1 FROM exams WHERE join_code = $1)
            RETURNING id, title, time_limit_minutes, creator_id, join_code, is_active, created_at
            "#,
        )
        .bind(&code)
        .bind(exam_id)
        .fetch_optional(&pool)
        .await?;

        if let Some(exam) = updated {
            tracing::info!("Exam {} activated with code {}", exam_id, code);
            return Ok(Json(exam));
        }
    }

    Err(AppError::InternalServerError(
        "Could not allocate a join code".to_string(),
    ))
}

/// Deactivates an exam: students can no longer join, but existing attempts
/// keep running until their own deadlines.
pub async fn deactivate_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let _ = owned_exam(&pool, exam_id, claims.presenter_id()).await?;

    let exam = sqlx::query_as::<_, Exam>(
        r#"
        UPDATE exams
        SET is_active = FALSE, join_code = NULL
        WHERE id = $1
        RETURNING id, title, time_limit_minutes, creator_id, join_code, is_active, created_at
        "#,
    )
    .bind(exam_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(exam))
}

/// A student joins an active exam by code. Creates the attempt record,
/// registers its state machine with an armed deadline, and returns the
/// questions with correct answers stripped.
pub async fn join_exam(
    State(state): State<AppState>,
    Json(payload): Json<JoinExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool.clone();
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if !is_valid_session_code(&payload.join_code) {
        return Err(AppError::BadRequest(
            "Join code has an invalid format.".to_string(),
        ));
    }

    let exam = sqlx::query_as::<_, Exam>(
        r#"
        SELECT id, title, time_limit_minutes, creator_id, join_code, is_active, created_at
        FROM exams
        WHERE join_code = $1 AND is_active = TRUE
        "#,
    )
    .bind(&payload.join_code)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("No active exam with that code.".to_string()))?;

    let attempt = sqlx::query_as::<_, ExamAttempt>(
        r#"
        INSERT INTO exam_attempts (exam_id, student_name, start_time)
        VALUES ($1, $2, NOW())
        RETURNING id, exam_id, student_name, start_time, end_time, score, created_at
        "#,
    )
    .bind(exam.id)
    .bind(&payload.student_name)
    .fetch_one(&pool)
    .await?;

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, exam_id, question_text, question_type, options
        FROM questions
        WHERE exam_id = $1
        ORDER BY id
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    // The attempt's state machine lives in the registry so the answer and
    // submit handlers all drive the same lifecycle. The deadline watchdog
    // force-submits when the clock runs out, whether or not the client is
    // still connected, then retires the entry.
    let store = Arc::new(PgAttemptStore::new(pool.clone()));
    let question_ids = questions.iter().map(|q| q.id).collect();
    let mut runner = AttemptRunner::new(
        store,
        attempt.id,
        question_ids,
        exam.time_limit_minutes.max(0) as u32,
    );
    runner.begin()?;

    let runner = Arc::new(Mutex::new(runner));
    let attempt_id = attempt.id;
    state.attempts.insert(attempt_id, Arc::clone(&runner)).await;

    let registry = state.attempts.clone();
    tokio::spawn(async move {
        enforce_deadline(runner).await;
        registry.remove(attempt_id).await;
    });

    tracing::info!(
        "{} joined exam {} as attempt {}",
        payload.student_name,
        exam.id,
        attempt.id
    );

    Ok((
        StatusCode::CREATED,
        Json(ExamJoinedResponse {
            attempt_id: attempt.id,
            exam_id: exam.id,
            title: exam.title,
            time_limit_minutes: exam.time_limit_minutes,
            questions: questions.into_iter().map(PublicQuestion::from).collect(),
        }),
    ))
}

/// Stores or overwrites one answer for an in-progress attempt.
/// Last write wins; a finalized attempt rejects further writes.
pub async fn save_answer(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(runner) = state.attempts.get(attempt_id).await {
        runner
            .lock()
            .await
            .answer(payload.question_id, &payload.value)
            .await?;
        return Ok(StatusCode::NO_CONTENT);
    }

    // No live state machine (a restart, or the deadline already retired
    // it): the stored record still decides whether the write is legal.
    let attempt = fetch_attempt(&state.pool, attempt_id).await?;
    if attempt.end_time.is_some() {
        return Err(AppError::Conflict(
            "Attempt is already finalized.".to_string(),
        ));
    }

    PgAttemptStore::new(state.pool.clone())
        .upsert_answer(attempt_id, payload.question_id, &payload.value)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Explicit submission. Requires confirmation; only the server-side timeout
/// skips that step.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(runner) = state.attempts.get(attempt_id).await {
        let score = runner.lock().await.submit(payload.confirmed).await?;
        state.attempts.remove(attempt_id).await;
        return Ok(Json(json!({
            "attempt_id": attempt_id,
            "score": score,
        })));
    }

    // Restart path: the confirmation and finalization guards still apply,
    // enforced against the stored record.
    if !payload.confirmed {
        return Err(AppError::BadRequest(
            "Submission requires confirmation.".to_string(),
        ));
    }

    let score = PgAttemptStore::new(state.pool.clone())
        .grade(attempt_id)
        .await?;

    Ok(Json(json!({
        "attempt_id": attempt_id,
        "score": score,
    })))
}

/// The student's own results page: the finalized attempt plus a
/// per-question breakdown of what was answered and what was expected.
/// Gated on finalization so correct answers never leak mid-attempt.
pub async fn attempt_result(
    State(pool): State<PgPool>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&pool, attempt_id).await?;
    if attempt.end_time.is_none() {
        return Err(AppError::Conflict(
            "Results are available once the attempt is finalized.".to_string(),
        ));
    }

    let rows = sqlx::query_as::<_, ResultRow>(
        r#"
        SELECT q.id, q.question_text, q.question_type, q.options, a.answer
        FROM questions q
        LEFT JOIN attempt_answers a
          ON a.question_id = q.id AND a.attempt_id = $1
        WHERE q.exam_id = $2
        ORDER BY q.id
        "#,
    )
    .bind(attempt_id)
    .bind(attempt.exam_id)
    .fetch_all(&pool)
    .await?;

    let questions = rows
        .into_iter()
        .map(|row| {
            let student_answer = row.answer.map(|a| a.0.value);
            let correct_answer = row.options.0.correct_answer;
            // Same rule the grader applies: exact string equality, and a
            // question without a reference answer is never correct.
            let is_correct = match (&correct_answer, &student_answer) {
                (Some(expected), Some(given)) => expected == given,
                _ => false,
            };
            QuestionResult {
                question_id: row.id,
                question_text: row.question_text,
                question_type: row.question_type,
                student_answer,
                correct_answer,
                is_correct,
            }
        })
        .collect();

    Ok(Json(AttemptResultResponse { attempt, questions }))
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: i64,
    question_text: String,
    question_type: String,
    options: sqlx::types::Json<QuestionOptions>,
    answer: Option<sqlx::types::Json<AnswerValue>>,
}

/// All attempts for an exam the presenter owns, newest first.
pub async fn exam_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let _ = owned_exam(&pool, exam_id, claims.presenter_id()).await?;

    let attempts = sqlx::query_as::<_, ExamAttempt>(
        r#"
        SELECT id, exam_id, student_name, start_time, end_time, score, created_at
        FROM exam_attempts
        WHERE exam_id = $1
        ORDER BY start_time DESC
        "#,
    )
    .bind(exam_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

async fn fetch_attempt(pool: &PgPool, attempt_id: i64) -> Result<ExamAttempt, AppError> {
    sqlx::query_as::<_, ExamAttempt>(
        r#"
        SELECT id, exam_id, student_name, start_time, end_time, score, created_at
        FROM exam_attempts
        WHERE id = $1
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found.".to_string()))
}

/// Loads an exam and enforces ownership in one step.
async fn owned_exam(pool: &PgPool, exam_id: i64, presenter_id: i64) -> Result<Exam, AppError> {
    let exam = sqlx::query_as::<_, Exam>(
        r#"
        SELECT id, title, time_limit_minutes, creator_id, join_code, is_active, created_at
        FROM exams
        WHERE id = $1
        "#,
    )
    .bind(exam_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found.".to_string()))?;

    if exam.creator_id != presenter_id {
        return Err(AppError::Forbidden(
            "This exam belongs to another presenter.".to_string(),
        ));
    }

    Ok(exam)
}
