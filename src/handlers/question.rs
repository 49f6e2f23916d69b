// src/handlers/question.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateSavedQuestionRequest, QuestionOptions, QuestionType, SavedQuestion},
    utils::{html::clean_html, jwt::Claims},
};

/// Saves a question into the presenter's bank, ready to push live.
pub async fn create_saved_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSavedQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    payload.validate_choices().map_err(AppError::BadRequest)?;

    let choices = match payload.question_type {
        QuestionType::MultipleChoice => payload.choices.clone(),
        QuestionType::TrueFalse => Some(
            crate::models::question::TRUE_FALSE_CHOICES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
        QuestionType::OpenEnded => None,
    };

    let question = sqlx::query_as::<_, SavedQuestion>(
        r#"
        INSERT INTO saved_questions (creator_id, title, question_type, options)
        VALUES ($1, $2, $3, $4)
        RETURNING id, creator_id, title, question_type, options, created_at
        "#,
    )
    .bind(claims.presenter_id())
    .bind(clean_html(&payload.title))
    .bind(payload.question_type.as_str())
    .bind(sqlx::types::Json(QuestionOptions {
        choices,
        correct_answer: None,
    }))
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Lists the presenter's question bank, newest first.
pub async fn list_saved_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, SavedQuestion>(
        r#"
        SELECT id, creator_id, title, question_type, options, created_at
        FROM saved_questions
        WHERE creator_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(claims.presenter_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

/// Removes a question from the bank.
pub async fn delete_saved_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM saved_questions WHERE id = $1 AND creator_id = $2")
        .bind(question_id)
        .bind(claims.presenter_id())
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
