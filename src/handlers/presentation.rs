// src/handlers/presentation.rs

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
    models::presentation::{
        CreateInteractiveRequest, InteractivePresentation, PresentationFile, RegisterFileRequest,
        SUPPORTED_PRESENTATION_TYPES,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Creates an interactive presentation from the slide editor.
pub async fn create_interactive(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateInteractiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let presentation = sqlx::query_as::<_, InteractivePresentation>(
        r#"
        INSERT INTO interactive_presentations (creator_id, title, slides)
        VALUES ($1, $2, $3)
        RETURNING id, creator_id, title, slides, created_at
        "#,
    )
    .bind(claims.presenter_id())
    .bind(clean_html(&payload.title))
    .bind(sqlx::types::Json(&payload.slides))
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(presentation)))
}

/// Lists the presenter's interactive presentations.
pub async fn list_interactive(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let presentations = sqlx::query_as::<_, InteractivePresentation>(
        r#"
        SELECT id, creator_id, title, slides, created_at
        FROM interactive_presentations
        WHERE creator_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(claims.presenter_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(presentations))
}

/// Fetches one interactive presentation, slides included.
pub async fn get_interactive(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(presentation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let presentation = sqlx::query_as::<_, InteractivePresentation>(
        r#"
        SELECT id, creator_id, title, slides, created_at
        FROM interactive_presentations
        WHERE id = $1 AND creator_id = $2
        "#,
    )
    .bind(presentation_id)
    .bind(claims.presenter_id())
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Presentation not found.".to_string()))?;

    Ok(Json(presentation))
}

/// Deletes an interactive presentation the presenter owns.
pub async fn delete_interactive(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(presentation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result =
        sqlx::query("DELETE FROM interactive_presentations WHERE id = $1 AND creator_id = $2")
            .bind(presentation_id)
            .bind(claims.presenter_id())
            .execute(&pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Presentation not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Registers metadata for a file already uploaded to blob storage.
/// The server never touches the file contents, only validates the type
/// against the supported extensions.
pub async fn register_file(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RegisterFileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let file_type = payload.file_type.to_lowercase();
    if !SUPPORTED_PRESENTATION_TYPES.contains(&file_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported file type '{}'. Supported: {}",
            payload.file_type,
            SUPPORTED_PRESENTATION_TYPES.join(", ")
        )));
    }

    let file = sqlx::query_as::<_, PresentationFile>(
        r#"
        INSERT INTO presentation_files (creator_id, name, file_type, file_url)
        VALUES ($1, $2, $3, $4)
        RETURNING id, creator_id, name, file_type, file_url, created_at
        "#,
    )
    .bind(claims.presenter_id())
    .bind(&payload.name)
    .bind(&file_type)
    .bind(&payload.file_url)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(file)))
}

/// Lists the presenter's registered presentation files.
pub async fn list_files(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let files = sqlx::query_as::<_, PresentationFile>(
        r#"
        SELECT id, creator_id, name, file_type, file_url, created_at
        FROM presentation_files
        WHERE creator_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(claims.presenter_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(files))
}

/// Removes a file's metadata record.
pub async fn delete_file(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM presentation_files WHERE id = $1 AND creator_id = $2")
        .bind(file_id)
        .bind(claims.presenter_id())
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("File not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
