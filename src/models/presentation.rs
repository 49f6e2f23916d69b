// src/models/presentation.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::live::protocol::SlideElement;

/// File extensions accepted as presentation uploads. The upload itself goes
/// to blob storage elsewhere; only the metadata is registered here.
pub const SUPPORTED_PRESENTATION_TYPES: [&str; 4] = ["pdf", "ppt", "pptx", "docx"];

/// Represents the 'interactive_presentations' table: slide decks built in
/// the drag-and-drop editor, stored as positioned elements per slide.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InteractivePresentation {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub slides: Json<Vec<InteractiveSlide>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One slide of an interactive presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveSlide {
    pub content: Vec<SlideElement>,
}

/// Represents the 'presentation_files' table: uploaded-file metadata.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PresentationFile {
    pub id: i64,
    pub creator_id: i64,
    pub name: String,
    pub file_type: String,
    pub file_url: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating an interactive presentation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInteractiveRequest {
    #[validate(length(min = 1, max = 200, message = "Presentation title is required."))]
    pub title: String,
    #[validate(length(min = 1, message = "A presentation needs at least one slide."))]
    pub slides: Vec<InteractiveSlide>,
}

/// DTO for registering uploaded-file metadata.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterFileRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 10))]
    pub file_type: String,
    #[validate(url(message = "file_url must be a valid URL."))]
    pub file_url: String,
}
