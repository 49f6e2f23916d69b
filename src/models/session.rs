// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'sessions' table in the database.
/// One row per live presentation session; destroyed when the presenter ends it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,

    /// Human-shareable join code: fixed prefix + 5-digit suffix.
    pub session_code: String,

    pub presenter_id: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Response for a freshly created session.
#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub session_code: String,
    /// Pub/sub topic all participants subscribe to.
    pub topic: String,
}

/// DTO for a spectator joining an existing session.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinSessionRequest {
    #[validate(length(min = 1, max = 64))]
    pub session_code: String,
    #[validate(length(min = 1, max = 50, message = "Display name is required."))]
    pub spectator_name: String,
}
