// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Fixed choices presented for true/false questions. Grading compares
/// against these exact strings, so they are defined in one place.
pub const TRUE_FALSE_CHOICES: [&str; 2] = ["true", "false"];

/// Question kinds supported by exams and the live question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::OpenEnded => "open-ended",
        }
    }

    /// Parses the database representation. Question rows store the type as
    /// TEXT, matching the values this returns from `as_str`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple-choice" => Some(QuestionType::MultipleChoice),
            "true-false" => Some(QuestionType::TrueFalse),
            "open-ended" => Some(QuestionType::OpenEnded),
            _ => None,
        }
    }
}

/// The 'options' JSONB column shared by exam questions and saved questions.
/// `correct_answer` is nullable: open-ended questions may omit a reference
/// answer (and are then always scored incorrect, by design).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

/// Represents the 'questions' table: one question belonging to an exam.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,
    pub question_text: String,
    /// One of the `QuestionType::as_str` values.
    pub question_type: String,
    pub options: Json<QuestionOptions>,
}

/// DTO for sending a question to a student (excludes the correct answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub choices: Option<Vec<String>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            choices: q.options.0.choices,
        }
    }
}

/// Represents the 'saved_questions' table: the presenter's question bank,
/// pushed live to spectators during a session.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SavedQuestion {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub question_type: String,
    pub options: Json<QuestionOptions>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for saving a question into the bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSavedQuestionRequest {
    #[validate(length(min = 1, max = 500, message = "Question title is required."))]
    pub title: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

impl CreateSavedQuestionRequest {
    /// Multiple-choice questions need at least two non-empty options;
    /// true/false and open-ended carry fixed or no choices.
    pub fn validate_choices(&self) -> Result<(), String> {
        match self.question_type {
            QuestionType::MultipleChoice => match &self.choices {
                Some(choices) if choices.len() >= 2 && choices.iter().all(|c| !c.trim().is_empty()) => Ok(()),
                _ => Err("Multiple-choice questions need at least two non-empty options.".to_string()),
            },
            QuestionType::TrueFalse | QuestionType::OpenEnded => Ok(()),
        }
    }
}
