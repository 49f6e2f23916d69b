// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::{PublicQuestion, QuestionType, TRUE_FALSE_CHOICES};

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub time_limit_minutes: i32,
    pub creator_id: i64,

    /// Join code shared with students when the exam goes live.
    pub join_code: Option<String>,
    /// Gates join eligibility: students can only join while active.
    pub is_active: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'exam_attempts' table: one student's run through one exam.
/// Finalized exactly once, when `end_time` and `score` are set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: i64,
    pub exam_id: i64,
    pub student_name: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub score: Option<f64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'attempt_answers' table. At most one row per
/// (attempt, question); upserts are last-write-wins.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub attempt_id: i64,
    pub question_id: i64,
    pub answer: sqlx::types::Json<AnswerValue>,
}

/// The 'answer' JSONB column wraps the raw value in an object,
/// matching the wire shape stored by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerValue {
    pub value: String,
}

/// One question in an exam-creation request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000, message = "Question text is required."))]
    pub text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl QuestionInput {
    /// Cross-field validation the `validator` derive cannot express:
    /// choice counts and correct-answer membership depend on the type.
    pub fn validate_shape(&self) -> Result<(), String> {
        match self.question_type {
            QuestionType::MultipleChoice => {
                let choices = self
                    .choices
                    .as_ref()
                    .ok_or("Multiple-choice questions need options.")?;
                if choices.len() < 2 || choices.iter().any(|c| c.trim().is_empty()) {
                    return Err("Multiple-choice questions need at least two non-empty options.".to_string());
                }
                match &self.correct_answer {
                    Some(answer) if choices.contains(answer) => Ok(()),
                    Some(_) => Err("The correct answer must be one of the options.".to_string()),
                    None => Err("Multiple-choice questions need a correct answer.".to_string()),
                }
            }
            QuestionType::TrueFalse => match self.correct_answer.as_deref() {
                Some(a) if TRUE_FALSE_CHOICES.contains(&a) => Ok(()),
                _ => Err("True/false questions need 'true' or 'false' as the correct answer.".to_string()),
            },
            // The reference answer is optional for open-ended questions.
            QuestionType::OpenEnded => Ok(()),
        }
    }

    /// Effective choice list stored alongside the question.
    pub fn effective_choices(&self) -> Option<Vec<String>> {
        match self.question_type {
            QuestionType::MultipleChoice => self.choices.clone(),
            QuestionType::TrueFalse => {
                Some(TRUE_FALSE_CHOICES.iter().map(|s| s.to_string()).collect())
            }
            QuestionType::OpenEnded => None,
        }
    }
}

/// DTO for creating an exam with its questions in one request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Exam title is required."))]
    pub title: String,
    #[validate(range(min = 1, max = 600, message = "Time limit must be a positive number of minutes."))]
    pub time_limit_minutes: i32,
    #[validate(length(min = 1, message = "An exam needs at least one question."))]
    pub questions: Vec<QuestionInput>,
}

/// DTO for a student joining an active exam by code.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinExamRequest {
    #[validate(length(min = 1, max = 64))]
    pub join_code: String,
    #[validate(length(min = 1, max = 50, message = "Student name is required."))]
    pub student_name: String,
}

/// Response for a successful exam join: the freshly created attempt plus the
/// exam content with correct answers stripped.
#[derive(Debug, Serialize)]
pub struct ExamJoinedResponse {
    pub attempt_id: i64,
    pub exam_id: i64,
    pub title: String,
    pub time_limit_minutes: i32,
    pub questions: Vec<PublicQuestion>,
}

/// One row of the per-question breakdown on the results page: what the
/// student answered next to what was expected.
#[derive(Debug, Serialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub question_text: String,
    pub question_type: String,
    pub student_answer: Option<String>,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
}

/// Response for a finalized attempt's results: the attempt record with
/// its graded breakdown.
#[derive(Debug, Serialize)]
pub struct AttemptResultResponse {
    #[serde(flatten)]
    pub attempt: ExamAttempt,
    pub questions: Vec<QuestionResult>,
}

/// DTO for an incremental answer upsert.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    pub question_id: i64,
    #[validate(length(max = 5000))]
    pub value: String,
}

/// DTO for the explicit submit action. Submission requires the student to
/// confirm; only the server-side timeout path skips this.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub confirmed: bool,
}
