// src/exam/grading.rs

use std::collections::HashMap;

use sqlx::PgPool;
use sqlx::types::Json;

use crate::error::AppError;
use crate::models::exam::{AnswerValue, ExamAttempt};
use crate::models::question::QuestionOptions;

/// The grading key for one question: its stored correct answer, if any.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_id: i64,
    pub correct_answer: Option<String>,
}

/// Deterministic scoring of a completed attempt.
///
/// Per-question correctness is exact string equality between the stored
/// answer and the question's correct answer; questions without a reference
/// answer (open-ended without one) always score incorrect -- no partial
/// credit, no fuzzy matching. `score = 100 * correct / total`, and an exam
/// with zero questions scores 0 rather than dividing by zero.
pub fn score_answers(keys: &[AnswerKey], answers: &HashMap<i64, String>) -> (usize, f64) {
    let total = keys.len();
    if total == 0 {
        return (0, 0.0);
    }

    let correct = keys
        .iter()
        .filter(|key| match (&key.correct_answer, answers.get(&key.question_id)) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        })
        .count();

    (correct, correct as f64 / total as f64 * 100.0)
}

#[derive(sqlx::FromRow)]
struct QuestionKeyRow {
    id: i64,
    options: Json<QuestionOptions>,
}

#[derive(sqlx::FromRow)]
struct StoredAnswerRow {
    question_id: i64,
    answer: Json<AnswerValue>,
}

/// Grades an attempt against its exam's stored answer keys and writes
/// `score` and `end_time` to the attempt record.
///
/// Finalization is gated explicitly: grading an attempt whose `end_time`
/// is already set returns a conflict instead of silently overwriting the
/// earlier result. A grading failure leaves the attempt un-finalized so
/// submission can be retried.
pub async fn grade_attempt(pool: &PgPool, attempt_id: i64) -> Result<f64, AppError> {
    let attempt = sqlx::query_as::<_, ExamAttempt>(
        "SELECT id, exam_id, student_name, start_time, end_time, score, created_at
         FROM exam_attempts WHERE id = $1",
    )
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.end_time.is_some() {
        return Err(AppError::Conflict(
            "Attempt is already finalized.".to_string(),
        ));
    }

    let keys: Vec<AnswerKey> = sqlx::query_as::<_, QuestionKeyRow>(
        "SELECT id, options FROM questions WHERE exam_id = $1 ORDER BY id",
    )
    .bind(attempt.exam_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| AnswerKey {
        question_id: row.id,
        correct_answer: row.options.0.correct_answer,
    })
    .collect();

    let answers: HashMap<i64, String> = sqlx::query_as::<_, StoredAnswerRow>(
        "SELECT question_id, answer FROM attempt_answers WHERE attempt_id = $1",
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| (row.question_id, row.answer.0.value))
    .collect();

    let (correct, score) = score_answers(&keys, &answers);

    // The extra end_time IS NULL guard closes the race with a concurrent
    // timeout-driven grade of the same attempt.
    let updated = sqlx::query(
        "UPDATE exam_attempts SET score = $1, end_time = NOW()
         WHERE id = $2 AND end_time IS NULL",
    )
    .bind(score)
    .bind(attempt_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Attempt is already finalized.".to_string(),
        ));
    }

    tracing::info!(
        "Attempt {} graded: {}/{} correct, score {:.2}",
        attempt_id,
        correct,
        keys.len(),
        score
    );

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(specs: &[(i64, Option<&str>)]) -> Vec<AnswerKey> {
        specs
            .iter()
            .map(|(id, answer)| AnswerKey {
                question_id: *id,
                correct_answer: answer.map(str::to_string),
            })
            .collect()
    }

    #[test]
    fn three_of_four_scores_seventy_five() {
        let keys = keys(&[(1, Some("a")), (2, Some("b")), (3, Some("c")), (4, Some("d"))]);
        let answers = HashMap::from([
            (1, "a".to_string()),
            (2, "b".to_string()),
            (3, "c".to_string()),
            (4, "x".to_string()),
        ]);
        let (correct, score) = score_answers(&keys, &answers);
        assert_eq!(correct, 3);
        assert_eq!(score, 75.0);
    }

    #[test]
    fn zero_questions_scores_zero() {
        let (correct, score) = score_answers(&[], &HashMap::new());
        assert_eq!(correct, 0);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn unanswered_questions_count_as_incorrect() {
        let keys = keys(&[(1, Some("a")), (2, Some("b"))]);
        let answers = HashMap::from([(1, "a".to_string())]);
        let (correct, score) = score_answers(&keys, &answers);
        assert_eq!(correct, 1);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn open_ended_without_reference_is_always_incorrect() {
        let keys = keys(&[(1, None)]);
        let answers = HashMap::from([(1, "any essay at all".to_string())]);
        let (correct, score) = score_answers(&keys, &answers);
        assert_eq!(correct, 0);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn matching_is_exact_string_equality() {
        let keys = keys(&[(1, Some("Paris"))]);
        let answers = HashMap::from([(1, "paris".to_string())]);
        let (correct, _) = score_answers(&keys, &answers);
        assert_eq!(correct, 0);
    }

    #[test]
    fn grading_is_deterministic() {
        let keys = keys(&[(1, Some("a")), (2, Some("b")), (3, None)]);
        let answers = HashMap::from([(1, "a".to_string()), (3, "essay".to_string())]);
        let first = score_answers(&keys, &answers);
        let second = score_answers(&keys, &answers);
        assert_eq!(first, second);
    }
}
