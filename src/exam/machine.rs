// src/exam/machine.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::exam::grading;

/// Lifecycle of one student's exam attempt. Transitions only move forward;
/// Finalized is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    NotStarted,
    InProgress,
    Submitting,
    Finalized,
}

/// Persistence seam for the attempt state machine: incremental answer
/// upserts while in progress, and the grading handoff at submission.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Upserts one answer keyed by (attempt, question); last write wins,
    /// no history kept.
    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        value: &str,
    ) -> Result<(), AppError>;

    /// Grades the attempt from its stored answers, writing score and
    /// end time. Must reject an already finalized attempt.
    async fn grade(&self, attempt_id: i64) -> Result<f64, AppError>;
}

/// `AttemptStore` backed by the relational store.
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        value: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO attempt_answers (attempt_id, question_id, answer)
             VALUES ($1, $2, jsonb_build_object('value', $3::TEXT))
             ON CONFLICT (attempt_id, question_id)
             DO UPDATE SET answer = EXCLUDED.answer",
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn grade(&self, attempt_id: i64) -> Result<f64, AppError> {
        grading::grade_attempt(&self.pool, attempt_id).await
    }
}

/// Governs one student's run through one exam. The student navigates
/// freely in both directions, so answers arrive in any order; each one
/// is persisted as the student leaves the question, last write wins. A
/// per-attempt countdown runs independently of navigation, and reaching
/// zero forces submission with no confirmation step. Manual submission
/// requires confirmation. Once grading succeeds the attempt is Finalized
/// and nothing re-enters InProgress.
pub struct AttemptRunner<S: AttemptStore> {
    store: Arc<S>,
    attempt_id: i64,
    question_ids: Vec<i64>,
    time_limit: Duration,
    phase: AttemptPhase,
    deadline: Option<Instant>,
}

impl<S: AttemptStore> AttemptRunner<S> {
    pub fn new(
        store: Arc<S>,
        attempt_id: i64,
        question_ids: Vec<i64>,
        time_limit_minutes: u32,
    ) -> Self {
        Self {
            store,
            attempt_id,
            question_ids,
            time_limit: Duration::from_secs(u64::from(time_limit_minutes) * 60),
            phase: AttemptPhase::NotStarted,
            deadline: None,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn attempt_id(&self) -> i64 {
        self.attempt_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Enters InProgress and arms the countdown. Valid only once, after
    /// join validation and attempt-record creation.
    pub fn begin(&mut self) -> Result<(), AppError> {
        if self.phase != AttemptPhase::NotStarted {
            return Err(AppError::Conflict("Attempt already started.".to_string()));
        }
        self.phase = AttemptPhase::InProgress;
        self.deadline = Some(Instant::now() + self.time_limit);
        Ok(())
    }

    /// Records one answer while the attempt is in progress. The question
    /// must belong to this exam; the write is persisted immediately.
    pub async fn answer(&mut self, question_id: i64, value: &str) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        if !self.question_ids.contains(&question_id) {
            return Err(AppError::BadRequest(
                "Question is not part of this exam.".to_string(),
            ));
        }
        self.store
            .upsert_answer(self.attempt_id, question_id, value)
            .await
    }

    /// Explicit submission. The student must confirm; only the timeout
    /// path skips that step.
    pub async fn submit(&mut self, confirmed: bool) -> Result<f64, AppError> {
        self.ensure_in_progress()?;
        if !confirmed {
            return Err(AppError::BadRequest(
                "Submission requires confirmation.".to_string(),
            ));
        }
        self.finish().await
    }

    /// Timeout path: forces submission regardless of confirmation state.
    pub async fn expire(&mut self) -> Result<f64, AppError> {
        self.ensure_in_progress()?;
        tracing::info!("Attempt {} timed out; auto-submitting", self.attempt_id);
        self.finish().await
    }

    async fn finish(&mut self) -> Result<f64, AppError> {
        self.phase = AttemptPhase::Submitting;

        match self.store.grade(self.attempt_id).await {
            Ok(score) => {
                self.phase = AttemptPhase::Finalized;
                self.deadline = None;
                Ok(score)
            }
            Err(e) => {
                // The attempt stays un-finalized so submission can retry.
                self.phase = AttemptPhase::InProgress;
                Err(e)
            }
        }
    }

    fn ensure_in_progress(&self) -> Result<(), AppError> {
        match self.phase {
            AttemptPhase::InProgress => Ok(()),
            AttemptPhase::NotStarted => {
                Err(AppError::Conflict("Attempt has not started.".to_string()))
            }
            AttemptPhase::Submitting | AttemptPhase::Finalized => Err(AppError::Conflict(
                "Attempt is already finalized.".to_string(),
            )),
        }
    }
}

/// Live state machines for in-progress attempts, keyed by attempt id.
/// Registered at join time; the deadline watchdog drops the entry once
/// it fires. After a restart the map is empty, and the answer and submit
/// handlers fall back to the stored-attempt guards.
pub struct AttemptRegistry<S: AttemptStore> {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<AttemptRunner<S>>>>>>,
}

impl<S: AttemptStore> Clone for AttemptRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AttemptStore> Default for AttemptRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AttemptStore> AttemptRegistry<S> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, attempt_id: i64, runner: Arc<Mutex<AttemptRunner<S>>>) {
        self.inner.lock().await.insert(attempt_id, runner);
    }

    pub async fn get(&self, attempt_id: i64) -> Option<Arc<Mutex<AttemptRunner<S>>>> {
        self.inner.lock().await.get(&attempt_id).map(Arc::clone)
    }

    pub async fn remove(&self, attempt_id: i64) {
        self.inner.lock().await.remove(&attempt_id);
    }
}

/// Sleeps until the attempt's deadline, then force-submits if the student
/// has not already finished. Spawned once per attempt at begin time.
pub async fn enforce_deadline<S: AttemptStore>(runner: Arc<Mutex<AttemptRunner<S>>>) {
    let deadline = {
        let runner = runner.lock().await;
        match runner.deadline() {
            Some(deadline) => deadline,
            None => return,
        }
    };

    tokio::time::sleep_until(deadline).await;

    let mut runner = runner.lock().await;
    if runner.phase() == AttemptPhase::InProgress {
        if let Err(e) = runner.expire().await {
            tracing::error!("Auto-submit failed for attempt {}: {}", runner.attempt_id(), e);
        }
    }
}
