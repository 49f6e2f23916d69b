// src/state.rs

use crate::config::Config;
use crate::exam::machine::{AttemptRegistry, PgAttemptStore};
use crate::live::hub::LiveHub;
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// In-process realtime fabric: one topic per live session.
    pub hub: LiveHub,
    /// State machines for exam attempts still in progress.
    pub attempts: AttemptRegistry<PgAttemptStore>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for LiveHub {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}
