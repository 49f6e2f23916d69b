// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Prefix every live-session and exam join code starts with.
pub const SESSION_CODE_PREFIX: &str = "AULAPUDU-";

/// Number of random digits appended to the prefix.
pub const SESSION_CODE_DIGITS: usize = 5;

/// Topic prefix on the realtime fabric. Topic name = prefix + session code.
pub const REALTIME_CHANNEL_PREFIX: &str = "realtime:";

/// While the countdown is running, an `update` broadcast fires whenever
/// `remaining % TIMER_BROADCAST_STEP == 0`, bounding spectator drift
/// without flooding the channel every second.
pub const TIMER_BROADCAST_STEP: u32 = 5;

/// Reaction kinds spectators may emit.
pub const REACTION_KINDS: [&str; 5] = ["love", "clap", "question", "thumbsup", "thumbsdown"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
        }
    }
}
