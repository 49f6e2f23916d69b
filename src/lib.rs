// src/lib.rs

pub mod config;
pub mod error;
pub mod exam;
pub mod handlers;
pub mod live;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

// The single entry point the binary and the integration tests build from.
pub use routes::create_router;
