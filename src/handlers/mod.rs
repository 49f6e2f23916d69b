// src/handlers/mod.rs

pub mod auth;
pub mod exam;
pub mod presentation;
pub mod question;
pub mod session;
pub mod ws;
