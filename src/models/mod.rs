// src/models/mod.rs

pub mod exam;
pub mod presentation;
pub mod question;
pub mod session;
pub mod user;
