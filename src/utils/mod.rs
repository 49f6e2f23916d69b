// src/utils/mod.rs

pub mod codes;
pub mod hash;
pub mod html;
pub mod jwt;
