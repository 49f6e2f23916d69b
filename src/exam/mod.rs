// src/exam/mod.rs
//
// Exam core: the per-student attempt state machine and the deterministic
// grading engine it terminates into.

pub mod grading;
pub mod machine;
