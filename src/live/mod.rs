// src/live/mod.rs
//
// Real-time session core: wire protocol, in-process pub/sub fabric,
// presence roster, countdown timer, content synchronizer and the
// per-participant channel session that ties them together.

pub mod content;
pub mod hub;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod timer;
