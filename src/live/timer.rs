// src/live/timer.rs

use crate::config::TIMER_BROADCAST_STEP;
use crate::live::protocol::{TimerAction, TimerBroadcast};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// `start` requires a positive duration.
    InvalidDuration,
    /// The requested transition is not valid from the current state
    /// (e.g. `pause` while idle).
    InvalidTransition,
}

/// Single-source countdown owned by the presenter. Spectators hold a
/// read-only mirror fed by the broadcasts this state machine decides on:
/// every transition broadcasts immediately, and while running an extra
/// `update` fires whenever the remaining time crosses a 5-second step.
///
/// Invariant: `0 <= remaining <= total` while Running/Paused; the machine
/// reaches Finished exactly once per run, at `remaining == 0`.
#[derive(Debug, Clone)]
pub struct Countdown {
    total_seconds: u32,
    remaining_seconds: u32,
    state: TimerState,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self {
            total_seconds: 0,
            remaining_seconds: 0,
            state: TimerState::Idle,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    /// Starts a new countdown. Calling `start` while running is interpreted
    /// as "pause", and while paused as "resume" -- the presenter UI exposes
    /// a single toggle button, so the overload is intentional.
    pub fn start(&mut self, total_seconds: u32) -> Result<TimerBroadcast, TimerError> {
        match self.state {
            TimerState::Running => self.pause().ok_or(TimerError::InvalidTransition),
            TimerState::Paused => self.resume().ok_or(TimerError::InvalidTransition),
            TimerState::Idle | TimerState::Finished => {
                if total_seconds == 0 {
                    return Err(TimerError::InvalidDuration);
                }
                self.total_seconds = total_seconds;
                self.remaining_seconds = total_seconds;
                self.state = TimerState::Running;
                Ok(self.broadcast(TimerAction::Start))
            }
        }
    }

    /// Only valid while running.
    pub fn pause(&mut self) -> Option<TimerBroadcast> {
        if self.state != TimerState::Running {
            return None;
        }
        self.state = TimerState::Paused;
        Some(self.broadcast(TimerAction::Pause))
    }

    /// Only valid while paused; resumes without resetting the remaining time.
    pub fn resume(&mut self) -> Option<TimerBroadcast> {
        if self.state != TimerState::Paused {
            return None;
        }
        self.state = TimerState::Running;
        Some(self.broadcast(TimerAction::Resume))
    }

    /// Valid from any state: zeroes everything and returns to idle.
    pub fn reset(&mut self) -> TimerBroadcast {
        self.total_seconds = 0;
        self.remaining_seconds = 0;
        self.state = TimerState::Idle;
        self.broadcast(TimerAction::Reset)
    }

    /// Advances the countdown by one second. Returns the broadcast to emit,
    /// if any: `finished` exactly once at zero, `update` on every 5-second
    /// boundary, nothing otherwise. A no-op unless running.
    pub fn tick(&mut self) -> Option<TimerBroadcast> {
        if self.state != TimerState::Running {
            return None;
        }

        self.remaining_seconds -= 1;

        if self.remaining_seconds == 0 {
            self.state = TimerState::Finished;
            return Some(self.broadcast(TimerAction::Finished));
        }

        if self.remaining_seconds % TIMER_BROADCAST_STEP == 0 {
            return Some(self.broadcast(TimerAction::Update));
        }

        None
    }

    /// Current state as an `update` broadcast, for answering sync requests
    /// from late joiners. None while idle.
    pub fn snapshot(&self) -> Option<TimerBroadcast> {
        match self.state {
            TimerState::Idle => None,
            _ => Some(self.broadcast(TimerAction::Update)),
        }
    }

    fn broadcast(&self, action: TimerAction) -> TimerBroadcast {
        TimerBroadcast {
            action,
            seconds: self.remaining_seconds,
            total_seconds: self.total_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_rejects_zero_duration() {
        let mut timer = Countdown::new();
        assert_eq!(timer.start(0), Err(TimerError::InvalidDuration));
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn run_to_completion_emits_finished_exactly_once() {
        let mut timer = Countdown::new();
        let started = timer.start(12).unwrap();
        assert_eq!(started.action, TimerAction::Start);
        assert_eq!(started.total_seconds, 12);

        let mut finished = 0;
        for _ in 0..12 {
            if let Some(b) = timer.tick() {
                if b.action == TimerAction::Finished {
                    finished += 1;
                }
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(timer.remaining_seconds(), 0);
        assert_eq!(timer.state(), TimerState::Finished);

        // Further ticks are silent.
        assert!(timer.tick().is_none());
    }

    #[test]
    fn update_fires_on_five_second_boundaries() {
        let mut timer = Countdown::new();
        timer.start(11).unwrap();

        let mut updates = Vec::new();
        for _ in 0..10 {
            if let Some(b) = timer.tick() {
                if b.action == TimerAction::Update {
                    updates.push(b.seconds);
                }
            }
        }
        assert_eq!(updates, vec![10, 5]);
    }

    #[test]
    fn pause_then_resume_preserves_remaining_exactly() {
        let mut timer = Countdown::new();
        timer.start(60).unwrap();
        for _ in 0..13 {
            timer.tick();
        }
        let before = timer.remaining_seconds();

        let paused = timer.pause().unwrap();
        assert_eq!(paused.action, TimerAction::Pause);
        assert_eq!(paused.seconds, before);

        // Ticks while paused change nothing.
        assert!(timer.tick().is_none());
        assert_eq!(timer.remaining_seconds(), before);

        let resumed = timer.resume().unwrap();
        assert_eq!(resumed.action, TimerAction::Resume);
        assert_eq!(timer.remaining_seconds(), before);
    }

    #[test]
    fn pause_is_invalid_from_idle() {
        let mut timer = Countdown::new();
        assert!(timer.pause().is_none());
        assert!(timer.resume().is_none());
    }

    #[test]
    fn start_while_running_toggles_to_pause() {
        let mut timer = Countdown::new();
        timer.start(30).unwrap();
        let toggled = timer.start(30).unwrap();
        assert_eq!(toggled.action, TimerAction::Pause);
        assert_eq!(timer.state(), TimerState::Paused);

        let toggled_again = timer.start(30).unwrap();
        assert_eq!(toggled_again.action, TimerAction::Resume);
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[test]
    fn reset_zeroes_from_any_state() {
        let mut timer = Countdown::new();
        timer.start(30).unwrap();
        timer.tick();
        let reset = timer.reset();
        assert_eq!(reset.action, TimerAction::Reset);
        assert_eq!(reset.seconds, 0);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.total_seconds(), 0);
    }

    #[test]
    fn restart_after_finish_is_a_fresh_run() {
        let mut timer = Countdown::new();
        timer.start(1).unwrap();
        assert_eq!(timer.tick().unwrap().action, TimerAction::Finished);

        let restarted = timer.start(5).unwrap();
        assert_eq!(restarted.action, TimerAction::Start);
        assert_eq!(timer.remaining_seconds(), 5);
    }
}
