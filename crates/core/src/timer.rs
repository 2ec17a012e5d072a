//! Per-question countdown.
//!
//! `Idle → Running → {Answered, Expired}`. The timer is driven by one tick per
//! second; it never reads a clock itself, so every transition is
//! deterministic for a given tick sequence.

use crate::model::Difficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running { remaining_secs: u32 },
    Answered { remaining_secs: u32 },
    Expired,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still counting down.
    Running { remaining_secs: u32 },
    /// Budget hit zero on this tick.
    Expired,
    /// The timer was not running; nothing changed.
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionTimer {
    state: TimerState,
}

impl Default for QuestionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionTimer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }

    /// Enter `Running` with a fresh budget for the given difficulty.
    pub fn start(&mut self, difficulty: Difficulty) {
        self.state = TimerState::Running {
            remaining_secs: difficulty.time_limit_secs(),
        };
    }

    /// Count down one second.
    pub fn tick(&mut self) -> Tick {
        match self.state {
            TimerState::Running { remaining_secs } if remaining_secs <= 1 => {
                self.state = TimerState::Expired;
                Tick::Expired
            }
            TimerState::Running { remaining_secs } => {
                let remaining_secs = remaining_secs - 1;
                self.state = TimerState::Running { remaining_secs };
                Tick::Running { remaining_secs }
            }
            _ => Tick::Inactive,
        }
    }

    /// Stop the countdown because the learner answered in time.
    ///
    /// No effect unless running.
    pub fn mark_answered(&mut self) {
        if let TimerState::Running { remaining_secs } = self.state {
            self.state = TimerState::Answered { remaining_secs };
        }
    }

    /// Stop without any outcome (quiz exited or navigated away).
    pub fn cancel(&mut self) {
        self.state = TimerState::Idle;
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        match self.state {
            TimerState::Running { remaining_secs } | TimerState::Answered { remaining_secs } => {
                remaining_secs
            }
            TimerState::Idle | TimerState::Expired => 0,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easy_question_expires_after_twenty_ticks() {
        let mut timer = QuestionTimer::new();
        timer.start(Difficulty::Easy);
        assert_eq!(timer.remaining_secs(), 20);

        for expected in (1..20).rev() {
            assert_eq!(timer.tick(), Tick::Running { remaining_secs: expected });
        }
        assert_eq!(timer.tick(), Tick::Expired);
        assert_eq!(timer.state(), TimerState::Expired);
        assert_eq!(timer.tick(), Tick::Inactive);
    }

    #[test]
    fn answering_freezes_the_countdown() {
        let mut timer = QuestionTimer::new();
        timer.start(Difficulty::Medium);
        timer.tick();
        timer.mark_answered();
        assert_eq!(timer.state(), TimerState::Answered { remaining_secs: 59 });
        assert_eq!(timer.tick(), Tick::Inactive);
        assert_eq!(timer.remaining_secs(), 59);
    }

    #[test]
    fn restart_gives_a_fresh_budget() {
        let mut timer = QuestionTimer::new();
        timer.start(Difficulty::Easy);
        timer.tick();
        timer.start(Difficulty::Hard);
        assert_eq!(timer.remaining_secs(), 120);
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut timer = QuestionTimer::new();
        timer.start(Difficulty::Hard);
        timer.cancel();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.tick(), Tick::Inactive);
    }

    #[test]
    fn idle_timer_ignores_answers() {
        let mut timer = QuestionTimer::new();
        timer.mark_answered();
        assert_eq!(timer.state(), TimerState::Idle);
    }
}
