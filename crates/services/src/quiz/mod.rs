mod progress;
mod session;
mod timer;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::QuizError;
pub use progress::QuizProgress;
pub use session::{Advance, CompletedQuiz, QuizSession, TickOutcome};
pub use timer::{TICK_PERIOD, TimerDriver};
pub use workflow::{QuizLoopService, QuizStep, QuizTick};
