//! Background one-second ticker for the question countdown.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Emits one tick per period until cancelled or dropped.
///
/// The driver only produces ticks; the owning screen applies them to its
/// session, so a cancelled driver can never touch quiz state.
#[derive(Debug)]
pub struct TimerDriver {
    handle: JoinHandle<()>,
}

impl TimerDriver {
    /// Start ticking every [`TICK_PERIOD`].
    #[must_use]
    pub fn spawn() -> (Self, mpsc::Receiver<()>) {
        Self::with_period(TICK_PERIOD)
    }

    #[must_use]
    pub fn with_period(period: Duration) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        (Self { handle }, rx)
    }

    /// Stop ticking; the receiver sees the channel close.
    pub fn cancel(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
