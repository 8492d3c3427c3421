//! Countdown timers that drive an attempt's time budget.
//!
//! A timer never touches the attempt. It only emits [`Tick`]s; whoever owns
//! the controller feeds them back through `QuizSessionController::tick`.
//! Each tick names the attempt it was started for, so ticks that were already
//! queued when a countdown got cancelled are recognised as stale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use study_core::model::AttemptId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Interval between countdown ticks.
pub const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// One elapsed countdown period for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub attempt: AttemptId,
}

/// Starts recurring countdowns.
pub trait CountdownTimer: Send {
    /// Begin emitting a tick for `attempt` every `period`.
    fn start(&self, attempt: AttemptId, period: Duration) -> Box<dyn CountdownHandle>;
}

/// Owner's handle on a running countdown.
pub trait CountdownHandle: Send {
    /// Stop emitting ticks. Calling it again is harmless.
    fn cancel(&mut self);

    fn is_cancelled(&self) -> bool;
}

//
// ─── TOKIO ─────────────────────────────────────────────────────────────────────
//

/// Countdown backed by a tokio interval task per attempt.
///
/// Ticks are delivered on the receiver returned by [`TokioCountdown::channel`].
#[derive(Clone)]
pub struct TokioCountdown {
    runtime: Handle,
    ticks: mpsc::UnboundedSender<Tick>,
}

impl TokioCountdown {
    #[must_use]
    pub fn channel(runtime: Handle) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        (Self { runtime, ticks }, rx)
    }
}

impl CountdownTimer for TokioCountdown {
    fn start(&self, attempt: AttemptId, period: Duration) -> Box<dyn CountdownHandle> {
        let ticks = self.ticks.clone();
        let start = tokio::time::Instant::now() + period;
        let task = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if ticks.send(Tick { attempt }).is_err() {
                    tracing::debug!(%attempt, "tick receiver dropped, stopping countdown");
                    break;
                }
            }
        });
        tracing::debug!(%attempt, ?period, "countdown started");
        Box::new(TokioCountdownHandle {
            attempt,
            task: Some(task),
        })
    }
}

struct TokioCountdownHandle {
    attempt: AttemptId,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle for TokioCountdownHandle {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(attempt = %self.attempt, "countdown cancelled");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for TokioCountdownHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

//
// ─── MANUAL ────────────────────────────────────────────────────────────────────
//

/// Countdown that never fires on its own.
///
/// Time is simulated by calling the controller's `tick` directly; this timer
/// only keeps a record of which countdowns were started and which are still
/// live.
#[derive(Clone, Default)]
pub struct ManualCountdown {
    started: Arc<Mutex<Vec<(AttemptId, Arc<AtomicBool>)>>>,
}

impl ManualCountdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts a countdown was started for, oldest first.
    #[must_use]
    pub fn started(&self) -> Vec<AttemptId> {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(attempt, _)| *attempt)
            .collect()
    }

    /// Attempts whose countdown has not been cancelled.
    #[must_use]
    pub fn running(&self) -> Vec<AttemptId> {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, cancelled)| !cancelled.load(Ordering::SeqCst))
            .map(|(attempt, _)| *attempt)
            .collect()
    }
}

impl CountdownTimer for ManualCountdown {
    fn start(&self, attempt: AttemptId, _period: Duration) -> Box<dyn CountdownHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((attempt, Arc::clone(&cancelled)));
        Box::new(ManualCountdownHandle { cancelled })
    }
}

struct ManualCountdownHandle {
    cancelled: Arc<AtomicBool>,
}

impl CountdownHandle for ManualCountdownHandle {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_countdown_ticks_once_per_period() {
        let (timer, mut ticks) = TokioCountdown::channel(Handle::current());
        let attempt = AttemptId::random();
        let _handle = timer.start(attempt, COUNTDOWN_PERIOD);

        for _ in 0..3 {
            let tick = ticks.recv().await.unwrap();
            assert_eq!(tick.attempt, attempt);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_period() {
        let (timer, mut ticks) = TokioCountdown::channel(Handle::current());
        let _handle = timer.start(AttemptId::random(), COUNTDOWN_PERIOD);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(ticks.try_recv().is_err());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(ticks.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_stops_ticking() {
        let (timer, mut ticks) = TokioCountdown::channel(Handle::current());
        let mut handle = timer.start(AttemptId::random(), COUNTDOWN_PERIOD);
        ticks.recv().await.unwrap();

        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(ticks.try_recv().is_err());
    }

    #[test]
    fn manual_countdown_tracks_cancellation() {
        let timer = ManualCountdown::new();
        let first = AttemptId::random();
        let second = AttemptId::random();
        let mut h1 = timer.start(first, COUNTDOWN_PERIOD);
        let _h2 = timer.start(second, COUNTDOWN_PERIOD);

        h1.cancel();
        assert_eq!(timer.started(), vec![first, second]);
        assert_eq!(timer.running(), vec![second]);
    }
}
