use std::sync::Arc;

use storage::repository::AttemptHistoryRepository;
use study_core::model::AttemptRecord;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receives the history entry of every completed attempt.
///
/// Called synchronously from the controller, so implementations must not block.
pub trait CompletionSink: Send + Sync {
    fn record(&self, record: &AttemptRecord);
}

/// Forwards completed attempts to the history repository on a background task.
///
/// Append failures are logged and dropped; they never reach the controller.
/// The writer task ends once every clone of the recorder is dropped and the
/// queue is drained, yielding the number of entries written.
pub struct HistoryRecorder {
    queue: mpsc::UnboundedSender<AttemptRecord>,
}

impl HistoryRecorder {
    #[must_use]
    pub fn spawn(
        history: Arc<dyn AttemptHistoryRepository>,
        runtime: &Handle,
    ) -> (Arc<Self>, JoinHandle<usize>) {
        let (queue, mut rx) = mpsc::unbounded_channel::<AttemptRecord>();
        let writer = runtime.spawn(async move {
            let mut written = 0;
            while let Some(record) = rx.recv().await {
                match history.append_attempt(&record).await {
                    Ok(id) => {
                        written += 1;
                        tracing::debug!(id, quiz_id = %record.quiz_id, score = record.score, "attempt recorded");
                    }
                    Err(err) => {
                        tracing::warn!(quiz_id = %record.quiz_id, error = %err, "failed to record attempt");
                    }
                }
            }
            written
        });
        (Arc::new(Self { queue }), writer)
    }
}

impl CompletionSink for HistoryRecorder {
    fn record(&self, record: &AttemptRecord) {
        if self.queue.send(record.clone()).is_err() {
            tracing::warn!(quiz_id = %record.quiz_id, "history writer stopped, attempt not recorded");
        }
    }
}
