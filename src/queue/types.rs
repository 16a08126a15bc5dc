use thiserror::Error;

/// Errors surfaced by [`BatchQueue::start`](super::BatchQueue::start).
///
/// Everything after a successful start is advisory: worker status codes are
/// recorded via the event sink but never turned into errors, and close cannot
/// fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// `start()` was called without a worker function.
    #[error("no worker function was supplied")]
    MissingWorker,

    /// `start()` was called on a queue that already left the idle state.
    #[error("queue was already started")]
    AlreadyStarted,
}
