use std::mem;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::config::{Config, DEFAULT_MAX_AGE, DEFAULT_MAX_SIZE, DEFAULT_TAG_LEN};
use super::events::{emit, EventSink};
use super::payload::{IdSource, Payload, RandomIds};
use super::types::QueueError;
use super::worker::Worker;

/// Lifecycle of a [`BatchQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, background tasks not yet running.
    Idle,
    /// Accepting submissions, age monitor and intake active.
    Running,
    /// Intake stopped, waiting for in-flight dispatches.
    Draining,
    /// Terminal.
    Stopped,
}

/// Mutable queue state. Everything here is guarded by one mutex; the flush
/// check and buffer extraction must happen in a single critical section so two
/// concurrent appenders can never both observe a full buffer and each dispatch
/// overlapping batches.
struct Shared<T> {
    tag: String,
    max_size: usize,
    max_age: std::time::Duration,
    expires: Instant,
    pending: Vec<Payload<T>>,
    state: Lifecycle,
}

/// A payload batching queue.
///
/// Payloads accumulate in a pending buffer until either `max_size` is reached
/// or the buffer has been idle longer than `max_age`; the batch is then handed
/// to the configured [`Worker`] on its own task. Dispatch concurrency is
/// unbounded; [`close`](Self::close) waits for every in-flight dispatch.
///
/// Handles are cheap to clone and share the same queue.
pub struct BatchQueue<T> {
    config: Config,
    worker: Option<Arc<dyn Worker<T>>>,
    sink: Option<EventSink>,
    ids: Arc<dyn IdSource>,
    tx: mpsc::Sender<Payload<T>>,
    rx: Arc<Mutex<Option<mpsc::Receiver<Payload<T>>>>>,
    shared: Arc<Mutex<Shared<T>>>,
    dispatches: TaskTracker,
    quit: CancellationToken,
}

impl<T> Clone for BatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            worker: self.worker.clone(),
            sink: self.sink.clone(),
            ids: self.ids.clone(),
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            shared: self.shared.clone(),
            dispatches: self.dispatches.clone(),
            quit: self.quit.clone(),
        }
    }
}

impl<T> BatchQueue<T>
where
    T: Send + 'static,
{
    pub fn new(config: Config) -> Self {
        let (tx, rx) = mpsc::channel(config.max_size.max(DEFAULT_MAX_SIZE));
        let shared = Shared {
            tag: config.tag.clone(),
            max_size: config.max_size,
            max_age: config.max_age,
            expires: Instant::now(),
            pending: Vec::new(),
            state: Lifecycle::Idle,
        };

        Self {
            config,
            worker: None,
            sink: None,
            ids: Arc::new(RandomIds),
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
            shared: Arc::new(Mutex::new(shared)),
            dispatches: TaskTracker::new(),
            quit: CancellationToken::new(),
        }
    }

    /// Sets the batch processing function. Required before [`start`](Self::start).
    pub fn worker<W>(mut self, worker: W) -> Self
    where
        W: Worker<T> + 'static,
    {
        self.worker = Some(Arc::new(worker));
        self
    }

    /// Sets the optional diagnostic event sink.
    pub fn event_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Replaces the default UUID/random id source.
    pub fn id_source<G>(mut self, ids: G) -> Self
    where
        G: IdSource + 'static,
    {
        self.ids = Arc::new(ids);
        self
    }

    /// Opens the queue: validates configuration, applies defaults for unset
    /// fields, and launches the age monitor and submission intake tasks.
    ///
    /// Fails with [`QueueError::MissingWorker`] when no worker was supplied and
    /// with [`QueueError::AlreadyStarted`] when called more than once.
    pub async fn start(&self) -> Result<(), QueueError> {
        if self.worker.is_none() {
            return Err(QueueError::MissingWorker);
        }

        let tag = {
            let mut shared = self.shared.lock().await;
            if shared.state != Lifecycle::Idle {
                return Err(QueueError::AlreadyStarted);
            }

            // Tag first so the remaining default events carry it.
            if shared.tag.is_empty() {
                shared.tag = self.ids.tag(DEFAULT_TAG_LEN);
                let line = format!("Tag: random value assigned: {}", shared.tag);
                emit(&self.sink, &shared.tag, &line);
            }
            if shared.max_size == 0 {
                shared.max_size = DEFAULT_MAX_SIZE;
                emit(
                    &self.sink,
                    &shared.tag,
                    &format!("MaxSize: default value of {DEFAULT_MAX_SIZE} was used"),
                );
            }
            if shared.max_age.is_zero() {
                shared.max_age = DEFAULT_MAX_AGE;
                emit(
                    &self.sink,
                    &shared.tag,
                    &format!(
                        "MaxAge: default value of {}s was used",
                        DEFAULT_MAX_AGE.as_secs()
                    ),
                );
            }

            shared.expires = Instant::now() + shared.max_age;
            shared.state = Lifecycle::Running;
            shared.tag.clone()
        };

        tokio::spawn(self.clone().run_monitor());
        tokio::spawn(self.clone().run_intake());

        emit(&self.sink, &tag, "queue started");
        tracing::debug!(%tag, "batch queue started");
        Ok(())
    }

    /// Builds a [`Payload`] for `data`, stamping it with a fresh unique id.
    /// `None` yields a sentinel that only forces a flush-condition check.
    pub fn payload(&self, data: Option<T>) -> Payload<T> {
        match data {
            None => Payload::sentinel(),
            Some(data) => Payload::new(self.ids.payload_id(), data),
        }
    }

    /// Submits `data` through the intake channel. Never returns an error; a
    /// submission racing with shutdown is dropped.
    pub async fn submit(&self, data: T) {
        let payload = self.payload(Some(data));
        tokio::select! {
            sent = self.tx.send(payload) => {
                if sent.is_err() {
                    tracing::warn!("submission dropped: intake closed");
                }
            }
            _ = self.quit.cancelled() => {
                tracing::warn!("submission dropped: queue closed");
            }
        }
    }

    /// Appends a payload directly, bypassing the intake channel.
    ///
    /// Stores the payload (sentinels are never stored), evaluates the flush
    /// condition, and on trigger extracts the whole pending buffer and spawns
    /// its dispatch. Check and extraction share one critical section; the
    /// spawn also happens inside it so no dispatch can start after a drain has
    /// been observed complete. Payloads arriving while draining are dropped.
    pub async fn append(&self, payload: Payload<T>) {
        let mut shared = self.shared.lock().await;

        match shared.state {
            Lifecycle::Draining | Lifecycle::Stopped => {
                if !payload.is_sentinel() {
                    let line = format!("payload dropped while draining: {}", payload.id());
                    emit(&self.sink, &shared.tag, &line);
                }
                return;
            }
            Lifecycle::Idle | Lifecycle::Running => {}
        }

        if !payload.is_sentinel() {
            let line = format!("payload queued: {}", payload.id());
            emit(&self.sink, &shared.tag, &line);
            shared.pending.push(payload);
        }

        // Before start there is no worker to dispatch to; buffer only.
        if shared.state != Lifecycle::Running {
            return;
        }

        if shared.pending.len() >= shared.max_size || Instant::now() > shared.expires {
            shared.expires = Instant::now() + shared.max_age;
            let batch = mem::take(&mut shared.pending);
            let tag = shared.tag.clone();
            tracing::trace!(%tag, size = batch.len(), "flush triggered");
            self.spawn_dispatch(tag, batch);
        }
    }

    /// Point-in-time number of pending payloads, snapshotted under the lock.
    pub async fn size(&self) -> usize {
        self.shared.lock().await.pending.len()
    }

    /// Number of dispatch tasks that have started but not yet finished.
    pub fn active_dispatches(&self) -> usize {
        self.dispatches.len()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> Lifecycle {
        self.shared.lock().await.state
    }

    /// Effective diagnostic tag (random tags are assigned at start).
    pub async fn tag(&self) -> String {
        self.shared.lock().await.tag.clone()
    }

    /// Stops intake and the age monitor, then waits until every in-flight
    /// dispatch has finished. Pending payloads below the flush threshold are
    /// discarded, matching submit-side visibility: nothing new is accepted
    /// once draining begins.
    pub async fn close(&self) {
        let tag = {
            let mut shared = self.shared.lock().await;
            if shared.state == Lifecycle::Stopped {
                return;
            }
            shared.state = Lifecycle::Draining;
            shared.tag.clone()
        };

        emit(&self.sink, &tag, "queue stopping");
        tracing::debug!(%tag, "draining batch queue");

        self.quit.cancel();
        self.dispatches.close();
        self.dispatches.wait().await;

        self.shared.lock().await.state = Lifecycle::Stopped;
        emit(&self.sink, &tag, "queue drained: all dispatches completed");
        tracing::debug!(%tag, "batch queue stopped");
    }

    /// Spawns the dispatch task for one extracted batch. Called with the state
    /// lock held; spawning never blocks.
    fn spawn_dispatch(&self, tag: String, batch: Vec<Payload<T>>) {
        let worker = match &self.worker {
            Some(worker) => Arc::clone(worker),
            None => return,
        };
        let sink = self.sink.clone();

        self.dispatches.spawn(async move {
            let line = format!(
                "batch dispatch: running, size {} @ {}",
                batch.len(),
                Utc::now().to_rfc3339()
            );
            emit(&sink, &tag, &line);

            let items: Vec<T> = batch.into_iter().filter_map(Payload::into_data).collect();
            let status = worker.process(items).await;

            let line = format!(
                "batch dispatch: finished, status {} @ {}",
                status,
                Utc::now().to_rfc3339()
            );
            emit(&sink, &tag, &line);
        });
    }

    /// Age monitor: wakes every `monitor_interval` and forces a flush-condition
    /// check through a sentinel when the buffer has gone stale. Exits on the
    /// termination signal.
    async fn run_monitor(self) {
        let mut ticker = interval(self.config.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.quit.cancelled() => break,
                _ = ticker.tick() => {
                    let stale = {
                        let shared = self.shared.lock().await;
                        shared.state == Lifecycle::Running && Instant::now() > shared.expires
                    };
                    if stale {
                        self.append(Payload::sentinel()).await;
                    }
                }
            }
        }
        tracing::debug!("age monitor stopped");
    }

    /// Submission intake: forwards payloads from the ingress channel to
    /// [`append`](Self::append) until the termination signal fires.
    async fn run_intake(self) {
        let mut rx = match self.rx.lock().await.take() {
            Some(rx) => rx,
            None => return,
        };

        loop {
            tokio::select! {
                _ = self.quit.cancelled() => break,
                received = rx.recv() => {
                    match received {
                        Some(payload) => self.append(payload).await,
                        None => break,
                    }
                }
            }
        }
        tracing::debug!("submission intake stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::time::sleep;

    use crate::queue::ConfigBuilder;

    fn capture_events() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
        let lines: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        (lines, move |line: &str| {
            captured.lock().unwrap().push(line.to_string())
        })
    }

    #[tokio::test]
    async fn test_start_without_worker_fails() {
        let queue: BatchQueue<i32> = BatchQueue::new(ConfigBuilder::default().build().unwrap());
        assert_eq!(queue.start().await, Err(QueueError::MissingWorker));
        assert_eq!(queue.state().await, Lifecycle::Idle);
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let queue: BatchQueue<i32> = BatchQueue::new(ConfigBuilder::default().build().unwrap())
            .worker(|_items: Vec<i32>| async move { 0 });

        queue.start().await.unwrap();
        assert_eq!(queue.start().await, Err(QueueError::AlreadyStarted));
        queue.close().await;
    }

    #[tokio::test]
    async fn test_start_applies_defaults_and_emits_one_event_each() {
        let (lines, sink) = capture_events();
        let queue: BatchQueue<i32> = BatchQueue::new(ConfigBuilder::default().build().unwrap())
            .worker(|_items: Vec<i32>| async move { 0 })
            .event_sink(sink);

        queue.start().await.unwrap();

        let tag = queue.tag().await;
        assert_eq!(tag.len(), 12);

        let lines = lines.lock().unwrap().clone();
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.contains("Tag: random value assigned"))
                .count(),
            1
        );
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.contains("MaxSize: default value of 100"))
                .count(),
            1
        );
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.contains("MaxAge: default value of 10s"))
                .count(),
            1
        );
        // Every line carries the resolved tag.
        assert!(lines.iter().all(|l| l.starts_with(&format!("[{tag}]"))));

        queue.close().await;
    }

    #[tokio::test]
    async fn test_explicit_config_emits_no_default_events() {
        let (lines, sink) = capture_events();
        let config = ConfigBuilder::default()
            .tag("jobs")
            .max_size(5usize)
            .max_age(Duration::from_secs(30))
            .build()
            .unwrap();
        let queue: BatchQueue<i32> = BatchQueue::new(config)
            .worker(|_items: Vec<i32>| async move { 0 })
            .event_sink(sink);

        queue.start().await.unwrap();
        assert_eq!(queue.tag().await, "jobs");

        let lines = lines.lock().unwrap().clone();
        assert!(lines.iter().all(|l| !l.contains("default value")));
        assert!(lines.iter().any(|l| l == "[jobs] queue started"));

        queue.close().await;
    }

    #[tokio::test]
    async fn test_payload_construction() {
        let queue: BatchQueue<String> =
            BatchQueue::new(ConfigBuilder::default().build().unwrap());

        let sentinel = queue.payload(None);
        assert!(sentinel.is_sentinel());

        let a = queue.payload(Some("a".to_string()));
        let b = queue.payload(Some("b".to_string()));
        assert!(!a.is_sentinel());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_append_after_close_is_rejected() {
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);

        let config = ConfigBuilder::default()
            .max_size(1usize)
            .max_age(Duration::from_secs(60))
            .build()
            .unwrap();
        let queue: BatchQueue<i32> = BatchQueue::new(config).worker(move |items: Vec<i32>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(items.len(), Ordering::SeqCst);
                0
            }
        });

        queue.start().await.unwrap();
        queue.close().await;
        assert_eq!(queue.state().await, Lifecycle::Stopped);

        let payload = queue.payload(Some(1));
        queue.append(payload).await;
        sleep(Duration::from_millis(50)).await;

        assert_eq!(queue.size().await, 0);
        assert_eq!(processed.load(Ordering::SeqCst), 0);
        assert_eq!(queue.active_dispatches(), 0);
    }

    #[tokio::test]
    async fn test_append_before_start_buffers_without_dispatch() {
        let queue: BatchQueue<i32> = BatchQueue::new(
            ConfigBuilder::default().max_size(1usize).build().unwrap(),
        );

        let payload = queue.payload(Some(7));
        queue.append(payload).await;

        assert_eq!(queue.size().await, 1);
        assert_eq!(queue.active_dispatches(), 0);
    }
}
