use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::types::WatchEvent;

/// Options handed to the location provider for one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl WatchOptions {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        WatchOptions {
            timeout: Duration::from_millis(timeout_ms),
            ..WatchOptions::default()
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            high_accuracy: true,
            timeout: Duration::from_millis(crate::settings::DEFAULT_GEO_TIMEOUT_MS),
            maximum_age: Duration::ZERO,
        }
    }
}

/// A source of position fixes. Implementations spawn a task that delivers
/// `WatchEvent`s serially over the channel until aborted; provider errors
/// are classified into `GeoErrorKind` before they cross this boundary.
pub trait LocationSource: Send + Sync {
    fn spawn_watch(&self, opts: WatchOptions, tx: Sender<WatchEvent>) -> JoinHandle<()>;
}

/// Handle for one live subscription.
pub struct SessionHandle {
    task: JoinHandle<()>,
    generation: u64,
}

impl SessionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Lifecycle wrapper around a location subscription.
///
/// At most one subscription is live at a time: `start` and `restart` abort
/// and await the previous task before spawning the next one, so two
/// callback streams can never interleave fixes into the same estimator.
pub struct PositionWatchSession {
    source: Box<dyn LocationSource>,
    tx: Sender<WatchEvent>,
    current: Option<SessionHandle>,
    generation: u64,
}

impl PositionWatchSession {
    pub fn new(source: Box<dyn LocationSource>, tx: Sender<WatchEvent>) -> Self {
        PositionWatchSession {
            source,
            tx,
            current: None,
            generation: 0,
        }
    }

    /// Start a subscription, stopping any previous one first.
    /// Returns the new subscription's generation counter.
    pub async fn start(&mut self, opts: WatchOptions) -> u64 {
        self.stop().await;
        self.generation += 1;
        let task = self.source.spawn_watch(opts, self.tx.clone());
        self.current = Some(SessionHandle {
            task,
            generation: self.generation,
        });
        self.generation
    }

    /// Abort the live subscription and wait for its task to finish.
    /// Idempotent; a no-op when nothing is running.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.task.abort();
            let _ = handle.task.await;
        }
    }

    /// Stop-then-start with new options (settings changed the timeout).
    pub async fn restart(&mut self, opts: WatchOptions) -> u64 {
        self.start(opts).await
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map(|h| !h.task.is_finished())
            .unwrap_or(false)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
