//! Periodic progress polling while a turn is in flight.

use crate::engine::{GameEngine, ProgressSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default spacing between progress queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest accepted spacing; smaller intervals are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Identifies an active polling run.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    session_id: String,
    token: CancellationToken,
}

impl PollerHandle {
    /// Session being polled.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// False once the run has been stopped.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Signals the run to end without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

struct ActivePoll {
    handle: PollerHandle,
    task: JoinHandle<()>,
}

/// Polls engine progress on a fixed schedule until stopped.
///
/// At most one run is active per poller, and a run has at most one query
/// outstanding: ticks that fire while a query is pending are skipped. Query
/// failures are logged and never end the run; only [`ProgressPoller::stop`]
/// does.
pub struct ProgressPoller {
    engine: Arc<dyn GameEngine>,
    interval: Duration,
    active: Mutex<Option<ActivePoll>>,
}

impl std::fmt::Debug for ProgressPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPoller")
            .field("interval", &self.interval)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl ProgressPoller {
    /// Creates an idle poller.
    ///
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(engine: Arc<dyn GameEngine>, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Poll interval too short; using minimum"
            );
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        Self {
            engine,
            interval,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActivePoll>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Query spacing.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True while a run is active.
    pub fn is_active(&self) -> bool {
        self.lock().as_ref().is_some_and(|a| a.handle.is_active())
    }

    /// Starts polling `session_id`, delivering snapshots to `sink`.
    ///
    /// The first query is issued one interval after the call. If a run is
    /// already active its handle is returned and nothing else happens.
    #[instrument(skip(self, sink))]
    pub fn start(
        &self,
        session_id: &str,
        sink: mpsc::UnboundedSender<ProgressSnapshot>,
    ) -> PollerHandle {
        let mut active = self.lock();
        if let Some(existing) = active.as_ref().filter(|a| a.handle.is_active()) {
            debug!(polling = %existing.handle.session_id, "Poller already active");
            return existing.handle.clone();
        }

        let handle = PollerHandle {
            session_id: session_id.to_string(),
            token: CancellationToken::new(),
        };
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.engine),
            handle.clone(),
            self.interval,
            sink,
        ));
        info!(interval_ms = self.interval.as_millis() as u64, "Progress polling started");

        *active = Some(ActivePoll {
            handle: handle.clone(),
            task,
        });
        handle
    }

    /// Stops the active run and waits for its loop to exit.
    ///
    /// Queries already on the wire are left to finish, but their results are
    /// dropped. Once this returns the sink receives nothing more from the run.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let active = self.lock().take();
        let Some(ActivePoll { handle, task }) = active else {
            return;
        };
        handle.token.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "Poll loop ended abnormally");
        }
        info!(session_id = %handle.session_id, "Progress polling stopped");
    }
}

async fn poll_loop(
    engine: Arc<dyn GameEngine>,
    handle: PollerHandle,
    period: Duration,
    sink: mpsc::UnboundedSender<ProgressSnapshot>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let mut pending = false;

    loop {
        tokio::select! {
            biased;
            _ = handle.token.cancelled() => break,
            _ = ticker.tick() => {
                if pending {
                    debug!("Previous progress query still pending; skipping tick");
                    continue;
                }
                pending = true;
                // Detached so stop() never aborts a request mid-flight.
                let engine = Arc::clone(&engine);
                let session_id = handle.session_id.clone();
                let results_tx = results_tx.clone();
                tokio::spawn(async move {
                    let result = engine.get_progress(&session_id).await;
                    let _ = results_tx.send(result);
                });
            }
            Some(result) = results_rx.recv() => {
                pending = false;
                match result {
                    Ok(snapshot) => {
                        debug!(
                            progress = snapshot.progress,
                            phase = ?snapshot.current_phase,
                            "Progress snapshot"
                        );
                        if sink.send(snapshot).is_err() {
                            debug!("Progress receiver dropped");
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %handle.session_id, error = %e, "Progress query failed");
                    }
                }
            }
        }
    }
}
