//! ==============================================================================
//! scheduler.rs - polling loop
//! ==============================================================================
//!
//! purpose:
//! ```text
//!     IDLE --start()--> POLLING --stop()--> IDLE
//!
//!     start() runs one initial aggregation right away, then arms an interval
//!     and runs a silent aggregation on every tick until stop().
//!
//!     cycles are serialized: the loop awaits a cycle before waiting for the
//!     next tick, and missed ticks are skipped, so a cycle slower than the
//!     interval never overlaps the next one and never causes a catch-up burst.
//!
//!     stop() only cancels future cycles. a cycle already in flight runs to
//!     completion and its snapshot is dropped instead of published.
//! ```
//!
//! relationships:
//! ```text
//!     - uses: aggregator.rs (begin / aggregate / publish)
//!     - used by: main.rs
//! ```
//!
//! ==============================================================================

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::aggregator::{log_cycle, AggregationMode, Aggregator};

/// how long shutdown() waits for an in-flight cycle before abandoning it
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(aggregator: Arc<Aggregator>, period: Duration) -> Self {
        Self { aggregator, period, running: Mutex::new(None) }
    }

    pub fn state(&self) -> SchedulerState {
        match *self.running.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(_) => SchedulerState::Polling,
            None => SchedulerState::Idle,
        }
    }

    /// IDLE -> POLLING. false if already polling.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_polling(
            self.aggregator.clone(),
            self.period,
            cancel.clone(),
        ));
        tracing::info!(interval_seconds = self.period.as_secs(), "polling started");

        *running = Some(Running { cancel, handle });
        true
    }

    /// POLLING -> IDLE. false if already idle. does not wait for an
    /// in-flight cycle.
    pub fn stop(&self) -> bool {
        match self.take_running() {
            Some(running) => {
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// stop and wait up to SHUTDOWN_GRACE for the polling task to exit.
    /// a cycle still running after that is aborted; its snapshot would be
    /// discarded anyway.
    pub async fn shutdown(&self) {
        if let Some(running) = self.take_running() {
            running.cancel.cancel();
            let abort = running.handle.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, running.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("polling task failed: {e}"),
                Err(_) => {
                    tracing::warn!(
                        grace_seconds = SHUTDOWN_GRACE.as_secs(),
                        "in-flight cycle did not finish, abandoning it"
                    );
                    abort.abort();
                }
            }
        }
    }

    fn take_running(&self) -> Option<Running> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

async fn run_polling(aggregator: Arc<Aggregator>, period: Duration, cancel: CancellationToken) {
    run_cycle(&aggregator, AggregationMode::Initial, &cancel).await;

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("polling stopped");
                break;
            }
            _ = ticker.tick() => {
                run_cycle(&aggregator, AggregationMode::Silent, &cancel).await;
            }
        }
    }
}

async fn run_cycle(aggregator: &Aggregator, mode: AggregationMode, cancel: &CancellationToken) {
    aggregator.begin(mode);
    let snapshot = aggregator.aggregate().await;

    if cancel.is_cancelled() {
        tracing::debug!(?mode, "discarding cycle that finished after stop");
        return;
    }

    let published = aggregator.publish(snapshot);
    log_cycle(&published, mode);
}
