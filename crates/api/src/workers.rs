//! Background polling of the saga queues.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use record_store::RecordStore;
use saga::{DrainReport, ErrorKind, Result};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};

use crate::AppState;

/// The running queue consumers. Dropping the handle stops them.
pub struct Workers {
    tasks: JoinSet<()>,
}

impl Workers {
    /// Starts one ticker per queue: staging, payment status and inventory
    /// adjustments.
    pub fn spawn<S: RecordStore + Clone + 'static>(
        state: Arc<AppState<S>>,
        every: Duration,
    ) -> Self {
        let mut tasks = JoinSet::new();

        let staging = state.clone();
        tasks.spawn(run("staging", every, move || {
            let state = staging.clone();
            async move { state.saga.staging.drain_staged().await }
        }));

        let payments = state.clone();
        tasks.spawn(run("payment-status", every, move || {
            let state = payments.clone();
            async move { state.saga.payment_status.process_payment_statuses().await }
        }));

        tasks.spawn(run("inventory-update", every, move || {
            let state = state.clone();
            async move { state.saga.adjustments.apply_pending().await }
        }));

        tracing::info!(?every, "queue workers started");
        Self { tasks }
    }

    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;
        tracing::info!("queue workers stopped");
    }
}

async fn run<F, Fut>(worker: &'static str, every: Duration, mut poll: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<DrainReport>>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match poll().await {
            Ok(report) if report.is_idle() => {}
            Ok(report) => tracing::debug!(worker, ?report, "batch processed"),
            Err(err) => match err.kind() {
                ErrorKind::Transient => {
                    tracing::warn!(worker, error = %err, "poll failed, retrying next tick");
                }
                ErrorKind::DataIntegrity | ErrorKind::Inconsistency => {
                    tracing::error!(worker, error = %err, "poll needs operator attention");
                }
                ErrorKind::StockInsufficient
                | ErrorKind::NotFound
                | ErrorKind::InvalidState
                | ErrorKind::Internal => {
                    tracing::error!(worker, error = %err, "poll failed");
                }
            },
        }
    }
}
