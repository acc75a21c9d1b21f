use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::backend::{JobService, PolledSnapshot};
use crate::error::ServiceError;

/// Result of one tick, stamped so the controller can pair and order it.
#[derive(Debug)]
pub(crate) struct PollMessage {
    pub(crate) generation: u64,
    pub(crate) seq: u64,
    pub(crate) result: Result<PolledSnapshot, ServiceError>,
}

/// Fixed-interval status poller for one run generation.
///
/// Ticks are not pipelined behind each other: every timer firing spawns its own read, so a
/// slow response never delays the next tick. Dropping or stopping the poller aborts the
/// timer and every in-flight read.
pub(crate) struct Poller {
    generation: u64,
    task: tokio::task::JoinHandle<()>,
}

impl Poller {
    pub(crate) fn start(
        service: Arc<dyn JobService>,
        generation: u64,
        interval: Duration,
        tx: mpsc::UnboundedSender<PollMessage>,
    ) -> Self {
        log::debug!("poller gen={generation}: starting, interval={interval:?}");
        let task = tokio::spawn(run_poller(service, generation, interval, tx));
        Self { generation, task }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn stop(self) {
        log::debug!("poller gen={}: stopped", self.generation);
        drop(self);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_poller(
    service: Arc<dyn JobService>,
    generation: u64,
    interval: Duration,
    tx: mpsc::UnboundedSender<PollMessage>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Owned by this task, so aborting the task aborts every outstanding read with it.
    let mut inflight: JoinSet<()> = JoinSet::new();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tx.is_closed() {
                    return;
                }
                seq += 1;
                let service = service.clone();
                let tx = tx.clone();
                let tick_seq = seq;
                inflight.spawn(async move {
                    let result = service.poll_snapshot().await;
                    let _ = tx.send(PollMessage {
                        generation,
                        seq: tick_seq,
                        result,
                    });
                });
            }
            Some(res) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(err) = res {
                    if err.is_panic() {
                        log::error!("poller gen={generation}: tick task panicked: {err}");
                    }
                }
            }
        }
    }
}
