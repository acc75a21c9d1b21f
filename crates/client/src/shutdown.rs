use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

#[derive(Debug)]
pub struct ShutdownController {
    interrupts: AtomicU8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownEvent {
    /// Ask the service to cancel and keep following until it confirms.
    StopRun,
    /// Leave without waiting for the service.
    Immediate,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            interrupts: AtomicU8::new(0),
        }
    }

    pub fn record_interrupt(&self) -> ShutdownEvent {
        let n = self.interrupts.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if n == 1 {
            ShutdownEvent::StopRun
        } else {
            ShutdownEvent::Immediate
        }
    }
}

pub fn spawn_ctrl_c_handler(
    shutdown: Arc<ShutdownController>,
    shutdown_tx: mpsc::UnboundedSender<ShutdownEvent>,
) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let ev = shutdown.record_interrupt();
            let _ = shutdown_tx.send(ev);
            if ev == ShutdownEvent::Immediate {
                return;
            }
        }
    });
}
