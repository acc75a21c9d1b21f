use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;

use nlsub_client_core::summary::RunSummary;
use nlsub_client_engine::{ControllerHandle, RunEvent};

use crate::format::{format_local_time, format_task_line};
use crate::shutdown::{ShutdownController, ShutdownEvent, spawn_ctrl_c_handler};
use crate::ui::Output;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Finished {
        summary: RunSummary,
        stop_requested: bool,
        finished_at: i64,
    },
    /// Local state was reset while following.
    Reset,
    /// Second interrupt; the run may still be going on the service.
    Interrupted,
    ControllerGone,
}

/// Follow `events` until the run ends, rendering every settled task and summary.
///
/// The first CTRL+C asks the service to cancel and keeps following until a poll confirms
/// the run is over; the second one returns immediately.
pub async fn follow_run(
    handle: &ControllerHandle,
    mut events: broadcast::Receiver<RunEvent>,
    out: &Output,
) -> SessionEnd {
    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_ctrl_c_handler(shutdown, shutdown_tx);
    let mut interrupts_open = true;

    if let Some(started) = handle.snapshot().started_at {
        out.line(&format!("Following run started {}", format_local_time(started)));
    }

    loop {
        tokio::select! {
            ev = shutdown_rx.recv(), if interrupts_open => {
                match ev {
                    Some(ShutdownEvent::StopRun) => {
                        out.stop_message(
                            "Stop requested; waiting for the service to wind down (press CTRL+C again to exit immediately).",
                        );
                        if let Err(err) = handle.stop().await {
                            out.notice(&format!("stop failed: {err}"));
                        }
                    }
                    Some(ShutdownEvent::Immediate) => {
                        out.stop_message("Stop requested again; exiting immediately.");
                        return SessionEnd::Interrupted;
                    }
                    None => interrupts_open = false,
                }
            }
            evt = events.recv() => {
                let evt = match evt {
                    Ok(v) => v,
                    Err(RecvError::Lagged(n)) => {
                        log::debug!("event stream lagged by {n}");
                        if let Some(end) = settled_from_snapshot(handle) {
                            return end;
                        }
                        continue;
                    }
                    Err(RecvError::Closed) => return SessionEnd::ControllerGone,
                };

                match evt {
                    RunEvent::Started { generation, total_tasks } => {
                        log::info!("run started (generation {generation}, {total_tasks} tasks)");
                    }
                    RunEvent::Attached { generation } => {
                        log::info!("attached to running job (generation {generation})");
                    }
                    RunEvent::StopRequested => log::info!("cancellation sent"),
                    RunEvent::TaskSettled { task } => out.line(&format_task_line(&task)),
                    RunEvent::Progress { summary } => out.summary(&summary),
                    RunEvent::PollFailed { message } => out.notice(&format!("poll failed: {message}")),
                    RunEvent::RunFinished { summary, stop_requested, finished_at } => {
                        return SessionEnd::Finished { summary, stop_requested, finished_at };
                    }
                    RunEvent::Reset => return SessionEnd::Reset,
                    RunEvent::Shutdown => return SessionEnd::ControllerGone,
                }
            }
        }
    }
}

// A lagged receiver may have skipped the RunFinished event; the snapshot still has it.
fn settled_from_snapshot(handle: &ControllerHandle) -> Option<SessionEnd> {
    let snap = handle.snapshot();
    if snap.phase.is_active() || !snap.finished_notified {
        return None;
    }
    Some(SessionEnd::Finished {
        summary: snap.summary,
        stop_requested: snap.stop_requested,
        finished_at: chrono::Utc::now().timestamp(),
    })
}
