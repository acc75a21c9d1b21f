//! Public API types for the run controller.

use std::sync::Arc;
use std::time::Duration;

use nlsub_client_core::settings::Speed;
use nlsub_client_core::summary::RunSummary;
use nlsub_client_core::task::TaskRecord;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::backend::JobService;
use crate::error::{ControlError, StartError};

/// Configuration for the run controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Job service base URL (e.g. `http://127.0.0.1:8000`).
    pub backend_url: Url,

    /// Interval between poll ticks while a run is active.
    pub poll_interval: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl ControllerConfig {
    /// Default poll cadence.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Default per-request timeout.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Config with default timings for `backend_url`.
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub(crate) fn normalized(mut self) -> Self {
        if self.poll_interval == Duration::ZERO {
            self.poll_interval = Self::DEFAULT_POLL_INTERVAL;
        }
        if self.request_timeout == Duration::ZERO {
            self.request_timeout = Self::DEFAULT_REQUEST_TIMEOUT;
        }
        self
    }
}

/// Input of [`ControllerHandle::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    /// Addresses to subscribe. Duplicates are collapsed; each must contain `@`.
    pub emails: Vec<String>,
    /// Target newsletter URLs. Duplicates are collapsed.
    pub urls: Vec<String>,
    /// Optional pace hint forwarded to the service.
    pub speed: Option<Speed>,
}

/// Result of a successful [`ControllerHandle::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAccepted {
    /// Number of (email, url) tasks scheduled.
    pub total_tasks: usize,
    /// Generation id assigned to the run's poller.
    pub generation: u64,
}

/// Lifecycle phase of the local run view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// No run is active.
    Idle,
    /// A start request is in flight.
    Starting,
    /// A run is active and being polled.
    Active,
    /// Cancellation was requested; waiting for the service to confirm.
    Stopping,
}

impl RunPhase {
    /// `true` for every phase in which a run is considered active locally.
    pub fn is_active(self) -> bool {
        matches!(self, RunPhase::Active | RunPhase::Stopping)
    }
}

/// Controller event stream payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// A run was started by this controller.
    Started {
        /// Generation id of the run.
        generation: u64,
        /// Number of tasks scheduled.
        total_tasks: usize,
    },
    /// The controller adopted a run that was already active on the service.
    Attached {
        /// Generation id of the adopted run.
        generation: u64,
    },
    /// Cancellation was sent to the service.
    StopRequested,
    /// A fresh snapshot was applied.
    Progress {
        /// Summary of the applied snapshot.
        summary: RunSummary,
    },
    /// A task reached a terminal status for the first time in this run.
    TaskSettled {
        /// The settled task.
        task: TaskRecord,
    },
    /// The run ended. Emitted at most once per run.
    RunFinished {
        /// Final summary.
        summary: RunSummary,
        /// Whether cancellation had been requested before the run ended.
        stop_requested: bool,
        /// Unix timestamp (seconds) of the observation.
        finished_at: i64,
    },
    /// A poll tick failed; polling continues.
    PollFailed {
        /// Error message.
        message: String,
    },
    /// State was reset.
    Reset,
    /// The controller task exited.
    Shutdown,
}

/// Read-only view of the controller state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSnapshot {
    /// Current phase.
    pub phase: RunPhase,
    /// Generation of the current (or last) run.
    pub generation: u64,
    /// Latest applied task list.
    pub tasks: Vec<TaskRecord>,
    /// Summary of `tasks`.
    pub summary: RunSummary,
    /// Whether the terminal notification has fired for the current run.
    pub finished_notified: bool,
    /// Whether cancellation was requested for the current run.
    pub stop_requested: bool,
    /// Unix timestamp (seconds) when the current run was started or attached.
    pub started_at: Option<i64>,
}

impl RunSnapshot {
    pub(crate) fn initial() -> Self {
        Self {
            phase: RunPhase::Idle,
            generation: 0,
            tasks: Vec::new(),
            summary: RunSummary::default(),
            finished_notified: false,
            stop_requested: false,
            started_at: None,
        }
    }
}

pub(crate) enum ControllerCommand {
    Start {
        request: StartRequest,
        reply: oneshot::Sender<Result<StartAccepted, StartError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Attach {
        reply: oneshot::Sender<Result<bool, ControlError>>,
    },
    Shutdown,
}

/// Handle to a running controller task.
pub struct ControllerHandle {
    pub(crate) cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    pub(crate) event_tx: broadcast::Sender<RunEvent>,
    pub(crate) snapshot_rx: watch::Receiver<RunSnapshot>,
    pub(crate) join: tokio::task::JoinHandle<()>,
}

/// Start a controller talking HTTP to `config.backend_url`.
pub fn start_controller(config: ControllerConfig) -> anyhow::Result<ControllerHandle> {
    crate::controller::start_controller(config)
}

/// Start a controller over an arbitrary [`JobService`].
pub fn start_controller_with(
    service: Arc<dyn JobService>,
    config: ControllerConfig,
) -> ControllerHandle {
    crate::controller::spawn_controller(service, config)
}

impl ControllerHandle {
    /// Subscribe to the controller event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.event_tx.subscribe()
    }

    /// Latest controller snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel carrying every snapshot the controller publishes.
    pub fn watch(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Validate inputs, ask the service to begin a run, and start polling.
    pub async fn start(&self, request: StartRequest) -> Result<StartAccepted, StartError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ControllerCommand::Start { request, reply })
            .map_err(|_| StartError::Shutdown)?;
        rx.await.unwrap_or(Err(StartError::Shutdown))
    }

    /// Request cancellation. No-op when idle or already stopping; the run is only
    /// considered over once a poll confirms it.
    pub async fn stop(&self) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ControllerCommand::Stop { reply })
            .map_err(|_| ControlError::Shutdown)?;
        rx.await.unwrap_or(Err(ControlError::Shutdown))
    }

    /// Return to the initial state unconditionally and ask the service to reset.
    pub async fn reset(&self) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ControllerCommand::Reset { reply })
            .map_err(|_| ControlError::Shutdown)?;
        rx.await.unwrap_or(Err(ControlError::Shutdown))
    }

    /// Adopt a run already active on the service. Returns whether a run is being tracked.
    pub async fn attach(&self) -> Result<bool, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ControllerCommand::Attach { reply })
            .map_err(|_| ControlError::Shutdown)?;
        rx.await.unwrap_or(Err(ControlError::Shutdown))
    }

    /// Stop polling and wait for the controller task to exit.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.cmd_tx.send(ControllerCommand::Shutdown);
        self.join
            .await
            .map_err(|err| anyhow::anyhow!("controller task join error: {err}"))
    }
}
