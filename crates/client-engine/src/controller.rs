use std::sync::Arc;

use chrono::Utc;
use nlsub_client_core::emails::{dedup_emails, looks_like_email};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::api::{
    ControllerCommand, ControllerConfig, ControllerHandle, RunEvent, RunPhase, RunSnapshot,
    StartAccepted, StartRequest,
};
use crate::backend::{HttpJobService, JobService};
use crate::error::{ControlError, StartError};
use crate::machine::{PolledTick, RunMachine, TickOutcome};
use crate::poller::{PollMessage, Poller};

/// Checked copy of a [`StartRequest`], ready to send.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ValidatedStart {
    pub(crate) emails: Vec<String>,
    pub(crate) urls: Vec<String>,
}

pub(crate) fn validate_start(request: &StartRequest) -> Result<ValidatedStart, StartError> {
    let emails = dedup_emails(&request.emails);
    if emails.is_empty() {
        return Err(StartError::Validation("at least one email is required".into()));
    }
    if let Some(bad) = emails.iter().find(|e| !looks_like_email(e)) {
        return Err(StartError::Validation(format!("not an email address: {bad:?}")));
    }

    let mut urls: Vec<String> = Vec::new();
    for url in &request.urls {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    if urls.is_empty() {
        return Err(StartError::Validation("at least one newsletter url is required".into()));
    }

    Ok(ValidatedStart { emails, urls })
}

struct ControllerRuntime {
    service: Arc<dyn JobService>,
    cfg: ControllerConfig,

    machine: RunMachine,
    poller: Option<Poller>,
    poll_tx: mpsc::UnboundedSender<PollMessage>,
    poll_rx: mpsc::UnboundedReceiver<PollMessage>,
    cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>,

    event_tx: broadcast::Sender<RunEvent>,
    snapshot_tx: watch::Sender<RunSnapshot>,
}

impl ControllerRuntime {
    fn push_snapshot(&self) {
        let _ = self.snapshot_tx.send(self.machine.snapshot());
    }

    fn emit(&self, event: RunEvent) {
        let _ = self.event_tx.send(event);
    }

    fn start_poller(&mut self, generation: u64) {
        self.stop_poller();
        self.poller = Some(Poller::start(
            self.service.clone(),
            generation,
            self.cfg.poll_interval,
            self.poll_tx.clone(),
        ));
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    async fn handle_start(&mut self, request: StartRequest) -> Result<StartAccepted, StartError> {
        let validated = validate_start(&request)?;
        self.machine.begin_start()?;
        self.push_snapshot();

        log::info!(
            "starting run: {} email(s) x {} url(s)",
            validated.emails.len(),
            validated.urls.len()
        );
        let ack = match self
            .service
            .start(&validated.emails, &validated.urls, request.speed)
            .await
        {
            Ok(ack) => ack,
            Err(err) => {
                log::warn!("start rejected: {err}");
                self.machine.abort_start();
                self.push_snapshot();
                return Err(err.into());
            }
        };

        let generation = self.machine.activate(Utc::now().timestamp());
        let total_tasks = ack
            .total
            .unwrap_or(validated.emails.len() * validated.urls.len());
        self.start_poller(generation);
        self.emit(RunEvent::Started {
            generation,
            total_tasks,
        });
        self.push_snapshot();
        Ok(StartAccepted {
            total_tasks,
            generation,
        })
    }

    async fn handle_stop(&mut self) -> Result<(), ControlError> {
        if !self.machine.wants_stop() {
            log::debug!("stop ignored in phase {:?}", self.machine.phase());
            return Ok(());
        }
        self.service.stop().await?;
        self.machine.stop_sent();
        log::info!("stop requested for gen={}", self.machine.generation());
        self.emit(RunEvent::StopRequested);
        self.push_snapshot();
        Ok(())
    }

    async fn handle_reset(&mut self) -> Result<(), ControlError> {
        self.stop_poller();
        self.machine.reset();
        log::info!("state reset (gen={})", self.machine.generation());
        self.emit(RunEvent::Reset);
        self.push_snapshot();
        self.service.reset().await?;
        Ok(())
    }

    async fn handle_attach(&mut self) -> Result<bool, ControlError> {
        if self.machine.phase() != RunPhase::Idle {
            return Ok(self.machine.phase().is_active());
        }
        let status = self.service.status().await?;
        if !status.is_running {
            return Ok(false);
        }
        let generation = self.machine.activate(Utc::now().timestamp());
        log::info!("attached to running job (gen={generation})");
        self.start_poller(generation);
        self.emit(RunEvent::Attached { generation });
        self.push_snapshot();
        Ok(true)
    }

    fn handle_poll(&mut self, msg: PollMessage) {
        let current = self.poller.as_ref().map(Poller::generation);
        if current != Some(msg.generation) {
            log::debug!(
                "discarding tick gen={} seq={} (poller gen={current:?})",
                msg.generation,
                msg.seq
            );
            return;
        }

        let snapshot = match msg.result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("poll tick {} failed: {err}", msg.seq);
                self.emit(RunEvent::PollFailed {
                    message: err.to_string(),
                });
                return;
            }
        };

        let outcome = self.machine.apply_tick(PolledTick {
            generation: msg.generation,
            seq: msg.seq,
            snapshot,
        });
        match outcome {
            TickOutcome::Stale => {
                log::debug!("stale tick gen={} seq={}", msg.generation, msg.seq);
            }
            TickOutcome::Ignored => {}
            TickOutcome::Progress { settled } => {
                for task in settled {
                    self.emit(RunEvent::TaskSettled { task });
                }
                self.emit(RunEvent::Progress {
                    summary: self.machine.summary(),
                });
                self.push_snapshot();
            }
            TickOutcome::Finished { settled, notify } => {
                self.stop_poller();
                for task in settled {
                    self.emit(RunEvent::TaskSettled { task });
                }
                let summary = self.machine.summary();
                self.emit(RunEvent::Progress { summary });
                if notify {
                    log::info!("run gen={} finished: {summary:?}", msg.generation);
                    self.emit(RunEvent::RunFinished {
                        summary,
                        stop_requested: self.machine.stop_requested(),
                        finished_at: Utc::now().timestamp(),
                    });
                }
                self.push_snapshot();
            }
            TickOutcome::ForceStop => {
                log::warn!("service reports no run while idle; halting poller");
                self.stop_poller();
            }
        }
    }

    async fn handle_command(&mut self, cmd: ControllerCommand) -> bool {
        match cmd {
            ControllerCommand::Start { request, reply } => {
                let res = self.handle_start(request).await;
                respond(reply, res);
            }
            ControllerCommand::Stop { reply } => {
                let res = self.handle_stop().await;
                respond(reply, res);
            }
            ControllerCommand::Reset { reply } => {
                let res = self.handle_reset().await;
                respond(reply, res);
            }
            ControllerCommand::Attach { reply } => {
                let res = self.handle_attach().await;
                respond(reply, res);
            }
            ControllerCommand::Shutdown => return false,
        }
        true
    }

    async fn run(mut self) {
        self.push_snapshot();

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                Some(msg) = self.poll_rx.recv() => {
                    self.handle_poll(msg);
                }
            }
        }

        self.stop_poller();
        self.emit(RunEvent::Shutdown);
    }
}

fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    let _ = reply.send(value);
}

pub(crate) fn start_controller(config: ControllerConfig) -> anyhow::Result<ControllerHandle> {
    let config = config.normalized();
    let service = HttpJobService::new(config.backend_url.clone(), config.request_timeout)?;
    Ok(spawn_controller(Arc::new(service), config))
}

pub(crate) fn spawn_controller(
    service: Arc<dyn JobService>,
    config: ControllerConfig,
) -> ControllerHandle {
    let (event_tx, _) = broadcast::channel::<RunEvent>(1024);
    let (snapshot_tx, snapshot_rx) = watch::channel(RunSnapshot::initial());
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (poll_tx, poll_rx) = mpsc::unbounded_channel();

    let runtime = ControllerRuntime {
        service,
        cfg: config.normalized(),
        machine: RunMachine::new(),
        poller: None,
        poll_tx,
        poll_rx,
        cmd_rx,
        event_tx: event_tx.clone(),
        snapshot_tx,
    };

    let join = tokio::spawn(runtime.run());
    ControllerHandle {
        cmd_tx,
        event_tx,
        snapshot_rx,
        join,
    }
}
