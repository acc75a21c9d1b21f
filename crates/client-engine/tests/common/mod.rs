#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use nlsub_client_core::settings::Speed;
use nlsub_client_core::task::{TaskRecord, TaskStatus};
use nlsub_client_engine::{
    JobService, PolledSnapshot, RemoteStatus, RunEvent, ServiceError, StartAck,
};
use tokio::sync::broadcast;

/// In-memory job service that replays poll frames in order and then repeats the last one.
#[derive(Default)]
pub struct ScriptedService {
    frames: Mutex<VecDeque<PolledSnapshot>>,
    registry: Mutex<Vec<String>>,
    start_error: Mutex<Option<ServiceError>>,
    stop_error: Mutex<Option<ServiceError>>,
    reset_error: Mutex<Option<ServiceError>>,
    fail_polls: AtomicUsize,
    poll_delay: Mutex<Duration>,
    running: AtomicBool,

    pub poll_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    pub replace_calls: AtomicUsize,
    pub last_start: Mutex<Option<(Vec<String>, Vec<String>, Option<Speed>)>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&self, tasks: Vec<TaskRecord>, remote_active: bool) {
        self.frames.lock().unwrap().push_back(PolledSnapshot {
            tasks,
            remote_active,
        });
    }

    pub fn fail_start_with(&self, err: ServiceError) {
        *self.start_error.lock().unwrap() = Some(err);
    }

    /// The next `stop` call fails with `err`; later calls succeed.
    pub fn fail_stop_with(&self, err: ServiceError) {
        *self.stop_error.lock().unwrap() = Some(err);
    }

    /// The next `reset` call fails with `err`; later calls succeed.
    pub fn fail_reset_with(&self, err: ServiceError) {
        *self.reset_error.lock().unwrap() = Some(err);
    }

    pub fn fail_next_polls(&self, n: usize) {
        self.fail_polls.store(n, Ordering::SeqCst);
    }

    pub fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = delay;
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn set_registry(&self, urls: &[&str]) {
        *self.registry.lock().unwrap() = urls.iter().map(|s| s.to_string()).collect();
    }

    pub fn registry_urls(&self) -> Vec<String> {
        self.registry.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    fn next_frame(&self) -> PolledSnapshot {
        let mut frames = self.frames.lock().unwrap();
        if frames.len() > 1 {
            return frames.pop_front().unwrap();
        }
        frames.front().cloned().unwrap_or(PolledSnapshot {
            tasks: Vec::new(),
            remote_active: true,
        })
    }
}

#[async_trait::async_trait]
impl JobService for ScriptedService {
    async fn status(&self) -> Result<RemoteStatus, ServiceError> {
        Ok(RemoteStatus {
            is_running: self.running.load(Ordering::SeqCst),
            total: None,
            completed: None,
        })
    }

    async fn tasks(&self) -> Result<Vec<TaskRecord>, ServiceError> {
        Ok(self.next_frame().tasks)
    }

    async fn start(
        &self,
        emails: &[String],
        urls: &[String],
        speed: Option<Speed>,
    ) -> Result<StartAck, ServiceError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let start_error = self.start_error.lock().unwrap().clone();
        if let Some(err) = start_error {
            return Err(err);
        }
        *self.last_start.lock().unwrap() = Some((emails.to_vec(), urls.to_vec(), speed));
        Ok(StartAck {
            status: Some("started".to_string()),
            total: Some(emails.len() * urls.len()),
        })
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let stop_error = self.stop_error.lock().unwrap().take();
        match stop_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn reset(&self) -> Result<(), ServiceError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        let reset_error = self.reset_error.lock().unwrap().take();
        match reset_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn registry(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.registry_urls())
    }

    async fn replace_registry(&self, urls: &[String]) -> Result<(), ServiceError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        *self.registry.lock().unwrap() = urls.to_vec();
        Ok(())
    }

    async fn poll_snapshot(&self) -> Result<PolledSnapshot, ServiceError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.poll_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.fail_polls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_polls.store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::Unreachable("connection refused".to_string()));
        }
        Ok(self.next_frame())
    }
}

pub fn task(email: &str, status: TaskStatus) -> TaskRecord {
    TaskRecord::new(email, "https://n.com", status)
}

/// Receive events until `pred` matches or the timeout elapses; returns everything seen.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<RunEvent>,
    timeout: Duration,
    pred: impl Fn(&RunEvent) -> bool,
) -> Vec<RunEvent> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let ev = match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(ev)) => ev,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return seen,
        };
        let done = pred(&ev);
        seen.push(ev);
        if done {
            return seen;
        }
    }
}

/// Drain whatever is buffered right now.
pub fn drain(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn count_finished(events: &[RunEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RunEvent::RunFinished { .. }))
        .count()
}
