use nlsub_client_core::summary::{RunSummary, newly_settled, summarize};
use nlsub_client_core::task::TaskRecord;

use crate::api::{RunPhase, RunSnapshot};
use crate::backend::PolledSnapshot;
use crate::error::StartError;

/// A poll result stamped with the poller generation and its tick sequence number.
#[derive(Debug, Clone)]
pub(crate) struct PolledTick {
    pub(crate) generation: u64,
    pub(crate) seq: u64,
    pub(crate) snapshot: PolledSnapshot,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Superseded generation or an older tick than one already applied. Dropped untouched.
    Stale,
    /// Run still active; snapshot applied.
    Progress { settled: Vec<TaskRecord> },
    /// Service reports the run ended. `notify` is true only the first time per run.
    Finished {
        settled: Vec<TaskRecord>,
        notify: bool,
    },
    /// Service reports no run while we are idle: halt polling, nothing else.
    ForceStop,
    /// Service reports a run while we are idle; nothing to apply.
    Ignored,
}

/// Local run state. Pure: no I/O, no timers, driven by the controller runtime.
#[derive(Debug)]
pub(crate) struct RunMachine {
    phase: RunPhase,
    notified: bool,
    stop_requested: bool,
    generation: u64,
    last_seq: Option<u64>,
    tasks: Vec<TaskRecord>,
    summary: RunSummary,
    started_at: Option<i64>,
}

impl RunMachine {
    pub(crate) fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            notified: false,
            stop_requested: false,
            generation: 0,
            last_seq: None,
            tasks: Vec::new(),
            summary: RunSummary::default(),
            started_at: None,
        }
    }

    pub(crate) fn phase(&self) -> RunPhase {
        self.phase
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn summary(&self) -> RunSummary {
        self.summary
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub(crate) fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            phase: self.phase,
            generation: self.generation,
            tasks: self.tasks.clone(),
            summary: self.summary,
            finished_notified: self.notified,
            stop_requested: self.stop_requested,
            started_at: self.started_at,
        }
    }

    pub(crate) fn begin_start(&mut self) -> Result<(), StartError> {
        if self.phase != RunPhase::Idle {
            return Err(StartError::AlreadyRunning);
        }
        self.phase = RunPhase::Starting;
        Ok(())
    }

    pub(crate) fn abort_start(&mut self) {
        if self.phase == RunPhase::Starting {
            self.phase = RunPhase::Idle;
        }
    }

    /// Enter `Active` for a new run and return its generation.
    pub(crate) fn activate(&mut self, now: i64) -> u64 {
        self.generation += 1;
        self.phase = RunPhase::Active;
        self.notified = false;
        self.stop_requested = false;
        self.last_seq = None;
        self.tasks.clear();
        self.summary = RunSummary::default();
        self.started_at = Some(now);
        self.generation
    }

    /// Whether a cancellation request should be sent. Only `Active` needs one.
    pub(crate) fn wants_stop(&self) -> bool {
        self.phase == RunPhase::Active
    }

    pub(crate) fn stop_sent(&mut self) {
        if self.phase == RunPhase::Active {
            self.phase = RunPhase::Stopping;
            self.stop_requested = true;
        }
    }

    pub(crate) fn apply_tick(&mut self, tick: PolledTick) -> TickOutcome {
        if tick.generation != self.generation {
            return TickOutcome::Stale;
        }
        if self.last_seq.is_some_and(|last| tick.seq <= last) {
            return TickOutcome::Stale;
        }
        self.last_seq = Some(tick.seq);

        let PolledSnapshot {
            tasks,
            remote_active,
        } = tick.snapshot;

        match (self.phase, remote_active) {
            (RunPhase::Active | RunPhase::Stopping, true) => {
                let settled = self.replace_tasks(tasks);
                TickOutcome::Progress { settled }
            }
            (RunPhase::Active | RunPhase::Stopping, false) => {
                let settled = self.replace_tasks(tasks);
                self.phase = RunPhase::Idle;
                let notify = !self.notified;
                self.notified = true;
                TickOutcome::Finished { settled, notify }
            }
            (RunPhase::Idle | RunPhase::Starting, false) => TickOutcome::ForceStop,
            (RunPhase::Idle | RunPhase::Starting, true) => TickOutcome::Ignored,
        }
    }

    fn replace_tasks(&mut self, tasks: Vec<TaskRecord>) -> Vec<TaskRecord> {
        let settled = newly_settled(&self.tasks, &tasks)
            .into_iter()
            .cloned()
            .collect();
        self.summary = summarize(&tasks);
        self.tasks = tasks;
        settled
    }

    /// Hard return to the initial state. Bumps the generation so in-flight ticks go stale.
    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.phase = RunPhase::Idle;
        self.notified = false;
        self.stop_requested = false;
        self.last_seq = None;
        self.tasks.clear();
        self.summary = RunSummary::default();
        self.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use nlsub_client_core::task::TaskStatus;

    use super::*;

    fn tick(generation: u64, seq: u64, tasks: Vec<TaskRecord>, remote_active: bool) -> PolledTick {
        PolledTick {
            generation,
            seq,
            snapshot: PolledSnapshot {
                tasks,
                remote_active,
            },
        }
    }

    fn task(email: &str, status: TaskStatus) -> TaskRecord {
        TaskRecord::new(email, "https://n.com", status)
    }

    fn active_machine() -> (RunMachine, u64) {
        let mut m = RunMachine::new();
        m.begin_start().unwrap();
        let generation = m.activate(1_700_000_000);
        (m, generation)
    }

    #[test]
    fn start_is_rejected_while_a_run_is_in_progress() {
        let (mut m, _) = active_machine();
        assert_eq!(m.begin_start(), Err(StartError::AlreadyRunning));
        assert_eq!(m.phase(), RunPhase::Active);
    }

    #[test]
    fn aborted_start_returns_to_idle() {
        let mut m = RunMachine::new();
        m.begin_start().unwrap();
        assert_eq!(m.phase(), RunPhase::Starting);
        m.abort_start();
        assert_eq!(m.phase(), RunPhase::Idle);
        assert_eq!(m.generation(), 0);
    }

    #[test]
    fn scenario_progress_then_completion_notifies_once() {
        let (mut m, g) = active_machine();

        let first = m.apply_tick(tick(
            g,
            1,
            vec![task("a@x.com", TaskStatus::Ok), task("b@x.com", TaskStatus::Pending)],
            true,
        ));
        assert!(matches!(first, TickOutcome::Progress { ref settled } if settled.len() == 1));
        assert_eq!(
            m.summary(),
            RunSummary {
                completed: 1,
                success: 1,
                captcha: 0,
                failed: 0,
                total: 2,
            }
        );

        let second = m.apply_tick(tick(
            g,
            2,
            vec![task("a@x.com", TaskStatus::Ok), task("b@x.com", TaskStatus::Captcha)],
            false,
        ));
        assert_eq!(
            second,
            TickOutcome::Finished {
                settled: vec![task("b@x.com", TaskStatus::Captcha)],
                notify: true,
            }
        );
        assert_eq!(m.phase(), RunPhase::Idle);
        assert_eq!(
            m.summary(),
            RunSummary {
                completed: 2,
                success: 1,
                captcha: 1,
                failed: 0,
                total: 2,
            }
        );

        for seq in 3..6 {
            assert_eq!(m.apply_tick(tick(g, seq, Vec::new(), false)), TickOutcome::ForceStop);
        }
        assert!(m.snapshot().finished_notified);
        assert_eq!(m.summary().total, 2);
    }

    #[test]
    fn stop_moves_to_stopping_and_completion_still_notifies_once() {
        let (mut m, g) = active_machine();
        assert!(m.wants_stop());
        m.stop_sent();
        assert_eq!(m.phase(), RunPhase::Stopping);
        assert!(!m.wants_stop());

        assert!(matches!(
            m.apply_tick(tick(g, 1, vec![task("a@x.com", TaskStatus::Running)], true)),
            TickOutcome::Progress { .. }
        ));
        assert_eq!(m.phase(), RunPhase::Stopping);

        assert!(matches!(
            m.apply_tick(tick(g, 2, vec![task("a@x.com", TaskStatus::Error)], false)),
            TickOutcome::Finished { notify: true, .. }
        ));
        assert!(m.stop_requested());
    }

    #[test]
    fn ticks_from_a_superseded_generation_are_stale() {
        let (mut m, g) = active_machine();
        m.reset();
        assert_eq!(
            m.apply_tick(tick(g, 1, vec![task("a@x.com", TaskStatus::Ok)], false)),
            TickOutcome::Stale
        );
        let snap = m.snapshot();
        assert_eq!(snap.phase, RunPhase::Idle);
        assert!(!snap.finished_notified);
        assert!(snap.tasks.is_empty());
    }

    #[test]
    fn out_of_order_ticks_within_a_generation_are_stale() {
        let (mut m, g) = active_machine();
        let newer = m.apply_tick(tick(g, 5, vec![task("a@x.com", TaskStatus::Ok)], true));
        assert!(matches!(newer, TickOutcome::Progress { .. }));

        let older = m.apply_tick(tick(g, 4, vec![task("a@x.com", TaskStatus::Pending)], false));
        assert_eq!(older, TickOutcome::Stale);
        assert_eq!(m.phase(), RunPhase::Active);
        assert_eq!(m.summary().completed, 1);
    }

    #[test]
    fn restart_after_finish_clears_latch() {
        let (mut m, g) = active_machine();
        assert!(matches!(
            m.apply_tick(tick(g, 1, Vec::new(), false)),
            TickOutcome::Finished { notify: true, .. }
        ));

        m.begin_start().unwrap();
        let g2 = m.activate(1_700_000_100);
        assert!(g2 > g);
        assert!(!m.snapshot().finished_notified);
        assert!(matches!(
            m.apply_tick(tick(g2, 1, Vec::new(), false)),
            TickOutcome::Finished { notify: true, .. }
        ));
    }

    #[test]
    fn idle_machine_ignores_active_reports() {
        let mut m = RunMachine::new();
        assert_eq!(m.apply_tick(tick(0, 1, Vec::new(), true)), TickOutcome::Ignored);
        assert_eq!(m.phase(), RunPhase::Idle);
    }
}
