use chrono::{DateTime, Local, TimeDelta, Utc};

use nlsub_client_core::newsletter::{NewsletterEntry, display_name};
use nlsub_client_core::summary::RunSummary;
use nlsub_client_core::task::{Outcome, TaskRecord};

fn outcome_tag(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "ok",
        Outcome::Warning => "!!",
        Outcome::Failure => "xx",
        Outcome::InProgress => "..",
        Outcome::Pending => "  ",
    }
}

pub fn format_task_line(task: &TaskRecord) -> String {
    let mut line = format!(
        "[{}] {:<14} {} -> {}",
        outcome_tag(task.status.outcome()),
        task.status.label(),
        task.email,
        display_name(&task.url),
    );
    if let Some(msg) = task.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        line.push_str(&format!(" ({msg})"));
    }
    line
}

pub fn format_summary(summary: &RunSummary) -> String {
    format!(
        "{}/{} done ({}%): {} ok, {} captcha, {} failed",
        summary.completed,
        summary.total,
        summary.percent_complete(),
        summary.success,
        summary.captcha,
        summary.failed,
    )
}

pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

pub fn format_finished_line(
    summary: &RunSummary,
    stop_requested: bool,
    started_at: Option<i64>,
    finished_at: i64,
) -> String {
    let verb = if stop_requested { "Run stopped" } else { "Run finished" };
    let mut line = format!("{verb}: {}", format_summary(summary));
    if let Some(started) = started_at {
        line.push_str(&format!(
            " in {}",
            format_elapsed(TimeDelta::seconds(finished_at - started))
        ));
    }
    line
}

fn timestamp_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

pub fn format_local_time(secs: i64) -> String {
    match timestamp_utc(secs) {
        Some(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => secs.to_string(),
    }
}

pub fn format_entry_line(entry: &NewsletterEntry) -> String {
    format!("{:<24} {}", entry.name, entry.url)
}
