use std::io::Write;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use nlsub_client_core::summary::RunSummary;

use crate::constants::UI_TICK_INTERVAL_MS;
use crate::format::format_summary;

pub(crate) struct Ui {
    mp: MultiProgress,
    run_pb: ProgressBar,
    stop_pb: ProgressBar,
}

impl Ui {
    pub(crate) fn new() -> Self {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stdout());
        mp.set_move_cursor(true);

        let run_pb = mp.add(ProgressBar::new(0));
        let run_style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:30.cyan/blue} {msg}\u{1b}[0K",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#--");
        run_pb.set_style(run_style);
        run_pb.set_message("Waiting for the first snapshot");
        run_pb.enable_steady_tick(Duration::from_millis(UI_TICK_INTERVAL_MS));

        let stop_pb = mp.add(ProgressBar::new(0));
        let style = ProgressStyle::with_template("{msg}\u{1b}[0K")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        stop_pb.set_style(style);
        stop_pb.set_message(" ");

        Self { mp, run_pb, stop_pb }
    }

    pub(crate) fn println(&self, msg: &str) {
        let _ = self.mp.println(msg);
    }

    pub(crate) fn set_summary(&self, summary: &RunSummary) {
        let total = summary.total as u64;
        if self.run_pb.length() != Some(total) {
            self.run_pb.set_length(total);
        }
        self.run_pb.set_position(summary.completed as u64);
        self.run_pb.set_message(format_summary(summary));
    }

    pub(crate) fn set_stop_message(&self, msg: &str) {
        self.stop_pb.set_message(msg.to_string());
    }

    pub(crate) fn freeze(&self) {
        self.mp.set_move_cursor(false);
        self.run_pb.abandon();
        self.stop_pb.abandon();
        let _ = std::io::stdout().write_all(b"\n");
    }
}

/// Line sink that routes through the progress display when it is active.
pub(crate) struct Output {
    ui: Option<Ui>,
}

impl Output {
    pub(crate) fn new(tui: bool) -> Self {
        Self {
            ui: tui.then(Ui::new),
        }
    }

    pub(crate) fn line(&self, msg: &str) {
        match &self.ui {
            Some(ui) => ui.println(msg),
            None => println!("{msg}"),
        }
    }

    pub(crate) fn notice(&self, msg: &str) {
        match &self.ui {
            Some(ui) => ui.println(msg),
            None => eprintln!("{msg}"),
        }
    }

    pub(crate) fn summary(&self, summary: &RunSummary) {
        if let Some(ui) = &self.ui {
            ui.set_summary(summary);
        }
    }

    pub(crate) fn stop_message(&self, msg: &str) {
        match &self.ui {
            Some(ui) => ui.set_stop_message(msg),
            None => eprintln!("{msg}"),
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(ui) = &self.ui {
            ui.freeze();
        }
    }
}
