//! Progress reporting for batch reconciliation

use crate::ui;
use reconcile::{Action, ProgressCallback, ReconciliationResult};

/// Prints one line per finished (user, server) reconciliation on stderr
pub struct UiProgress {
    quiet: bool,
    total: usize,
    done: usize,
}

impl UiProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            total: 0,
            done: 0,
        }
    }
}

impl ProgressCallback for UiProgress {
    fn on_batch_start(&mut self, count: usize) {
        self.total = count;
        self.done = 0;
        if !self.quiet && count > 1 {
            ui::info(&format!("Reconciling {count} servers"));
        }
    }

    fn on_request_complete(&mut self, user: &str, result: &ReconciliationResult) {
        self.done += 1;
        if self.quiet {
            return;
        }

        let line = format!("{} on {}: {}", user, result.server, result.detail);
        match result.action {
            Action::Error => ui::error(&line),
            Action::Pending => ui::warn(&line),
            Action::NoChange => ui::dim(&line),
            _ => ui::step(self.done, self.total, &line),
        }
    }
}
