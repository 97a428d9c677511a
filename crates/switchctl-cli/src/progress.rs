//! Terminal progress for a run: one spinner while applications load, one
//! line per application while switching.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use switchctl_rollout::{Phase, RolloutEvents};

const TICK: Duration = Duration::from_millis(120);

struct SwitchLine {
    bar: ProgressBar,
    done: Vec<String>,
}

/// [`RolloutEvents`] sink rendering with indicatif.
pub struct ProgressEvents {
    multi: MultiProgress,
    loading: Mutex<Option<ProgressBar>>,
    lines: Mutex<HashMap<String, SwitchLine>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl ProgressEvents {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            loading: Mutex::new(None),
            lines: Mutex::new(HashMap::new()),
        }
    }

    pub fn start_loading(&self, applications: usize) {
        let bar = self.multi.add(ProgressBar::new(applications as u64));
        bar.set_style(style("{spinner:.green} Loading version information ({pos}/{len})"));
        bar.enable_steady_tick(TICK);
        *lock(&self.loading) = Some(bar);
    }

    pub fn finish_loading(&self) {
        if let Some(bar) = lock(&self.loading).take() {
            bar.finish_and_clear();
        }
    }

    /// Completed-instance summary of an application's switch line.
    pub fn switch_line(&self, application: &str) -> Option<String> {
        lock(&self.lines)
            .get(application)
            .map(|line| line.done.join(" "))
    }

    fn push_done(&self, application: &str, label: String) {
        let mut lines = lock(&self.lines);
        if let Some(line) = lines.get_mut(application) {
            line.done.push(label);
            line.bar.set_message(line.done.join(" "));
            line.bar.inc(1);
        }
    }
}

impl Default for ProgressEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl RolloutEvents for ProgressEvents {
    fn on_application_loaded(&self, _application: &str, _failed: bool) {
        if let Some(bar) = lock(&self.loading).as_ref() {
            bar.inc(1);
        }
    }

    fn on_switch_started(&self, application: &str, hostnames: &[String]) {
        let bar = self.multi.add(ProgressBar::new(hostnames.len() as u64));
        bar.set_style(style("{spinner:.green} {prefix}: {msg}"));
        bar.set_prefix(application.to_string());
        bar.enable_steady_tick(TICK);

        lock(&self.lines).insert(
            application.to_string(),
            SwitchLine {
                bar,
                done: Vec::new(),
            },
        );
    }

    fn on_instance_completed(&self, application: &str, hostname: &str, phase: Phase, failed: bool) {
        if phase != Phase::Switch {
            return;
        }
        let label = if failed {
            hostname.red().to_string()
        } else {
            hostname.green().to_string()
        };
        self.push_done(application, label);
    }

    fn on_instance_skipped(&self, application: &str, hostname: &str, _reason: &str) {
        self.push_done(application, hostname.yellow().to_string());
    }

    fn on_application_switched(&self, application: &str, failed: bool) {
        if let Some(line) = lock(&self.lines).get(application) {
            let status = if failed {
                "failed".red().to_string()
            } else {
                "done".green().to_string()
            };
            line.bar
                .finish_with_message(format!("{} [{status}]", line.done.join(" ")));
        }
    }
}
