//! Progress reporting for long scans.
//!
//! Interactive runs get an indicatif bar. In log-only mode the bar is hidden
//! and progress is logged every `interval` steps instead, which keeps output
//! readable under `tail -f`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// "12.3s" below a minute, "4.5m" above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Progress for one phase of known length. Safe to advance from rayon workers.
pub struct PhaseProgress {
    bar: ProgressBar,
    phase: &'static str,
    total: u64,
    interval: u64,
    done: AtomicU64,
}

impl PhaseProgress {
    pub fn new(phase: &'static str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(phase);

        Self {
            bar,
            phase,
            total,
            interval: (total / 20).max(1),
            done: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
        let current = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if is_log_only() && (current % self.interval == 0 || current == self.total) {
            let pct = 100.0 * current as f64 / self.total.max(1) as f64;
            info!(phase = self.phase, "{}/{} ({:.1}%)", current, self.total, pct);
        }
    }

    pub fn finish(&self, message: String) {
        if is_log_only() {
            info!(phase = self.phase, "{}", message);
        }
        self.bar.finish_with_message(message);
    }
}
