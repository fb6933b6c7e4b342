use log::{debug, info};
use std::time::Instant;

/// Run one pipeline stage between `starting` / `complete` log lines.
pub fn logged<T>(tag: &str, stage: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    info!("{}: starting", tag);
    let started = Instant::now();
    let result = stage().map_err(|e| format!("{}: {}", tag, e))?;
    info!("{}: complete ({:.1}s)", tag, started.elapsed().as_secs_f64());
    Ok(result)
}

/// Milestone logging for long per-home or per-day loops.
///
/// When visible, roughly every tenth of the work is reported at `info`;
/// otherwise milestones go to `debug`.
pub struct Progress {
    label: &'static str,
    total: usize,
    done: usize,
    step: usize,
    visible: bool,
}

impl Progress {
    pub fn new(label: &'static str, total: usize, visible: bool) -> Self {
        Progress {
            label,
            total,
            done: 0,
            step: (total / 10).max(1),
            visible,
        }
    }

    pub fn tick(&mut self) {
        self.done += 1;
        if self.done % self.step != 0 && self.done != self.total {
            return;
        }
        let pct = if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        };
        if self.visible {
            info!("{}: {}/{} ({:.0}%)", self.label, self.done, self.total, pct);
        } else {
            debug!("{}: {}/{} ({:.0}%)", self.label, self.done, self.total, pct);
        }
    }
}

/// Latitude and longitude are finite and inside their degree ranges.
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite() && longitude.is_finite() && latitude.abs() <= 90.0 && longitude.abs() <= 180.0
}
