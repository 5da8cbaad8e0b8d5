//! Per-`(phase, entity)` rate tracking for ETA display (spec §4.8): an
//! exponential moving average of instant rate over a ~5s window.

use std::time::Instant;

const EMA_WINDOW_SECS: f64 = 5.0;

pub struct RateTracker {
    last_current: u64,
    last_at: Instant,
    ema_rate: Option<f64>,
}

impl RateTracker {
    pub fn new(_total: u64) -> Self {
        Self {
            last_current: 0,
            last_at: Instant::now(),
            ema_rate: None,
        }
    }

    /// Folds in a new `(current, total)` observation, returning the
    /// smoothed rate (records/sec) and a derived ETA in seconds.
    pub fn observe(&mut self, current: u64, total: u64) -> (Option<f64>, Option<u64>) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_at).as_secs_f64();

        if elapsed > 0.0 && current > self.last_current {
            let instant = (current - self.last_current) as f64 / elapsed;
            let alpha = (elapsed / EMA_WINDOW_SECS).min(1.0);
            self.ema_rate = Some(match self.ema_rate {
                Some(prev) => prev + alpha * (instant - prev),
                None => instant,
            });
        }
        self.last_current = current;
        self.last_at = now;

        let eta = self.ema_rate.filter(|r| *r > 0.0).map(|rate| {
            let remaining = total.saturating_sub(current) as f64;
            (remaining / rate).round() as u64
        });
        (self.ema_rate, eta)
    }
}

/// Formats a duration in seconds as `H:MM:SS` or `M:SS` (spec §4.8).
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_switches_on_magnitude() {
        assert_eq!(format_duration(45), "0:45");
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn rate_tracker_reports_none_before_any_progress() {
        let mut tracker = RateTracker::new(100);
        let (rate, eta) = tracker.observe(0, 100);
        assert!(rate.is_none());
        assert!(eta.is_none());
    }

    #[test]
    fn rate_tracker_derives_eta_from_elapsed_progress() {
        let mut tracker = RateTracker::new(100);
        std::thread::sleep(std::time::Duration::from_millis(20));
        let (rate, eta) = tracker.observe(10, 100);
        assert!(rate.unwrap() > 0.0);
        assert!(eta.is_some());
    }
}
