use std::time::{Duration, Instant};

use log::debug;

/// Wall-clock stats for a repeated stage, e.g. one batch of the visualizer loop
#[derive(Debug, Clone)]
pub struct TimingStats {
    pub label: String,
    pub total: Duration,
    pub slowest: Duration,
    pub runs: u32,
    /// Images handled across all runs
    pub items: usize,
}

impl TimingStats {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            total: Duration::ZERO,
            slowest: Duration::ZERO,
            runs: 0,
            items: 0,
        }
    }

    pub fn record(&mut self, elapsed: Duration, items: usize) {
        self.total += elapsed;
        self.slowest = self.slowest.max(elapsed);
        self.runs += 1;
        self.items += items;

        debug!(
            "{} #{}: {} items in {:.2}ms (avg {:.2}ms)",
            self.label,
            self.runs,
            items,
            elapsed.as_secs_f64() * 1000.0,
            self.average_ms()
        );
    }

    pub fn average_ms(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.total.as_secs_f64() * 1000.0 / self.runs as f64
    }

    pub fn items_per_second(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.items as f64 / secs
        }
    }
}

/// Records into `stats` when dropped. Set `items` before the scope ends.
pub struct ScopedTimer<'a> {
    start: Instant,
    stats: &'a mut TimingStats,
    pub items: usize,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(stats: &'a mut TimingStats) -> Self {
        Self {
            start: Instant::now(),
            stats,
            items: 0,
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.stats.record(self.start.elapsed(), self.items);
    }
}
