//! Cadence monitor - rolling message arrival rate
//!
//! Every received message contributes an instantaneous rate sample
//! `round(1000 / delta_ms)`. The displayed rate is the rounded mean of the
//! last `window` samples; eviction is FIFO by count.

use std::collections::VecDeque;
use std::time::Instant;

/// Rolling frames-per-second estimate, for diagnostics only
#[derive(Debug, Clone)]
pub struct CadenceMonitor {
    samples: VecDeque<u32>,
    window: usize,
    last_arrival: Option<Instant>,
}

impl CadenceMonitor {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        CadenceMonitor {
            samples: VecDeque::new(),
            window,
            last_arrival: None,
        }
    }

    /// Set the reference instant (e.g. when a connection opens).
    /// The first message after this yields a sample relative to it.
    pub fn start(&mut self, at: Instant) {
        self.last_arrival = Some(at);
    }

    /// Record a message arrival. The first arrival without a reference only
    /// sets it; zero-length intervals are skipped.
    pub fn observe(&mut self, at: Instant) {
        let previous = self.last_arrival.replace(at);
        let Some(previous) = previous else {
            return;
        };

        let delta_ms = at.saturating_duration_since(previous).as_secs_f64() * 1000.0;
        if delta_ms <= 0.0 {
            return;
        }
        let sample = (1000.0 / delta_ms).round();
        self.record_sample(sample.min(u32::MAX as f64) as u32);
    }

    /// Push one instantaneous rate sample
    pub fn record_sample(&mut self, sample: u32) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Rounded arithmetic mean of the window (0 when empty)
    pub fn fps(&self) -> u32 {
        if self.samples.is_empty() {
            return 0;
        }
        let sum: u64 = self.samples.iter().map(|&s| s as u64).sum();
        (sum as f64 / self.samples.len() as f64).round() as u32
    }

    pub fn samples(&self) -> impl Iterator<Item = u32> + '_ {
        self.samples.iter().copied()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for CadenceMonitor {
    fn default() -> Self {
        Self::new(10)
    }
}
