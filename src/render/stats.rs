//! Rolling frame-time statistics for the overlay.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct FrameStats {
    samples: VecDeque<f64>,
    window_size: usize,
    /// Frame budget in milliseconds (16.7 for 60 Hz).
    pub budget_ms: f64,
    pub total_frames: u64,
    pub missed_frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(120, 16.7)
    }
}

/// Snapshot of the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub fps: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub missed_pct: f64,
}

impl FrameStats {
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            budget_ms,
            total_frames: 0,
            missed_frames: 0,
        }
    }

    pub fn record(&mut self, frame_ms: f64) {
        if self.samples.len() == self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(frame_ms);
        self.total_frames += 1;
        if frame_ms > self.budget_ms {
            self.missed_frames += 1;
        }
    }

    pub fn summary(&self) -> FrameSummary {
        let n = self.samples.len();
        let mean_ms = if n > 0 {
            self.samples.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        FrameSummary {
            fps: if mean_ms > 0.0 { 1000.0 / mean_ms } else { 0.0 },
            mean_ms,
            max_ms: self.samples.iter().copied().fold(0.0, f64::max),
            missed_pct: if self.total_frames > 0 {
                self.missed_frames as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// One-line overlay text.
    pub fn overlay_text(&self) -> String {
        let s = self.summary();
        format!(
            "{:.0} fps | {:.1} ms avg | {:.1} ms max | {:.0}% over budget",
            s.fps, s.mean_ms, s.max_ms, s.missed_pct
        )
    }
}
