// Terminal render surface: draws the mouth openness as a live bar

use prisma_spk::face::{AnimationSample, RenderSurface};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct TerminalSurface {
    width: usize,
    mouth_travel: f64,
    frames: AtomicU64,
}

impl TerminalSurface {
    pub fn new(width: usize, mouth_travel: f64) -> Self {
        Self {
            width: width.max(1),
            mouth_travel,
            frames: AtomicU64::new(0),
        }
    }

    /// Samples drawn so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn bar(&self, openness: f64) -> String {
        let filled = ((openness.clamp(0.0, 1.0) * self.width as f64).round() as usize).min(self.width);
        format!("{}{}", "█".repeat(filled), "·".repeat(self.width - filled))
    }
}

impl RenderSurface for TerminalSurface {
    fn render(&self, sample: AnimationSample) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        let marker = if sample.talking { "🗣" } else { "🤐" };
        let mut out = io::stdout().lock();
        // A closed pipe only loses the bar
        let _ = write!(
            out,
            "\r{} {:<7} |{}| {:.2} mouth {:>+6.1}px",
            marker,
            sample.emotion.as_str(),
            self.bar(sample.openness),
            sample.openness,
            sample.mouth_offset(self.mouth_travel),
        );
        let _ = out.flush();
    }
}
