//! Per-frame mouth openness sampler
//!
//! The sampler is a pure function of elapsed time against the precomputed
//! timelines. It keeps no state between frames, so any frame can be
//! recomputed from `(elapsed, estimated duration, rng)` alone.

use crate::config::AnimationConfig;
use crate::timeline::{PauseWindow, PhoneticSegment};
use rand::Rng;
use std::f64::consts::PI;

/// Opening used when there is no segment at all
const DEFAULT_OPENING: f64 = 0.5;
/// First frame when the utterance has no segments
const IDLE_START_OPENING: f64 = 0.4;

const FAST_WAVE_AMPLITUDE: f64 = 0.1;
const FAST_WAVE_RATE: f64 = 28.0 * PI;
const MEDIUM_WAVE_AMPLITUDE: f64 = 0.05;
const MEDIUM_WAVE_RATE: f64 = 9.0 * PI;

/// Outcome of sampling one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    /// Utterance still running; publish this openness
    Open(f64),
    /// Estimated end reached; publish 0 and stop looping
    Finished,
}

/// Maps elapsed time to mouth openness for one utterance
#[derive(Debug, Clone)]
pub struct AnimationSampler {
    segments: Vec<PhoneticSegment>,
    pauses: Vec<PauseWindow>,
    min_duration_secs: f64,
    speech_floor: f64,
    transition_secs: f64,
    jitter: f64,
}

impl AnimationSampler {
    pub fn new(
        segments: Vec<PhoneticSegment>,
        pauses: Vec<PauseWindow>,
        config: &AnimationConfig,
    ) -> Self {
        Self {
            segments,
            pauses,
            min_duration_secs: config.min_duration_secs,
            speech_floor: config.speech_floor,
            transition_secs: config.pause_transition_secs,
            jitter: config.jitter,
        }
    }

    pub fn segments(&self) -> &[PhoneticSegment] {
        &self.segments
    }

    /// Pause windows as built, before any clipping
    pub fn windows(&self) -> &[PauseWindow] {
        &self.pauses
    }

    /// Pause windows clipped to `horizon`. Windows starting at or past it are
    /// left out, but stay stored, so a later, larger horizon brings them back.
    pub fn pauses_within(&self, horizon: f64) -> Vec<PauseWindow> {
        self.pauses.iter().filter_map(|p| clip(p, horizon)).collect()
    }

    /// Length the loop runs for, given the current duration estimate
    pub fn final_duration(&self, estimated_duration: f64) -> f64 {
        estimated_duration.max(self.min_duration_secs)
    }

    /// Openness published as soon as the loop starts
    pub fn initial_openness(&self) -> f64 {
        self.segments
            .first()
            .map(|s| s.opening_target)
            .unwrap_or(IDLE_START_OPENING)
    }

    /// Segment covering `t`, falling back to the next segment ahead, then the
    /// last segment, then a synthetic mid-open segment.
    pub fn segment_at(&self, t: f64) -> PhoneticSegment {
        self.segments
            .iter()
            .find(|s| s.contains(t))
            .or_else(|| self.segments.iter().find(|s| t < s.end))
            .or_else(|| self.segments.last())
            .copied()
            .unwrap_or(PhoneticSegment {
                start: 0.0,
                end: t.max(0.0),
                opening_target: DEFAULT_OPENING,
            })
    }

    /// Pause covering `t` once windows are clipped to `horizon`
    pub fn pause_at(&self, t: f64, horizon: f64) -> Option<PauseWindow> {
        self.pauses
            .iter()
            .filter_map(|p| clip(p, horizon))
            .find(|p| p.contains(t))
    }

    /// Blend between the segment target and the pause intensity near the
    /// edges of the window; full intensity in the interior.
    pub fn pause_factor(&self, pause: &PauseWindow, t: f64, opening_target: f64) -> f64 {
        let edge_progress = if t - pause.start < self.transition_secs {
            Some((t - pause.start) / self.transition_secs)
        } else if pause.end - t < self.transition_secs {
            Some((pause.end - t) / self.transition_secs)
        } else {
            None
        };

        match edge_progress {
            Some(progress) => {
                pause.intensity + (opening_target - pause.intensity) * (1.0 - progress)
            }
            None => pause.intensity,
        }
    }

    /// Sample the frame at `elapsed` seconds after speech started
    pub fn sample<R: Rng + ?Sized>(
        &self,
        elapsed: f64,
        estimated_duration: f64,
        rng: &mut R,
    ) -> Frame {
        if elapsed >= self.final_duration(estimated_duration) {
            return Frame::Finished;
        }

        let segment = self.segment_at(elapsed);
        let level = match self.pause_at(elapsed, estimated_duration) {
            Some(pause) => {
                let factor = self.pause_factor(&pause, elapsed, segment.opening_target);
                (segment.opening_target * factor).clamp(pause.intensity, 1.0)
            }
            None => {
                let fast = (elapsed * FAST_WAVE_RATE).sin() * FAST_WAVE_AMPLITUDE;
                let medium = (elapsed * MEDIUM_WAVE_RATE).sin() * MEDIUM_WAVE_AMPLITUDE;
                let jitter = if self.jitter > 0.0 {
                    rng.gen_range(-self.jitter..=self.jitter)
                } else {
                    0.0
                };
                (segment.opening_target + fast + medium + jitter).clamp(self.speech_floor, 1.0)
            }
        };

        Frame::Open(level)
    }
}

fn clip(pause: &PauseWindow, horizon: f64) -> Option<PauseWindow> {
    (pause.start < horizon).then(|| PauseWindow {
        end: pause.end.min(horizon),
        ..*pause
    })
}
