//! Speech driver: owns the lifecycle of the single active utterance
//!
//! ```text
//!            submit                start                sampler end
//!   Idle ───────────▶ Pending ───────────▶ Active ───────────▶ Terminating
//!    ▲                   │                   │                      │
//!    └───────────────────┴──── end / error / cancel ────────────────┘
//! ```
//!
//! Submitting while any utterance is in flight cancels it first. Engine
//! events are tagged with the utterance id; events for any other utterance
//! are dropped.

use crate::clock::Clock;
use crate::config::SpeechConfig;
use crate::engines::{
    BoundaryKind, EngineEvent, EngineEventKind, EngineEvents, EventSink, SpeechEngine, SpeechParams,
};
use crate::error::SpeechError;
use crate::face::{AnimationSample, Emotion, RenderSurface};
use crate::sampler::{AnimationSampler, Frame};
use crate::timeline::{build_pause_windows, build_phonetic_segments, PauseWindow, PhoneticSegment, SpeechTiming};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Identifier of one submitted utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Driver lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing submitted
    Idle,
    /// Handed to the engine, waiting for its start event
    Pending,
    /// Engine started; the sampler is animating
    Active,
    /// Sampler reached the estimated end; waiting for the engine to finish
    Terminating,
}

/// Result of a submit call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted(UtteranceId),
    /// Text was empty after trimming; nothing changed
    EmptyText,
    /// No synthesis capability; submit is a no-op
    Unavailable,
}

/// One unit of speech being rendered
#[derive(Debug, Clone)]
pub struct Utterance {
    id: UtteranceId,
    text: String,
    speech_budget_secs: f64,
    estimated_duration_secs: f64,
    started_at: Option<Instant>,
    sampler: AnimationSampler,
}

impl Utterance {
    pub fn id(&self) -> UtteranceId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Time shared by the speaking characters (text length over speaking rate)
    pub fn speech_budget_secs(&self) -> f64 {
        self.speech_budget_secs
    }

    /// Current duration estimate, refined by boundary feedback
    pub fn estimated_duration_secs(&self) -> f64 {
        self.estimated_duration_secs
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn segments(&self) -> &[PhoneticSegment] {
        self.sampler.segments()
    }

    /// Pause windows clipped to the current duration estimate
    pub fn pauses(&self) -> Vec<PauseWindow> {
        self.sampler.pauses_within(self.estimated_duration_secs)
    }
}

struct DriverState {
    phase: Phase,
    utterance: Option<Utterance>,
    emotion: Emotion,
    openness: f64,
    rng: StdRng,
}

struct DriverInner {
    config: SpeechConfig,
    timing: SpeechTiming,
    params: SpeechParams,
    engine: Arc<dyn SpeechEngine>,
    surface: Arc<dyn RenderSurface>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<EngineEvent>,
    available: bool,
    next_id: AtomicU64,
    state: Mutex<DriverState>,
}

/// Speech driver handle. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SpeechDriver {
    inner: Arc<DriverInner>,
}

impl SpeechDriver {
    /// Create a driver and the channel its engine reports on.
    ///
    /// A missing synthesis capability is reported here, once; the driver is
    /// still returned and `submit` becomes a no-op.
    pub fn new(
        config: SpeechConfig,
        engine: Arc<dyn SpeechEngine>,
        surface: Arc<dyn RenderSurface>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, EngineEvents), SpeechError> {
        config.validate().map_err(SpeechError::Config)?;

        let available = config.enabled && engine.is_available();
        if !config.enabled {
            info!("Speech synthesis disabled in config");
        } else if !available {
            error!(
                "Speech synthesis capability '{}' is unavailable; speech is disabled",
                engine.name()
            );
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (events, receiver) = mpsc::unbounded_channel();
        let driver = Self {
            inner: Arc::new(DriverInner {
                timing: SpeechTiming::from_config(&config),
                params: SpeechParams::from_config(&config),
                config,
                engine,
                surface,
                clock,
                events,
                available,
                next_id: AtomicU64::new(1),
                state: Mutex::new(DriverState {
                    phase: Phase::Idle,
                    utterance: None,
                    emotion: Emotion::Neutral,
                    openness: 0.0,
                    rng,
                }),
            }),
        };
        Ok((driver, receiver))
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.inner.config
    }

    /// Whether a synthesis capability is present and enabled
    pub fn is_available(&self) -> bool {
        self.inner.available
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    /// True while the sampler should be ticking
    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Active
    }

    /// True from submission until the utterance is torn down
    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn openness(&self) -> f64 {
        self.inner.state.lock().openness
    }

    pub fn emotion(&self) -> Emotion {
        self.inner.state.lock().emotion
    }

    pub fn current_utterance_id(&self) -> Option<UtteranceId> {
        self.inner.state.lock().utterance.as_ref().map(|u| u.id)
    }

    /// Inspect the current utterance, if any
    pub fn with_utterance<R>(&self, f: impl FnOnce(&Utterance) -> R) -> Option<R> {
        self.inner.state.lock().utterance.as_ref().map(f)
    }

    /// Submit `text` for speaking, replacing whatever is in flight
    pub fn submit(&self, text: &str) -> Result<Submission, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            warn!("Empty text submitted, nothing to speak");
            return Ok(Submission::EmptyText);
        }

        if !self.inner.available {
            debug!("Ignoring submit: no speech synthesis capability");
            return Ok(Submission::Unavailable);
        }

        let mut state = self.inner.state.lock();

        // Flush the engine even when idle so nothing queued leaks into this utterance
        self.inner.engine.cancel();
        if state.phase != Phase::Idle {
            debug!("Cancelling in-flight utterance before submit");
            self.reset(&mut state);
        }

        let id = UtteranceId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let speech_budget = self.inner.timing.estimate_duration(text);
        let segments = build_phonetic_segments(text, speech_budget, &mut state.rng);
        let pauses = build_pause_windows(text, speech_budget);
        let timeline_end = segments.last().map(|s| s.end).unwrap_or(speech_budget);

        let sampler = AnimationSampler::new(segments, pauses, &self.inner.config.animation);

        debug!(
            "Utterance {}: {} chars, budget {:.2}s, estimate {:.2}s, {} segments, {} pauses",
            id,
            text.chars().count(),
            speech_budget,
            timeline_end,
            sampler.segments().len(),
            sampler.pauses_within(timeline_end).len()
        );

        state.utterance = Some(Utterance {
            id,
            text: text.to_string(),
            speech_budget_secs: speech_budget,
            estimated_duration_secs: timeline_end,
            started_at: None,
            sampler,
        });
        state.phase = Phase::Pending;

        let sink = EventSink::new(id, self.inner.events.clone());
        if let Err(e) = self.inner.engine.speak(text, &self.inner.params, sink) {
            warn!("Speech engine '{}' rejected utterance {}: {}", self.inner.engine.name(), id, e);
            self.reset(&mut state);
            return Err(e);
        }

        Ok(Submission::Accepted(id))
    }

    /// Stop the current utterance. Idempotent.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if state.phase == Phase::Idle {
            return;
        }

        self.inner.engine.cancel();
        if let Some(ref utterance) = state.utterance {
            info!("Utterance {} cancelled", utterance.id);
        }
        self.reset(&mut state);
    }

    /// Talk/stop toggle: cancel if busy, otherwise submit `text`
    pub fn toggle(&self, text: &str) -> Result<Option<Submission>, SpeechError> {
        if self.is_busy() {
            self.cancel();
            Ok(None)
        } else {
            self.submit(text).map(Some)
        }
    }

    pub fn set_emotion(&self, emotion: Emotion) {
        let mut state = self.inner.state.lock();
        state.emotion = emotion;
        let sample = Self::sample_of(&state);
        self.inner.surface.render(sample);
    }

    /// Apply one engine event
    pub fn handle_event(&self, event: EngineEvent) {
        let mut state = self.inner.state.lock();

        let current = state.utterance.as_ref().map(|u| u.id);
        if current != Some(event.utterance) {
            debug!("Dropping {:?} for stale utterance {}", event.kind, event.utterance);
            return;
        }

        match event.kind {
            EngineEventKind::Started => self.on_start(&mut state),
            EngineEventKind::Boundary { char_index, kind } => self.on_boundary(&mut state, char_index, kind),
            EngineEventKind::Ended => {
                if let Some(started_at) = state.utterance.as_ref().and_then(|u| u.started_at) {
                    let real = self.inner.clock.now().saturating_duration_since(started_at);
                    info!("Utterance {} finished after {:.2}s", event.utterance, real.as_secs_f64());
                } else {
                    info!("Utterance {} finished before it started", event.utterance);
                }
                self.reset(&mut state);
            }
            EngineEventKind::Error(reason) => {
                warn!("Speech engine error on utterance {}: {}", event.utterance, reason);
                self.reset(&mut state);
            }
        }
    }

    /// Run one animation frame. Returns `Frame::Finished` when the loop
    /// should stop (not active, or the estimated end was reached).
    pub fn tick(&self) -> Frame {
        let mut state = self.inner.state.lock();
        if state.phase != Phase::Active {
            return Frame::Finished;
        }

        let now = self.inner.clock.now();
        let DriverState { utterance, rng, .. } = &mut *state;
        let frame = match utterance.as_ref() {
            Some(u) => {
                let elapsed = u
                    .started_at
                    .map(|s| now.saturating_duration_since(s).as_secs_f64())
                    .unwrap_or(0.0);
                u.sampler.sample(elapsed, u.estimated_duration_secs, rng)
            }
            None => Frame::Finished,
        };

        match frame {
            Frame::Open(level) => self.publish(&mut state, level),
            Frame::Finished => {
                state.phase = Phase::Terminating;
                self.publish(&mut state, 0.0);
                debug!("Animation reached the estimated end of the utterance");
            }
        }
        frame
    }

    fn on_start(&self, state: &mut DriverState) {
        if state.phase != Phase::Pending {
            debug!("Ignoring duplicate start event");
            return;
        }

        let now = self.inner.clock.now();
        let initial = match state.utterance.as_mut() {
            Some(u) => {
                u.started_at = Some(now);
                info!("Utterance {} started", u.id);
                u.sampler.initial_openness()
            }
            None => return,
        };
        state.phase = Phase::Active;
        self.publish(state, initial);
    }

    fn on_boundary(&self, state: &mut DriverState, char_index: usize, kind: BoundaryKind) {
        if state.phase != Phase::Active || kind == BoundaryKind::Other {
            return;
        }

        let now = self.inner.clock.now();
        let threshold = self.inner.config.drift_threshold_secs;
        let Some(utterance) = state.utterance.as_mut() else {
            return;
        };
        let Some(started_at) = utterance.started_at else {
            return;
        };

        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
        let expected = self.inner.timing.expected_elapsed(char_index);
        let drift = elapsed - expected;
        if drift.abs() > threshold {
            utterance.estimated_duration_secs = (utterance.estimated_duration_secs + drift).max(0.0);
            let duration = utterance.estimated_duration_secs;
            debug!(
                "Drift {:+.2}s at char {}, estimate now {:.2}s",
                drift, char_index, duration
            );
        }
    }

    /// Tear down the utterance and close the mouth
    fn reset(&self, state: &mut DriverState) {
        state.phase = Phase::Idle;
        state.utterance = None;
        self.publish(state, 0.0);
    }

    fn publish(&self, state: &mut DriverState, openness: f64) {
        state.openness = openness;
        let sample = Self::sample_of(state);
        self.inner.surface.render(sample);
    }

    fn sample_of(state: &DriverState) -> AnimationSample {
        AnimationSample {
            openness: state.openness,
            emotion: state.emotion,
            talking: state.phase == Phase::Active,
        }
    }
}
