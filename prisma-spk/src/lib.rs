//! prisma-spk: Speech and lip-sync driver for the Prisma signage face
//!
//! Provides a talking-face animation core with:
//! - Speech duration estimation and drift correction from engine boundaries
//! - Phonetic segment and pause timelines built from the spoken text
//! - A per-frame mouth openness sampler driven by an injected clock
//! - Pluggable synthesis engines (simulated, espeak-ng, custom closures)

pub mod error;
pub mod config;
pub mod clock;
pub mod timeline;
pub mod sampler;
pub mod face;
pub mod engines;
pub mod driver;
pub mod animator;

pub use error::SpeechError;
pub use config::{SpeechConfig, VoiceConfig, AnimationConfig, EngineKind};
pub use clock::{Clock, SystemClock, ManualClock, FrameTicker, IntervalTicker};
pub use timeline::{PhoneticSegment, PauseWindow, PhonemeClass, SpeechTiming};
pub use sampler::{AnimationSampler, Frame};
pub use face::{Emotion, AnimationSample, FacePose, RenderSurface, WatchSurface};
pub use engines::{SpeechEngine, SpeechParams, EngineEvent, EngineEventKind, EngineEvents, BoundaryKind, EventSink};
pub use driver::{SpeechDriver, Utterance, UtteranceId, Phase, Submission};
pub use animator::Animator;
