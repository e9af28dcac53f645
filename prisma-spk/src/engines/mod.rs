//! Speech synthesis engines
//!
//! An engine accepts one utterance at a time and reports its lifecycle back
//! through an [`EventSink`]. Every event carries the id of the utterance it
//! belongs to so the driver can drop events from an utterance it has already
//! abandoned.

pub mod simulated;
pub mod espeak;
pub mod custom;

use crate::config::{EngineKind, SpeechConfig};
use crate::driver::UtteranceId;
use crate::error::SpeechError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Parameters handed to the engine with every utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    pub language: String,
    pub voice: Option<String>,
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
}

impl SpeechParams {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            language: config.voice.language.clone(),
            voice: config.voice.name.clone(),
            rate: config.rate_factor,
            pitch: config.pitch,
            volume: config.volume,
        }
    }
}

/// Kind of boundary reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    Word,
    Sentence,
    Other,
}

/// Lifecycle notification from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    Started,
    /// Engine reached `char_index` (in characters, not bytes)
    Boundary { char_index: usize, kind: BoundaryKind },
    Ended,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub utterance: UtteranceId,
    pub kind: EngineEventKind,
}

/// Receiving side of the engine event channel
pub type EngineEvents = mpsc::UnboundedReceiver<EngineEvent>;

/// Callback handle given to the engine for one utterance
#[derive(Debug, Clone)]
pub struct EventSink {
    utterance: UtteranceId,
    sender: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn new(utterance: UtteranceId, sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { utterance, sender }
    }

    pub fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    pub fn started(&self) {
        self.emit(EngineEventKind::Started);
    }

    pub fn boundary(&self, char_index: usize, kind: BoundaryKind) {
        self.emit(EngineEventKind::Boundary { char_index, kind });
    }

    pub fn ended(&self) {
        self.emit(EngineEventKind::Ended);
    }

    pub fn error(&self, reason: impl Into<String>) {
        self.emit(EngineEventKind::Error(reason.into()));
    }

    fn emit(&self, kind: EngineEventKind) {
        let event = EngineEvent {
            utterance: self.utterance,
            kind,
        };
        if self.sender.send(event).is_err() {
            debug!("Engine event for utterance {} dropped (driver gone)", self.utterance);
        }
    }
}

/// Trait for speech synthesis engines
pub trait SpeechEngine: Send + Sync {
    /// Start speaking `text`. Returns once the request is queued; progress is
    /// reported through `events`.
    fn speak(&self, text: &str, params: &SpeechParams, events: EventSink) -> Result<(), SpeechError>;

    /// Stop the current utterance and flush anything queued
    fn cancel(&self);

    /// Check if engine is available in this environment
    fn is_available(&self) -> bool;

    /// Get engine name
    fn name(&self) -> &str;
}

/// Create the engine selected in the config.
///
/// Custom engines have no factory here; the host builds them (for instance a
/// [`custom::CustomEngine`]) and hands them to the driver directly.
pub fn create_engine(config: &SpeechConfig) -> Result<Arc<dyn SpeechEngine>, SpeechError> {
    match config.engine {
        EngineKind::Simulated => Ok(Arc::new(simulated::SimulatedEngine::from_config(config))),
        EngineKind::Espeak => Ok(Arc::new(espeak::EspeakEngine::new(config.words_per_minute))),
        EngineKind::Custom(ref name) => Err(SpeechError::Engine(format!(
            "Custom speech engine '{}' must be constructed by the host application",
            name
        ))),
    }
}
