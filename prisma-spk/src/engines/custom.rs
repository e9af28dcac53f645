//! Custom speech engine implementation
//! Lets the host plug in its own synthesis backend with closures

use crate::engines::{EventSink, SpeechEngine, SpeechParams};
use crate::error::SpeechError;
use std::sync::Arc;

type SpeakFn = dyn Fn(&str, &SpeechParams, EventSink) -> Result<(), SpeechError> + Send + Sync;

/// Custom speech engine wrapper
pub struct CustomEngine {
    name: String,
    speak_fn: Arc<SpeakFn>,
    cancel_fn: Arc<dyn Fn() + Send + Sync>,
    is_available_fn: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl CustomEngine {
    /// Create a new custom engine.
    ///
    /// `speak_fn` receives the sink for the utterance and must report at least
    /// a terminal event (`ended` or `error`) unless it is cancelled.
    pub fn new<F1, F2, F3>(name: impl Into<String>, speak_fn: F1, cancel_fn: F2, is_available_fn: F3) -> Self
    where
        F1: Fn(&str, &SpeechParams, EventSink) -> Result<(), SpeechError> + Send + Sync + 'static,
        F2: Fn() + Send + Sync + 'static,
        F3: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            speak_fn: Arc::new(speak_fn),
            cancel_fn: Arc::new(cancel_fn),
            is_available_fn: Arc::new(is_available_fn),
        }
    }
}

impl SpeechEngine for CustomEngine {
    fn speak(&self, text: &str, params: &SpeechParams, events: EventSink) -> Result<(), SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::Engine("Text cannot be empty".to_string()));
        }

        (self.speak_fn)(text, params, events)
    }

    fn cancel(&self) {
        (self.cancel_fn)()
    }

    fn is_available(&self) -> bool {
        (self.is_available_fn)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
