//! Headless engine that paces lifecycle events at the nominal speaking rate.
//! Used on players without audio output and to exercise the driver.

use crate::config::SpeechConfig;
use crate::engines::{BoundaryKind, EngineEventKind, EventSink, SpeechEngine, SpeechParams};
use crate::error::SpeechError;
use crate::timeline::{CLAUSE_PAUSE_SECS, SENTENCE_PAUSE_SECS};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Simulated speech engine
pub struct SimulatedEngine {
    words_per_minute: f64,
    avg_chars_per_word: f64,
    start_delay: Duration,
    fail_after_boundaries: Option<usize>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedEngine {
    pub fn new(words_per_minute: f64, avg_chars_per_word: f64) -> Self {
        Self {
            words_per_minute,
            avg_chars_per_word,
            start_delay: Duration::ZERO,
            fail_after_boundaries: None,
            current: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.words_per_minute, config.avg_chars_per_word)
    }

    /// Delay between `speak` and the start event
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Report an error instead of continuing after `boundaries` boundary events
    pub fn failing_after(mut self, boundaries: usize) -> Self {
        self.fail_after_boundaries = Some(boundaries);
        self
    }

    /// Event schedule for `text`, as offsets in seconds from the start event.
    ///
    /// Every character costs one character-time at `rate`; sentence and clause
    /// punctuation add their pause on top. A boundary is reported at the first
    /// character of each word.
    pub fn script(&self, text: &str, rate: f64) -> Vec<(f64, EngineEventKind)> {
        let chars_per_second = (self.words_per_minute * rate / 60.0) * self.avg_chars_per_word;
        let char_time = 1.0 / chars_per_second;
        let chars: Vec<char> = text.chars().collect();

        let mut script = Vec::new();
        let mut boundaries = 0usize;
        let mut t = 0.0;
        let mut sentence_start = true;

        for (i, &c) in chars.iter().enumerate() {
            let word_start = !c.is_whitespace() && (i == 0 || chars[i - 1].is_whitespace());
            if word_start {
                if self.fail_after_boundaries == Some(boundaries) {
                    script.push((t, EngineEventKind::Error("simulated engine failure".to_string())));
                    return script;
                }
                let kind = if sentence_start {
                    BoundaryKind::Sentence
                } else {
                    BoundaryKind::Word
                };
                script.push((t, EngineEventKind::Boundary { char_index: i, kind }));
                boundaries += 1;
                sentence_start = false;
            }

            t += char_time;
            match c {
                '.' | '!' | '?' => {
                    t += SENTENCE_PAUSE_SECS;
                    sentence_start = true;
                }
                ',' | ';' | ':' => t += CLAUSE_PAUSE_SECS,
                _ => {}
            }
        }

        script.push((t, EngineEventKind::Ended));
        script
    }
}

impl SpeechEngine for SimulatedEngine {
    fn speak(&self, text: &str, params: &SpeechParams, events: EventSink) -> Result<(), SpeechError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            SpeechError::Engine("No tokio runtime available for the simulated engine".to_string())
        })?;

        let script = self.script(text, params.rate);
        let start_delay = self.start_delay;

        let task = handle.spawn(async move {
            tokio::time::sleep(start_delay).await;
            events.started();
            let started_at = tokio::time::Instant::now();

            for (offset, kind) in script {
                tokio::time::sleep_until(started_at + Duration::from_secs_f64(offset)).await;
                match kind {
                    EngineEventKind::Boundary { char_index, kind } => events.boundary(char_index, kind),
                    EngineEventKind::Ended => events.ended(),
                    EngineEventKind::Error(reason) => events.error(reason),
                    EngineEventKind::Started => events.started(),
                }
            }
        });

        if let Some(previous) = self.current.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Some(task) = self.current.lock().take() {
            debug!("Cancelling simulated utterance");
            task.abort();
        }
    }

    fn is_available(&self) -> bool {
        self.words_per_minute > 0.0 && self.avg_chars_per_word > 0.0
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
