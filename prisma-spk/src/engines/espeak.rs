//! espeak-ng engine (Linux)
//!
//! Speaks through an `espeak-ng` child process. The command line tool reports
//! no word boundaries, so only start, end and error events are produced and
//! the driver runs on its initial duration estimate.

use crate::config::primary_subtag;
use crate::engines::{EventSink, SpeechEngine, SpeechParams};
use crate::error::SpeechError;
use parking_lot::Mutex;
use std::process::Stdio;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const MAX_TEXT_CHARS: usize = 100_000;

/// espeak-ng backed speech engine
pub struct EspeakEngine {
    available: bool,
    words_per_minute: f64,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl EspeakEngine {
    pub fn new(words_per_minute: f64) -> Self {
        let available = std::process::Command::new("espeak-ng")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        if !available {
            debug!("espeak-ng not found on PATH");
        }

        Self {
            available,
            words_per_minute,
            current: Mutex::new(None),
        }
    }

    /// Command line arguments for one utterance
    pub fn args(&self, text: &str, params: &SpeechParams) -> Vec<String> {
        // Speed in WPM
        let speed = (self.words_per_minute * params.rate).round().clamp(80.0, 450.0) as u32;
        // Amplitude 0-200, 100 is normal
        let amplitude = (params.volume * 100.0).round().clamp(0.0, 200.0) as u32;
        // Pitch 0-99, 50 is normal; pitch 1.0 maps to 50
        let pitch = (params.pitch * 50.0).round().clamp(0.0, 99.0) as u32;

        // espeak-ng voices are keyed by the primary language subtag
        let voice = params
            .voice
            .clone()
            .unwrap_or_else(|| primary_subtag(&params.language));

        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            speed.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "--".to_string(),
            sanitize(text),
        ]
    }
}

/// Drop control characters and cap the length
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .take(MAX_TEXT_CHARS)
        .collect()
}

impl SpeechEngine for EspeakEngine {
    fn speak(&self, text: &str, params: &SpeechParams, events: EventSink) -> Result<(), SpeechError> {
        if !self.available {
            return Err(SpeechError::EngineUnavailable("espeak-ng not available".to_string()));
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            SpeechError::Engine("No tokio runtime available for espeak-ng".to_string())
        })?;

        let args = self.args(text, params);
        let task = handle.spawn(async move {
            let child = Command::new("espeak-ng")
                .args(&args)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn();

            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    events.error(format!("Failed to run espeak-ng: {}", e));
                    return;
                }
            };

            events.started();
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => events.ended(),
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!("espeak-ng failed: {}", stderr.trim());
                    events.error(format!("espeak-ng exited with {}", output.status));
                }
                Err(e) => events.error(format!("espeak-ng wait failed: {}", e)),
            }
        });

        // Aborting the task drops the child, which kills it
        if let Some(previous) = self.current.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Some(task) = self.current.lock().take() {
            task.abort();
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &str {
        "espeak-ng"
    }
}
