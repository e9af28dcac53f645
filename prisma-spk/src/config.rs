//! Configuration for the speech driver and the face animation

use crate::error::SpeechError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Speech driver configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    /// Enable speech synthesis
    pub enabled: bool,

    /// Synthesis engine used by the driver
    pub engine: EngineKind,

    /// Voice settings
    pub voice: VoiceConfig,

    /// Speech rate multiplier handed to the engine (default 0.95)
    pub rate_factor: f64,

    /// Pitch handed to the engine (0.0-2.0, default 0.95)
    pub pitch: f64,

    /// Volume (0.0-1.0, default 1.0)
    pub volume: f64,

    /// Nominal speaking rate at rate_factor 1.0
    pub words_per_minute: f64,

    /// Average characters per word, spaces included
    pub avg_chars_per_word: f64,

    /// Minimum boundary drift (seconds) before the duration estimate is nudged
    pub drift_threshold_secs: f64,

    /// Mouth animation settings
    pub animation: AnimationConfig,

    /// Seed for phoneme and jitter randomness (entropy when unset)
    pub seed: Option<u64>,
}

/// Synthesis engine selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Headless engine that paces events at the nominal speaking rate
    Simulated,
    /// espeak-ng child process (Linux)
    Espeak,
    /// Engine registered by the host application
    Custom(String),
}

/// Voice configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    /// Language code (e.g., "es-ES", "en-US")
    pub language: String,

    /// Voice name/identifier
    pub name: Option<String>,
}

/// Mouth animation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnimationConfig {
    /// Frames per second of the sampler loop
    pub frame_rate: u32,

    /// Lower bound of the sampler's notion of utterance length
    pub min_duration_secs: f64,

    /// Openness floor while speaking outside a pause
    pub speech_floor: f64,

    /// Blend zone at each edge of a pause window
    pub pause_transition_secs: f64,

    /// Half-width of the uniform random jitter
    pub jitter: f64,

    /// Mouth displacement in surface units at openness 1.0
    pub mouth_travel: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: EngineKind::Simulated,
            voice: VoiceConfig::default(),
            rate_factor: 0.95,
            pitch: 0.95,
            volume: 1.0,
            words_per_minute: 150.0,
            avg_chars_per_word: 5.0,
            drift_threshold_secs: 0.1,
            animation: AnimationConfig::default(),
            seed: None,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "es-ES".to_string(),
            name: None,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            min_duration_secs: 1.0,
            speech_floor: 0.15,
            pause_transition_secs: 0.05,
            jitter: 0.04,
            mouth_travel: 120.0,
        }
    }
}

/// Primary subtag of a language tag, lowercased ("es-ES" gives "es")
pub fn primary_subtag(tag: &str) -> String {
    tag.split('-').next().unwrap_or_default().to_ascii_lowercase()
}

impl VoiceConfig {
    /// Check `language` is a `primary[-subtag]*` tag and `name` is usable as
    /// a single engine argument.
    pub fn validate(&self) -> Result<(), String> {
        let mut subtags = self.language.split('-');
        let primary = subtags.next().unwrap_or_default();
        if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!(
                "Language '{}' must start with a 2 or 3 letter primary subtag",
                self.language
            ));
        }
        for subtag in subtags {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(format!(
                    "Language '{}' has an invalid subtag '{}'",
                    self.language, subtag
                ));
            }
        }

        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err("Voice name cannot be blank if provided".to_string());
            }
            // Passed to the engine as one argument
            if name.starts_with('-') || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(format!("Voice name '{}' is not a single engine argument", name.escape_debug()));
            }
        }

        Ok(())
    }
}

impl AnimationConfig {
    /// Validate animation configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err("Frame rate must be between 1 and 240".to_string());
        }

        if !self.min_duration_secs.is_finite() || self.min_duration_secs < 0.0 {
            return Err("Minimum duration must be a non-negative number".to_string());
        }

        if !(0.0..=1.0).contains(&self.speech_floor) {
            return Err("Speech floor must be between 0.0 and 1.0".to_string());
        }

        if !(0.0..=1.0).contains(&self.pause_transition_secs) {
            return Err("Pause transition must be between 0.0 and 1.0 seconds".to_string());
        }

        if !(0.0..=0.5).contains(&self.jitter) {
            return Err("Jitter must be between 0.0 and 0.5".to_string());
        }

        if !self.mouth_travel.is_finite() || self.mouth_travel < 0.0 {
            return Err("Mouth travel must be a non-negative number".to_string());
        }

        Ok(())
    }
}

impl SpeechConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.rate_factor > 0.0 && self.rate_factor <= 4.0) {
            return Err("Rate factor must be greater than 0.0 and at most 4.0".to_string());
        }

        if !(0.0..=2.0).contains(&self.pitch) {
            return Err("Pitch must be between 0.0 and 2.0".to_string());
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err("Volume must be between 0.0 and 1.0".to_string());
        }

        if !(self.words_per_minute > 0.0 && self.words_per_minute <= 1000.0) {
            return Err("Words per minute must be greater than 0 and at most 1000".to_string());
        }

        if !(self.avg_chars_per_word > 0.0 && self.avg_chars_per_word <= 50.0) {
            return Err("Average characters per word must be greater than 0 and at most 50".to_string());
        }

        if !(0.0..=10.0).contains(&self.drift_threshold_secs) {
            return Err("Drift threshold must be between 0.0 and 10.0 seconds".to_string());
        }

        if let EngineKind::Custom(ref name) = self.engine {
            if name.is_empty() || name.len() > 256 {
                return Err("Custom engine name must be 1-256 chars".to_string());
            }
        }

        self.voice.validate()?;
        self.animation.validate()?;

        Ok(())
    }

    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpeechError> {
        let path = path.as_ref();
        if path.to_string_lossy().contains("..") {
            return Err(SpeechError::Config(format!(
                "Path traversal detected: '{}'",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Apply overrides from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(rate) = std::env::var("PRISMA_SPEECH_RATE") {
            match rate.parse::<f64>() {
                Ok(r) => self.rate_factor = r,
                Err(_) => tracing::warn!("Ignoring invalid PRISMA_SPEECH_RATE: {}", rate),
            }
        }

        if let Ok(lang) = std::env::var("PRISMA_SPEECH_LANG") {
            self.voice.language = lang;
        }

        if let Ok(engine) = std::env::var("PRISMA_SPEECH_ENGINE") {
            self.engine = EngineKind::parse(&engine);
        }

        if let Ok(fps) = std::env::var("PRISMA_FRAME_RATE") {
            match fps.parse::<u32>() {
                Ok(f) => self.animation.frame_rate = f,
                Err(_) => tracing::warn!("Ignoring invalid PRISMA_FRAME_RATE: {}", fps),
            }
        }
    }
}

impl FromStr for SpeechConfig {
    type Err = SpeechError;

    /// Parse JSON (a leading `{`) or TOML, then validate
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: SpeechConfig = if content.trim_start().starts_with('{') {
            serde_json::from_str(content)?
        } else {
            toml::from_str(content)?
        };

        config.validate().map_err(SpeechError::Config)?;
        Ok(config)
    }
}

impl EngineKind {
    /// Parse an engine name as given on the command line or in the environment
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => EngineKind::Simulated,
            "espeak" | "espeak-ng" => EngineKind::Espeak,
            _ => EngineKind::Custom(name.trim().to_string()),
        }
    }
}
