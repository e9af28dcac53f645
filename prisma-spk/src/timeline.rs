//! Phonetic segment and pause timelines built from the spoken text
//!
//! Both timelines are measured in seconds from the moment the engine reports
//! that speech started. Speaking characters share a *speech budget* (the text
//! length divided by the speaking rate); punctuation and whitespace add fixed
//! costs on top of it.

use crate::config::SpeechConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-character time used when the text has no speaking characters
pub const FALLBACK_CHAR_SECS: f64 = 0.12;

/// Sentence-ending punctuation pause (`.`, `!`, `?`)
pub const SENTENCE_PAUSE_SECS: f64 = 0.45;
/// Clause punctuation pause (`,`, `;`, `:`)
pub const CLAUSE_PAUSE_SECS: f64 = 0.25;
/// Run of two or more whitespace characters
pub const LONG_SPACE_SECS: f64 = 0.12;
/// Single whitespace character
pub const SHORT_SPACE_SECS: f64 = 0.06;

const SENTENCE_OPENING: f64 = 0.05;
const CLAUSE_OPENING: f64 = 0.15;
const LONG_SPACE_OPENING: f64 = 0.2;
const SHORT_SPACE_OPENING: f64 = 0.3;

const SENTENCE_INTENSITY: f64 = 0.05;
const CLAUSE_INTENSITY: f64 = 0.15;
const LONG_SPACE_INTENSITY: f64 = 0.25;
const SHORT_SPACE_INTENSITY: f64 = 0.35;

/// A span of the utterance mapped to a mouth-openness target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhoneticSegment {
    pub start: f64,
    pub end: f64,
    pub opening_target: f64,
}

/// A span of detected silence; `intensity` is the openness floor inside it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseWindow {
    pub start: f64,
    pub end: f64,
    pub intensity: f64,
}

impl PhoneticSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

impl PauseWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Character classes with their mouth-opening ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhonemeClass {
    OpenVowel,
    ClosedVowel,
    NasalLiquid,
    Voiced,
    Fricative,
    Stop,
    Unclassified,
}

impl PhonemeClass {
    /// Classify a single character (case-insensitive, accents included)
    pub fn classify(c: char) -> Self {
        let lower = c.to_lowercase().next().unwrap_or(c);
        match lower {
            'a' | 'e' | 'o' | 'á' | 'é' | 'ó' | 'à' | 'è' | 'ò' | 'â' | 'ê' | 'ô' | 'ä' | 'ë' | 'ö' => {
                PhonemeClass::OpenVowel
            }
            'i' | 'u' | 'í' | 'ú' | 'ü' | 'ì' | 'ù' | 'î' | 'û' | 'ï' => PhonemeClass::ClosedVowel,
            'm' | 'n' | 'ñ' | 'l' | 'r' => PhonemeClass::NasalLiquid,
            'b' | 'd' | 'g' | 'j' | 'v' | 'w' | 'y' | 'z' => PhonemeClass::Voiced,
            // "ch" is covered by its letters
            'f' | 's' | 'c' | 'h' | 'x' => PhonemeClass::Fricative,
            'p' | 't' | 'k' => PhonemeClass::Stop,
            _ => PhonemeClass::Unclassified,
        }
    }

    /// Half-open `[low, high)` opening range
    pub fn opening_range(&self) -> (f64, f64) {
        match self {
            PhonemeClass::OpenVowel => (0.85, 1.0),
            PhonemeClass::ClosedVowel => (0.65, 0.85),
            PhonemeClass::NasalLiquid => (0.6, 0.8),
            PhonemeClass::Voiced => (0.5, 0.75),
            PhonemeClass::Fricative => (0.4, 0.6),
            PhonemeClass::Stop => (0.3, 0.5),
            PhonemeClass::Unclassified => (0.4, 0.7),
        }
    }

    /// Draw an opening target uniformly from the class range
    pub fn sample_opening<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (low, high) = self.opening_range();
        rng.gen_range(low..high)
    }
}

/// Fixed-cost silence triggered by punctuation or whitespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Silence {
    Sentence,
    Clause,
    LongSpace,
    ShortSpace,
}

impl Silence {
    fn punctuation(c: char) -> Option<Self> {
        match c {
            '.' | '!' | '?' => Some(Silence::Sentence),
            ',' | ';' | ':' => Some(Silence::Clause),
            _ => None,
        }
    }

    fn whitespace(run: usize) -> Self {
        if run > 1 {
            Silence::LongSpace
        } else {
            Silence::ShortSpace
        }
    }

    fn secs(self) -> f64 {
        match self {
            Silence::Sentence => SENTENCE_PAUSE_SECS,
            Silence::Clause => CLAUSE_PAUSE_SECS,
            Silence::LongSpace => LONG_SPACE_SECS,
            Silence::ShortSpace => SHORT_SPACE_SECS,
        }
    }

    fn opening(self) -> f64 {
        match self {
            Silence::Sentence => SENTENCE_OPENING,
            Silence::Clause => CLAUSE_OPENING,
            Silence::LongSpace => LONG_SPACE_OPENING,
            Silence::ShortSpace => SHORT_SPACE_OPENING,
        }
    }

    fn intensity(self) -> f64 {
        match self {
            Silence::Sentence => SENTENCE_INTENSITY,
            Silence::Clause => CLAUSE_INTENSITY,
            Silence::LongSpace => LONG_SPACE_INTENSITY,
            Silence::ShortSpace => SHORT_SPACE_INTENSITY,
        }
    }
}

/// Returns true for the punctuation that produces pauses
pub fn is_pause_punctuation(c: char) -> bool {
    Silence::punctuation(c).is_some()
}

fn whitespace_run(chars: &[char], from: usize) -> usize {
    chars[from..].iter().take_while(|c| c.is_whitespace()).count()
}

/// Speaking-rate model shared by estimation and drift correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechTiming {
    chars_per_second: f64,
}

impl SpeechTiming {
    pub fn new(words_per_minute: f64, rate_factor: f64, avg_chars_per_word: f64) -> Self {
        Self {
            chars_per_second: (words_per_minute * rate_factor / 60.0) * avg_chars_per_word,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.words_per_minute, config.rate_factor, config.avg_chars_per_word)
    }

    pub fn chars_per_second(&self) -> f64 {
        self.chars_per_second
    }

    /// Speech budget of `text`: its length in characters over the speaking rate
    pub fn estimate_duration(&self, text: &str) -> f64 {
        text.chars().count() as f64 / self.chars_per_second
    }

    /// Where the engine should be when it reaches `char_index`
    pub fn expected_elapsed(&self, char_index: usize) -> f64 {
        char_index as f64 / self.chars_per_second
    }
}

/// Sum of the fixed punctuation and whitespace costs in `text`
pub fn silence_cost(text: &str) -> f64 {
    let chars: Vec<char> = text.chars().collect();
    let mut total = 0.0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(silence) = Silence::punctuation(c) {
            total += silence.secs();
            i += 1;
        } else if c.is_whitespace() {
            let run = whitespace_run(&chars, i);
            total += Silence::whitespace(run).secs();
            i += run;
        } else {
            i += 1;
        }
    }
    total
}

/// Build the contiguous phonetic segment sequence for `text`.
///
/// Speaking characters split `speech_budget` evenly; silences take their fixed
/// cost. A whitespace run is a single segment. The sequence starts at 0 and
/// each segment starts exactly where the previous one ended.
pub fn build_phonetic_segments<R: Rng + ?Sized>(
    text: &str,
    speech_budget: f64,
    rng: &mut R,
) -> Vec<PhoneticSegment> {
    let chars: Vec<char> = text.chars().collect();
    let speech_chars = chars
        .iter()
        .filter(|c| !c.is_whitespace() && !is_pause_punctuation(**c))
        .count();
    let char_time = if speech_chars > 0 {
        speech_budget / speech_chars as f64
    } else {
        FALLBACK_CHAR_SECS
    };

    let mut segments = Vec::with_capacity(chars.len());
    let mut cursor = 0.0;
    let mut push = |duration: f64, opening_target: f64| {
        let end = cursor + duration;
        segments.push(PhoneticSegment {
            start: cursor,
            end,
            opening_target,
        });
        cursor = end;
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(silence) = Silence::punctuation(c) {
            push(silence.secs(), silence.opening());
            i += 1;
        } else if c.is_whitespace() {
            let run = whitespace_run(&chars, i);
            let silence = Silence::whitespace(run);
            push(silence.secs(), silence.opening());
            i += run;
        } else {
            push(char_time, PhonemeClass::classify(c).sample_opening(rng));
            i += 1;
        }
    }

    segments
}

/// Build the sparse pause windows for `text`.
///
/// This walk keeps its own clock: every non-whitespace character takes an
/// equal share of `speech_budget`. Punctuation that follows a word opens its
/// window after its own share; punctuation at the start of the text or after
/// whitespace opens immediately. Windows line up with the phonetic segments
/// only approximately; the sampler reconciles the two at read time.
pub fn build_pause_windows(text: &str, speech_budget: f64) -> Vec<PauseWindow> {
    let chars: Vec<char> = text.chars().collect();
    let timed_chars = chars.iter().filter(|c| !c.is_whitespace()).count();
    let char_time = if timed_chars > 0 {
        speech_budget / timed_chars as f64
    } else {
        FALLBACK_CHAR_SECS
    };

    let mut pauses = Vec::new();
    let mut cursor = 0.0;
    let mut open = |cursor: &mut f64, silence: Silence| {
        let start = *cursor;
        let end = start + silence.secs();
        pauses.push(PauseWindow {
            start,
            end,
            intensity: silence.intensity(),
        });
        *cursor = end;
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(silence) = Silence::punctuation(c) {
            // Only a mark glued to a word spends a share; after a gap it opens at once
            if i > 0 && !chars[i - 1].is_whitespace() {
                cursor += char_time;
            }
            open(&mut cursor, silence);
            i += 1;
        } else if c.is_whitespace() {
            let run = whitespace_run(&chars, i);
            open(&mut cursor, Silence::whitespace(run));
            i += run;
        } else {
            cursor += char_time;
            i += 1;
        }
    }

    pauses
}
