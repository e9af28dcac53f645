//! Face state published to the rendering surface

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

/// Emotion selected by the operator; independent of speech
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
}

/// Eyebrow rotation (degrees) and vertical offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrowPose {
    pub rotate: f64,
    pub y: f64,
}

/// Static pose the surface blends toward for an emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacePose {
    /// Horizontal offset of the mouth band
    pub mouth_x: f64,
    /// Vertical offset of the mouth band
    pub mouth_y: f64,
    pub left_brow: BrowPose,
    pub right_brow: BrowPose,
}

impl Emotion {
    pub const ALL: [Emotion; 4] = [Emotion::Neutral, Emotion::Happy, Emotion::Sad, Emotion::Angry];

    pub fn pose(&self) -> FacePose {
        let (mouth_x, mouth_y, brow_rotate, brow_y) = match self {
            Emotion::Neutral => (0.0, 0.0, 0.0, 0.0),
            Emotion::Happy => (-750.0, 200.0, 0.0, 0.0),
            Emotion::Sad => (450.0, 0.0, -20.0, -20.0),
            Emotion::Angry => (100.0, 0.0, 25.0, 10.0),
        };
        FacePose {
            mouth_x,
            mouth_y,
            left_brow: BrowPose { rotate: brow_rotate, y: brow_y },
            // mirrored
            right_brow: BrowPose { rotate: -brow_rotate, y: brow_y },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Emotion::Neutral),
            "happy" => Ok(Emotion::Happy),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            other => Err(format!("Unknown emotion '{}' (expected neutral, happy, sad or angry)", other)),
        }
    }
}

/// One frame of face state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationSample {
    /// Mouth openness in [0, 1]
    pub openness: f64,
    pub emotion: Emotion,
    /// An utterance is being animated
    pub talking: bool,
}

impl AnimationSample {
    /// Mouth displacement for this frame; zero while not talking
    pub fn mouth_offset(&self, travel: f64) -> f64 {
        if self.talking {
            self.openness * travel
        } else {
            0.0
        }
    }
}

/// Target that receives a sample on every animation tick.
///
/// Called with the driver's state lock held: implementations must not call
/// back into the driver.
pub trait RenderSurface: Send + Sync {
    fn render(&self, sample: AnimationSample);
}

/// Surface that exposes the latest sample through a `tokio::sync::watch` channel
pub struct WatchSurface {
    sender: watch::Sender<AnimationSample>,
}

impl WatchSurface {
    pub fn new() -> (Self, watch::Receiver<AnimationSample>) {
        let (sender, receiver) = watch::channel(AnimationSample::default());
        (Self { sender }, receiver)
    }

    pub fn latest(&self) -> AnimationSample {
        *self.sender.borrow()
    }
}

impl RenderSurface for WatchSurface {
    fn render(&self, sample: AnimationSample) {
        // send_replace keeps the value even when nobody is subscribed
        self.sender.send_replace(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brows_are_mirrored() {
        for emotion in Emotion::ALL {
            let pose = emotion.pose();
            assert_eq!(pose.left_brow.rotate, -pose.right_brow.rotate);
            assert_eq!(pose.left_brow.y, pose.right_brow.y);
        }
    }

    #[test]
    fn test_emotion_parse_roundtrip() {
        for emotion in Emotion::ALL {
            assert_eq!(emotion.as_str().parse::<Emotion>(), Ok(emotion));
        }
        assert!("bored".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_mouth_offset_only_while_talking() {
        let mut sample = AnimationSample { openness: 0.5, emotion: Emotion::Happy, talking: true };
        assert_eq!(sample.mouth_offset(120.0), 60.0);
        sample.talking = false;
        assert_eq!(sample.mouth_offset(120.0), 0.0);
    }

    #[test]
    fn test_watch_surface_keeps_latest() {
        let (surface, receiver) = WatchSurface::new();
        surface.render(AnimationSample { openness: 0.7, emotion: Emotion::Sad, talking: true });
        assert_eq!(receiver.borrow().openness, 0.7);
        assert_eq!(surface.latest().emotion, Emotion::Sad);
    }
}
