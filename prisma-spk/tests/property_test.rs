use parking_lot::Mutex;
use proptest::prelude::*;
use prisma_spk::clock::ManualClock;
use prisma_spk::config::{AnimationConfig, SpeechConfig};
use prisma_spk::driver::SpeechDriver;
use prisma_spk::engines::custom::CustomEngine;
use prisma_spk::engines::{BoundaryKind, EventSink};
use prisma_spk::face::WatchSurface;
use prisma_spk::sampler::{AnimationSampler, Frame};
use prisma_spk::timeline::{build_pause_windows, build_phonetic_segments, silence_cost, SpeechTiming};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

const TEXT: &str = "[a-zA-Z0-9áéíóúñÑ ,.!?;:\t]{1,80}";

proptest! {
    #[test]
    fn test_segments_are_contiguous(text in TEXT, seed in any::<u64>()) {
        let timing = SpeechTiming::from_config(&SpeechConfig::default());
        let budget = timing.estimate_duration(&text);
        let mut rng = StdRng::seed_from_u64(seed);
        let segments = build_phonetic_segments(&text, budget, &mut rng);

        prop_assert!(!segments.is_empty());
        prop_assert_eq!(segments[0].start, 0.0);
        for pair in segments.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        for segment in &segments {
            prop_assert!(segment.end > segment.start);
            prop_assert!((0.0..=1.0).contains(&segment.opening_target));
        }

        let has_speech = text.chars().any(|c| !c.is_whitespace() && !",.!?;:".contains(c));
        if has_speech {
            let end = segments.last().unwrap().end;
            prop_assert!((end - (budget + silence_cost(&text))).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pause_windows_fit_in_timeline(text in TEXT) {
        let budget = SpeechTiming::new(150.0, 1.0, 5.0).estimate_duration(&text);
        let pauses = build_pause_windows(&text, budget);
        let has_timed = text.chars().any(|c| !c.is_whitespace());

        for pair in pauses.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start + 1e-12);
        }
        if has_timed {
            if let Some(last) = pauses.last() {
                prop_assert!(last.end <= budget + silence_cost(&text) + 1e-9);
            }
        }
    }

    #[test]
    fn test_openness_within_floor(text in TEXT, seed in any::<u64>(), frames in 1usize..200) {
        let config = AnimationConfig::default();
        let budget = SpeechTiming::from_config(&SpeechConfig::default()).estimate_duration(&text);
        let mut rng = StdRng::seed_from_u64(seed);
        let segments = build_phonetic_segments(&text, budget, &mut rng);
        let estimate = segments.last().map(|s| s.end).unwrap_or(budget);
        let pauses = build_pause_windows(&text, budget);
        let sampler = AnimationSampler::new(segments, pauses, &config);

        let final_duration = sampler.final_duration(estimate);
        for i in 0..frames {
            let t = final_duration * i as f64 / frames as f64;
            let floor = sampler.pause_at(t, estimate).map(|p| p.intensity).unwrap_or(config.speech_floor);
            match sampler.sample(t, estimate, &mut rng) {
                Frame::Open(level) => {
                    prop_assert!(level >= floor && level <= 1.0, "level {} floor {} at {}", level, floor, t);
                }
                Frame::Finished => prop_assert!(false, "finished early at {}", t),
            }
        }
        prop_assert_eq!(sampler.sample(final_duration, estimate, &mut rng), Frame::Finished);
    }

    #[test]
    fn test_drift_keeps_estimate_consistent(
        text in TEXT,
        boundaries in prop::collection::vec((0u64..2000, 0usize..200), 0..12),
    ) {
        let sinks: Arc<Mutex<Vec<EventSink>>> = Arc::default();
        let captured = sinks.clone();
        let engine = CustomEngine::new(
            "prop",
            move |_text, _params, sink| {
                captured.lock().push(sink);
                Ok(())
            },
            || {},
            || true,
        );
        let clock = Arc::new(ManualClock::new());
        let (surface, _rx) = WatchSurface::new();
        let config = SpeechConfig { seed: Some(1), ..SpeechConfig::default() };
        let (driver, mut events) =
            SpeechDriver::new(config, Arc::new(engine), Arc::new(surface), clock.clone()).unwrap();

        if driver.submit(&text).unwrap() != prisma_spk::Submission::Accepted(prisma_spk::UtteranceId(1)) {
            // Whitespace-only text
            return Ok(());
        }
        let sink = sinks.lock()[0].clone();
        let mut pump = || {
            while let Ok(event) = events.try_recv() {
                driver.handle_event(event);
            }
        };
        sink.started();
        pump();
        for (advance_ms, char_index) in boundaries {
            clock.advance(Duration::from_millis(advance_ms));
            sink.boundary(char_index, BoundaryKind::Word);
            pump();
        }

        let (estimate, pauses) = driver
            .with_utterance(|u| (u.estimated_duration_secs(), u.pauses()))
            .unwrap();
        prop_assert!(estimate >= 0.0);
        for pause in pauses {
            prop_assert!(pause.end <= estimate);
        }
    }
}
