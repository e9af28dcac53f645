//! Tests for speech engine implementations

use prisma_spk::config::{EngineKind, SpeechConfig};
use prisma_spk::driver::UtteranceId;
use prisma_spk::engines::custom::CustomEngine;
use prisma_spk::engines::espeak::EspeakEngine;
use prisma_spk::engines::simulated::SimulatedEngine;
use prisma_spk::engines::{
    create_engine, BoundaryKind, EngineEvent, EngineEventKind, EventSink, SpeechEngine, SpeechParams,
};
use prisma_spk::error::SpeechError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn params(rate: f64) -> SpeechParams {
    SpeechParams {
        rate,
        ..SpeechParams::from_config(&SpeechConfig::default())
    }
}

fn channel() -> (mpsc::UnboundedSender<EngineEvent>, mpsc::UnboundedReceiver<EngineEvent>) {
    mpsc::unbounded_channel()
}

#[test]
fn test_params_from_config() {
    let params = SpeechParams::from_config(&SpeechConfig::default());
    assert_eq!(params.language, "es-ES");
    assert_eq!(params.voice, None);
    assert_eq!(params.rate, 0.95);
    assert_eq!(params.pitch, 0.95);
    assert_eq!(params.volume, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_engine_event_order() {
    let engine = SimulatedEngine::new(150.0, 5.0);
    let (tx, mut rx) = channel();
    let start = Instant::now();
    engine
        .speak("Hola mundo", &params(1.0), EventSink::new(UtteranceId(1), tx))
        .unwrap();

    let mut kinds = Vec::new();
    while let Some(event) = rx.recv().await {
        assert_eq!(event.utterance, UtteranceId(1));
        let done = event.kind == EngineEventKind::Ended;
        kinds.push(event.kind);
        if done {
            break;
        }
    }

    assert_eq!(
        kinds,
        vec![
            EngineEventKind::Started,
            EngineEventKind::Boundary { char_index: 0, kind: BoundaryKind::Sentence },
            EngineEventKind::Boundary { char_index: 5, kind: BoundaryKind::Word },
            EngineEventKind::Ended,
        ]
    );
    // 10 characters at 12.5 chars per second
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(790));
    assert!(elapsed < Duration::from_millis(850));
}

#[tokio::test(start_paused = true)]
async fn test_simulated_engine_start_delay() {
    let engine = SimulatedEngine::new(150.0, 5.0).with_start_delay(Duration::from_millis(250));
    let (tx, mut rx) = channel();
    let start = Instant::now();
    engine
        .speak("Hola", &params(1.0), EventSink::new(UtteranceId(3), tx))
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, EngineEventKind::Started);
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_simulated_engine_cancel_stops_events() {
    let engine = SimulatedEngine::new(150.0, 5.0);
    let (tx, mut rx) = channel();
    engine
        .speak("Hola mundo", &params(1.0), EventSink::new(UtteranceId(1), tx))
        .unwrap();
    engine.cancel();
    engine.cancel();

    // The aborted task drops the only sender
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_simulated_engine_new_speak_replaces_old() {
    let engine = SimulatedEngine::new(150.0, 5.0);
    let (tx, mut rx) = channel();
    engine
        .speak("Primero", &params(1.0), EventSink::new(UtteranceId(1), tx.clone()))
        .unwrap();
    engine
        .speak("Segundo", &params(1.0), EventSink::new(UtteranceId(2), tx))
        .unwrap();

    while let Some(event) = rx.recv().await {
        assert_eq!(event.utterance, UtteranceId(2));
        if event.kind == EngineEventKind::Ended {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_simulated_engine_failure() {
    let engine = SimulatedEngine::new(150.0, 5.0).failing_after(1);
    let (tx, mut rx) = channel();
    engine
        .speak("uno dos tres", &params(1.0), EventSink::new(UtteranceId(7), tx))
        .unwrap();

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event.kind);
    }
    assert!(matches!(last, Some(EngineEventKind::Error(_))));
}

#[test]
fn test_simulated_engine_rate_scales_script() {
    let engine = SimulatedEngine::new(150.0, 5.0);
    let end_at = |rate: f64| match engine.script("Hola mundo", rate).last() {
        Some((t, EngineEventKind::Ended)) => *t,
        other => panic!("unexpected tail {:?}", other),
    };
    assert!((end_at(1.0) - 0.8).abs() < 1e-9);
    assert!((end_at(2.0) - 0.4).abs() < 1e-9);
}

#[test]
fn test_simulated_engine_script_pauses() {
    let engine = SimulatedEngine::new(150.0, 5.0);
    let script = engine.script("Si, no.", 1.0);
    let end = script.last().map(|(t, _)| *t).unwrap();
    // 7 characters plus a clause and a sentence pause
    assert!((end - (7.0 / 12.5 + 0.25 + 0.45)).abs() < 1e-9);
}

#[test]
fn test_simulated_engine_requires_runtime() {
    let engine = SimulatedEngine::new(150.0, 5.0);
    let (tx, _rx) = channel();
    let result = engine.speak("Hola", &params(1.0), EventSink::new(UtteranceId(1), tx));
    assert!(matches!(result, Err(SpeechError::Engine(_))));
}

#[test]
fn test_simulated_engine_availability() {
    assert!(SimulatedEngine::new(150.0, 5.0).is_available());
    assert!(!SimulatedEngine::new(0.0, 5.0).is_available());
    assert_eq!(SimulatedEngine::new(150.0, 5.0).name(), "simulated");
}

#[test]
fn test_custom_engine_delegates() {
    let engine = CustomEngine::new(
        "kiosk",
        |text, params, sink| {
            assert_eq!(text, "Hola");
            assert_eq!(params.language, "es-ES");
            sink.started();
            sink.ended();
            Ok(())
        },
        || {},
        || true,
    );
    assert_eq!(engine.name(), "kiosk");
    assert!(engine.is_available());

    let (tx, mut rx) = channel();
    engine
        .speak("Hola", &params(1.0), EventSink::new(UtteranceId(4), tx))
        .unwrap();
    assert_eq!(rx.try_recv().unwrap().kind, EngineEventKind::Started);
    assert_eq!(rx.try_recv().unwrap().kind, EngineEventKind::Ended);
}

#[test]
fn test_custom_engine_rejects_empty_text() {
    let engine = CustomEngine::new("kiosk", |_, _, _| Ok(()), || {}, || true);
    let (tx, _rx) = channel();
    let result = engine.speak("", &params(1.0), EventSink::new(UtteranceId(1), tx));
    assert!(result.unwrap_err().to_string().contains("empty"));
}

#[test]
fn test_event_sink_survives_closed_channel() {
    let (tx, rx) = channel();
    drop(rx);
    let sink = EventSink::new(UtteranceId(9), tx);
    assert_eq!(sink.utterance(), UtteranceId(9));
    sink.started();
    sink.boundary(3, BoundaryKind::Word);
    sink.error("gone");
}

#[test]
fn test_create_engine_from_config() {
    let engine = create_engine(&SpeechConfig::default()).unwrap();
    assert_eq!(engine.name(), "simulated");

    let config = SpeechConfig {
        engine: EngineKind::Espeak,
        ..SpeechConfig::default()
    };
    let engine = create_engine(&config).unwrap();
    assert_eq!(engine.name(), "espeak-ng");

    let config = SpeechConfig {
        engine: EngineKind::Custom("cloud".to_string()),
        ..SpeechConfig::default()
    };
    assert!(matches!(create_engine(&config), Err(SpeechError::Engine(_))));
}

#[tokio::test]
async fn test_espeak_engine_unavailable_speak_fails() {
    let engine = EspeakEngine::new(150.0);
    if engine.is_available() {
        // Host has espeak-ng installed; argument mapping is covered by unit tests
        return;
    }
    let (tx, _rx) = channel();
    let result = engine.speak("Hola", &params(1.0), EventSink::new(UtteranceId(1), tx));
    assert!(matches!(result, Err(SpeechError::EngineUnavailable(_))));
}
