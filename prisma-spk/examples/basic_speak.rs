//! Basic lip-sync example
//! Speaks one sentence through the simulated engine and prints the mouth
//! openness as the face would receive it.

use prisma_spk::{Animator, Emotion, Phase, SpeechConfig, SpeechDriver, SystemClock, WatchSurface};
use prisma_spk::engines::create_engine;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut config = SpeechConfig::default();
    config.apply_env();

    let engine = create_engine(&config)?;
    let (surface, mut samples) = WatchSurface::new();
    let (driver, events) = SpeechDriver::new(config, engine, Arc::new(surface), Arc::new(SystemClock))?;
    driver.set_emotion(Emotion::Happy);

    let animator = Animator::spawn(driver.clone(), events);

    let text = "Hola, bienvenidos. Hoy tenemos cafe y pan dulce.";
    println!("Speaking: {}", text);
    driver.submit(text)?;

    while samples.changed().await.is_ok() {
        let sample = *samples.borrow_and_update();
        let bar = "#".repeat((sample.openness * 30.0).round() as usize);
        println!("{:>5.2} {}", sample.openness, bar);

        if driver.phase() == Phase::Idle {
            break;
        }
    }

    animator.abort();
    Ok(())
}
