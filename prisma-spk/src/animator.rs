//! Animation loop: feeds engine events to the driver and ticks it once per frame

use crate::clock::{FrameTicker, IntervalTicker};
use crate::driver::SpeechDriver;
use crate::engines::EngineEvents;
use crate::sampler::Frame;
use tokio::task::JoinHandle;
use tracing::debug;

/// Frame loop for a [`SpeechDriver`]
pub struct Animator;

impl Animator {
    /// Drive `driver` from `events`, sampling a frame on every tick while an
    /// utterance is active.
    ///
    /// The driver keeps a sender of its own, so in practice the loop runs
    /// until its task is aborted. It also returns if `events` closes.
    pub async fn run<T: FrameTicker>(driver: SpeechDriver, mut events: EngineEvents, mut ticker: T) {
        loop {
            let active = driver.is_active();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => driver.handle_event(event),
                    None => break,
                },
                _ = ticker.next_frame(), if active => {
                    if driver.tick() == Frame::Finished {
                        debug!("Frame loop idle until the next utterance starts");
                    }
                }
            }
        }
        debug!("Engine event channel closed, animator stopped");
    }

    /// Spawn the loop with a custom ticker
    pub fn spawn_with<T: FrameTicker + 'static>(
        driver: SpeechDriver,
        events: EngineEvents,
        ticker: T,
    ) -> JoinHandle<()> {
        tokio::spawn(Self::run(driver, events, ticker))
    }

    /// Spawn the loop at the configured frame rate
    pub fn spawn(driver: SpeechDriver, events: EngineEvents) -> JoinHandle<()> {
        let frame_rate = driver.config().animation.frame_rate;
        tokio::spawn(async move {
            let ticker = IntervalTicker::new(frame_rate);
            Self::run(driver, events, ticker).await;
        })
    }
}
