// Prisma speech driver command line interface
// Runs the talking-face driver headlessly and inspects its timelines

mod terminal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use prisma_spk::engines::create_engine;
use prisma_spk::engines::custom::CustomEngine;
use prisma_spk::{
    Animator, EngineKind, Emotion, ManualClock, PauseWindow, Phase, PhoneticSegment, SpeechConfig,
    SpeechDriver, SpeechError, Submission, SystemClock, WatchSurface,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use terminal::TerminalSurface;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const BAR_WIDTH: usize = 40;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "prisma")]
#[command(about = "Prisma signage face - speech and lip-sync driver", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Speak a text and draw the mouth openness live
    Say {
        /// Text to speak
        text: String,

        /// Speech engine (simulated, espeak)
        #[arg(long, short)]
        engine: Option<String>,

        /// Facial emotion (neutral, happy, sad, angry)
        #[arg(long, default_value = "neutral")]
        emotion: Emotion,

        /// Animation frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Configuration file path (TOML or JSON)
        #[arg(long, short)]
        config: Option<String>,

        /// Seed for reproducible mouth shapes
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the phonetic segments and pause windows built for a text
    Timeline {
        /// Text to analyse
        text: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Configuration file path (TOML or JSON)
        #[arg(long, short)]
        config: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file path (TOML or JSON)
        #[arg(long, short)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Say { text, engine, emotion, fps, config, seed } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(engine) = engine {
                config.engine = EngineKind::parse(&engine);
            }
            if let Some(fps) = fps {
                config.animation.frame_rate = fps;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            config.validate().map_err(SpeechError::Config)?;
            say(config, &text, emotion).await?;
        }
        Commands::Timeline { text, json, config } => {
            let config = load_config(config.as_deref())?;
            show_timeline(config, &text, json)?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Defaults or file, then environment overrides
fn load_config(path: Option<&str>) -> anyhow::Result<SpeechConfig> {
    let mut config = match path {
        Some(path) => SpeechConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => SpeechConfig::default(),
    };
    config.apply_env();
    config.validate().map_err(SpeechError::Config)?;
    Ok(config)
}

/// Speak one utterance through the animator and wait for it to finish
async fn say(config: SpeechConfig, text: &str, emotion: Emotion) -> anyhow::Result<()> {
    let engine = create_engine(&config).context("Failed to create speech engine")?;
    let surface = Arc::new(TerminalSurface::new(BAR_WIDTH, config.animation.mouth_travel));
    let (driver, events) = SpeechDriver::new(config, engine, surface.clone(), Arc::new(SystemClock))?;

    let pose = emotion.pose();
    debug!(
        "Pose for {}: mouth ({}, {}), brows {}°/{}°",
        emotion, pose.mouth_x, pose.mouth_y, pose.left_brow.rotate, pose.right_brow.rotate
    );
    driver.set_emotion(emotion);

    let animator = Animator::spawn(driver.clone(), events);

    let id = match driver.submit(text)? {
        Submission::Accepted(id) => id,
        Submission::EmptyText => {
            animator.abort();
            anyhow::bail!("Nothing to say: text is empty");
        }
        Submission::Unavailable => {
            animator.abort();
            return Err(SpeechError::Driver("speech synthesis is not available".to_string()).into());
        }
    };

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = poll.tick() => {
                if driver.phase() == Phase::Idle {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                driver.cancel();
                println!();
                println!("⏹️  Utterance {} cancelled", id);
                break;
            }
        }
    }

    animator.abort();
    println!();
    info!("Rendered {} frames", surface.frames());
    Ok(())
}

#[derive(Serialize)]
struct TimelineReport {
    text: String,
    speech_budget_secs: f64,
    estimated_duration_secs: f64,
    segments: Vec<PhoneticSegment>,
    pauses: Vec<PauseWindow>,
}

/// Build the timelines exactly as the driver does, without speaking
fn show_timeline(config: SpeechConfig, text: &str, json: bool) -> anyhow::Result<()> {
    let dry_run = CustomEngine::new("dry-run", |_, _, _| Ok(()), || {}, || true);
    let config = SpeechConfig {
        enabled: true,
        ..config
    };
    let (surface, _rx) = WatchSurface::new();
    let (driver, _events) = SpeechDriver::new(
        config,
        Arc::new(dry_run),
        Arc::new(surface),
        Arc::new(ManualClock::new()),
    )?;

    if driver.submit(text)? == Submission::EmptyText {
        anyhow::bail!("Nothing to analyse: text is empty");
    }

    let report = driver
        .with_utterance(|u| TimelineReport {
            text: u.text().to_string(),
            speech_budget_secs: u.speech_budget_secs(),
            estimated_duration_secs: u.estimated_duration_secs(),
            segments: u.segments().to_vec(),
            pauses: u.pauses(),
        })
        .context("Driver did not keep the utterance")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📝 {:?}", report.text);
    println!(
        "⏱️  speech budget {:.3}s, estimated duration {:.3}s",
        report.speech_budget_secs, report.estimated_duration_secs
    );
    println!();
    println!("{:<4} {:<6} {:>8} {:>8} {:>8}", "#", "char", "start", "end", "open");
    // Whitespace runs collapse to a single segment, so the text is walked run-wise
    let mut chars = report.text.chars().peekable();
    for (i, segment) in report.segments.iter().enumerate() {
        let label = match chars.next() {
            Some(c) if c.is_whitespace() => {
                while chars.peek().map_or(false, |c| c.is_whitespace()) {
                    chars.next();
                }
                "␣".to_string()
            }
            Some(c) => c.to_string(),
            None => "?".to_string(),
        };
        println!(
            "{:<4} {:<6} {:>8.3} {:>8.3} {:>8.2}",
            i, label, segment.start, segment.end, segment.opening_target
        );
    }

    println!();
    if report.pauses.is_empty() {
        println!("No pauses");
    } else {
        println!("{:<4} {:>8} {:>8} {:>10}", "#", "start", "end", "intensity");
        for (i, pause) in report.pauses.iter().enumerate() {
            println!("{:<4} {:>8.3} {:>8.3} {:>10.2}", i, pause.start, pause.end, pause.intensity);
        }
    }

    Ok(())
}
