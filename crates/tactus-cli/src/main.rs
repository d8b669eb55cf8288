//! Terminal front-end for the Tactus metronome engine
//!
//! Owns the two collaborator roles the engine expects: a control surface
//! (flags mapped onto engine setters, Enter / `--duration` mapped onto
//! `stop()`) and a beat-event consumer (a printed pulse per beat, accents
//! starting a new line per bar).

use std::io::{self, Write as _};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result, anyhow};
use clap::Parser;

use tactus_audio::{AudioConfig, list_output_devices};
use tactus_engine::{EngineSettings, MetronomeEngine};

#[derive(Parser, Debug)]
#[command(name = "tactus", version, about = "A terminal metronome")]
struct Args {
    /// Tempo in beats per minute
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u16).range(30..=240))]
    bpm: u16,

    /// Time signature, e.g. 4/4 or 3/4 (invalid input falls back to 4/4)
    #[arg(long, default_value = "4/4")]
    meter: String,

    /// Click volume in percent
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: u8,

    /// How long to run, in seconds (default: until Enter is pressed)
    #[arg(long)]
    duration: Option<u64>,

    /// Output device name (default: the system default output)
    #[arg(long)]
    device: Option<String>,

    /// List available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_devices {
        for device in list_output_devices().context("listing output devices")? {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    let (engine, mut beats) = MetronomeEngine::new(EngineSettings {
        output_device: args.device.clone(),
        audio: AudioConfig::default(),
    });

    engine.set_tempo(f64::from(args.bpm));
    engine.set_time_signature(&args.meter);
    engine.set_volume(f64::from(args.volume) / 100.0);

    log::info!(
        "tempo {} bpm, {} beats per bar, volume {}%",
        engine.tempo(),
        engine.beats_per_bar(),
        args.volume
    );

    let engine = Arc::new(engine);

    // Documented start sequence: rewind while stopped, then hand the
    // engine to a dedicated thread that blocks for the whole run.
    engine.clear();
    let audio = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.start())
    };

    // Wait for the stream to come up (or for start() to fail fast).
    while !engine.is_running() && !audio.is_finished() {
        thread::sleep(Duration::from_millis(5));
    }

    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    if deadline.is_none() && engine.is_running() {
        println!("Press Enter to stop.");
        let stopper = Arc::clone(&engine);
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().read_line(&mut line);
            stopper.stop();
        });
    }

    let beats_per_bar = u64::from(engine.beats_per_bar());
    while engine.is_running() {
        while let Some(beat) = beats.poll() {
            if beat % beats_per_bar == 1 {
                print!("\nTICK");
            } else {
                print!(" tick");
            }
            io::stdout().flush().ok();
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            engine.stop();
        }

        thread::sleep(Duration::from_millis(10));
    }
    println!();

    audio
        .join()
        .map_err(|_| anyhow!("audio thread panicked"))??;

    Ok(())
}
