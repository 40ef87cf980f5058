//! # Tuner - Terminal Front End
//!
//! Command-line front end for the tuner core. It owns the audio stream and a
//! control loop; all pitch and tuning logic lives in `tuner-core`.
//!
//! ## Architecture
//! - **Audio callback**: frames are analysed on the capture thread and the
//!   latest frequency is left in a single slot
//! - **Control loop**: `crossbeam_channel::select!` over a refresh tick and a
//!   shutdown signal; each tick polls the tuner and redraws the readout
//! - **Shutdown**: Enter on stdin or the `--seconds` deadline

mod cli;
mod display;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, select};
use std::f32::consts::PI;
use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;
use tuner_core::{Tuner, TuningSnapshot, audio};

use cli::{Args, Command};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    log::debug!("[MAIN] Arguments: {args:?}");

    let settings = settings::resolve(&args)?;
    let tuner = Tuner::new(settings);

    match args.command {
        Command::Listen { seconds, refresh_ms } => {
            listen(&tuner, seconds, Duration::from_millis(refresh_ms.max(1)), args.json)?
        }
        Command::Tone {
            frequency,
            sample_rate,
            amplitude,
        } => tone(&tuner, frequency, sample_rate, amplitude, args.json)?,
        Command::Strings => {
            let config = tuner.configuration();
            print!(
                "{}",
                display::format_strings(tuner.instrument(), config.reference_pitch())
            );
        }
    }

    if args.save_settings {
        match &args.settings {
            Some(path) => {
                settings::save_settings(&tuner.current_settings(), path)?;
                log::info!("[MAIN] Settings saved to {}", path.display());
            }
            None => log::warn!("[MAIN] --save-settings given without --settings; nothing saved"),
        }
    }
    Ok(())
}

/// Live tuning from the default microphone until Enter or the deadline.
fn listen(tuner: &Tuner, seconds: Option<u64>, refresh: Duration, json: bool) -> Result<()> {
    let capture = audio::start_audio_capture(tuner)?;
    eprintln!(
        "Listening on {} ({} Hz). Press Enter to stop.",
        capture.device_name(),
        capture.sample_rate()
    );

    let shutdown = shutdown_signal();
    let deadline = match seconds {
        Some(secs) => crossbeam_channel::after(Duration::from_secs(secs)),
        None => crossbeam_channel::never(),
    };
    let ticker = crossbeam_channel::tick(refresh);
    let mut last_line = String::new();

    loop {
        select! {
            recv(ticker) -> _ => {
                if tuner.poll() {
                    let snapshot = tuner.snapshot();
                    let line = render(&snapshot, json)?;
                    if line != last_line {
                        println!("{line}");
                        last_line = line;
                    }
                }
            }
            recv(shutdown) -> _ => break,
            recv(deadline) -> _ => break,
        }
    }

    capture.stop(tuner)?;
    let snapshot = tuner.snapshot();
    log::info!("[MAIN] Stopped; frequency now {} Hz", snapshot.frequency);
    Ok(())
}

/// Pushes a generated sine through the same capture pipeline the microphone uses.
fn tone(tuner: &Tuner, frequency: f32, sample_rate: u32, amplitude: f32, json: bool) -> Result<()> {
    anyhow::ensure!(sample_rate > 0, "sample rate must be positive");
    let mut sink = tuner.frame_sink(sample_rate);
    let samples: Vec<f32> = (0..sink.frame_size())
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect();

    let frames = sink.push(&samples);
    log::debug!("[MAIN] Analysed {frames} synthetic frame(s)");
    tuner.poll();
    println!("{}", render(&tuner.snapshot(), json)?);
    Ok(())
}

fn render(snapshot: &TuningSnapshot, json: bool) -> Result<String> {
    if json {
        serde_json::to_string(snapshot).context("failed to serialize reading")
    } else {
        Ok(display::format_reading(snapshot))
    }
}

/// Fires once a line arrives on stdin.
///
/// When stdin is closed the sender is kept alive, so only the deadline (or a
/// signal) ends capture.
fn shutdown_signal() -> Receiver<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(n) if n > 0 => {
                let _ = tx.send(());
            }
            _ => {
                log::debug!("[MAIN] stdin closed; waiting for the deadline");
                loop {
                    thread::park();
                }
            }
        }
    });
    rx
}
