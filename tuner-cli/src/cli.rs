use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tuner_core::Instrument;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
///Guitar and ukulele tuner
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    ///Reference pitch for A4 in Hz (clamped to 431-449)
    pub reference_pitch: Option<f32>,

    #[arg(short, long, global = true)]
    ///In-tune band in cents (clamped to 10-100)
    pub tolerance: Option<f32>,

    #[arg(short, long, global = true)]
    ///Instrument: guitar, ukulele
    pub instrument: Option<Instrument>,

    #[arg(long, global = true)]
    ///FFT size in samples (rounded up to a power of two)
    pub fft_size: Option<usize>,

    #[arg(short, long, global = true)]
    ///Settings file (JSON) to load
    pub settings: Option<PathBuf>,

    #[arg(long, global = true)]
    ///Write the effective settings back to the settings file
    pub save_settings: bool,

    #[arg(long, global = true)]
    ///Print readings as JSON lines
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    ///Tune from the default microphone
    Listen {
        #[arg(long)]
        ///Stop after this many seconds (default: until Enter is pressed)
        seconds: Option<u64>,

        #[arg(long, default_value_t = 50)]
        ///Readout refresh interval in milliseconds
        refresh_ms: u64,
    },
    ///Run a synthetic sine tone through the tuner
    Tone {
        ///Tone frequency in Hz
        frequency: f32,

        #[arg(long, default_value_t = 44_100)]
        ///Sample rate of the generated tone
        sample_rate: u32,

        #[arg(long, default_value_t = 0.5)]
        ///Peak amplitude of the generated tone
        amplitude: f32,
    },
    ///List the strings of the selected instrument with their target frequencies
    Strings,
}
