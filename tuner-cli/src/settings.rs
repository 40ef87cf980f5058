//! Settings file handling and command-line overrides.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tuner_core::TunerSettings;

use crate::cli::Args;

/// Loads tuner settings from a JSON file.
///
/// Missing fields take their defaults and out-of-range values are clamped,
/// so hand-edited files always produce a valid configuration.
pub fn load_settings(path: &Path) -> Result<TunerSettings> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    let settings = serde_json::from_str(&data)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    Ok(settings)
}

/// Saves tuner settings as pretty-printed JSON.
pub fn save_settings(settings: &TunerSettings, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(settings).context("failed to serialize settings")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write settings to {}", path.display()))?;
    Ok(())
}

/// Settings file (if any) with command-line flags layered on top.
pub fn resolve(args: &Args) -> Result<TunerSettings> {
    let mut settings = match &args.settings {
        Some(path) if path.exists() => {
            log::info!("[SETTINGS] Loading {}", path.display());
            load_settings(path)?
        }
        Some(path) => {
            log::info!("[SETTINGS] {} does not exist yet, using defaults", path.display());
            TunerSettings::default()
        }
        None => TunerSettings::default(),
    };
    apply_overrides(&mut settings, args);
    Ok(settings)
}

pub fn apply_overrides(settings: &mut TunerSettings, args: &Args) {
    if let Some(reference) = args.reference_pitch {
        settings.tuning.set_reference_pitch(reference);
    }
    if let Some(tolerance) = args.tolerance {
        settings.tuning.set_tolerance(tolerance);
    }
    if let Some(instrument) = args.instrument {
        settings.instrument = instrument;
    }
    if let Some(fft_size) = args.fft_size {
        settings.fft_size = fft_size;
    }
}
