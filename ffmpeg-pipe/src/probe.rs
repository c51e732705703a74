//! Duration probing for the per-timestamp frame strategy.

use crate::error::{PipeError, Result};

/// Longest source accepted from the probe; longer values come from a broken
/// container header.
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Parses ffprobe's `format=duration` output, an ASCII decimal number of
/// seconds, e.g. `"12.345000\n"`.
pub fn parse_duration(output: &str) -> Result<f64> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(PipeError::Probe("empty output".to_string()));
    }
    let secs: f64 = trimmed
        .parse()
        .map_err(|_| PipeError::Probe(format!("not a number: {:?}", trimmed)))?;
    if !secs.is_finite() || !(0.0..=MAX_DURATION_SECS).contains(&secs) {
        return Err(PipeError::Probe(format!("out of range: {}", trimmed)));
    }
    Ok(secs)
}

/// Sampling instants `0, interval, 2 * interval, ...` strictly before
/// `duration`.
pub fn sample_timestamps(duration: f64, interval: f64) -> Vec<f64> {
    if interval <= 0.0 || !interval.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    (0u64..)
        .map(|i| i as f64 * interval)
        .take_while(|t| *t < duration)
        .collect()
}

/// Formats a timestamp for ffmpeg's `-ss`.
pub fn format_timestamp(secs: f64) -> String {
    format!("{:.3}", secs)
}
