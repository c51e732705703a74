use std::time::Duration;

use crate::probe::format_timestamp;

/// How still frames are pulled out of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStrategy {
    /// One ffmpeg run emitting a concatenated PNG stream, split afterwards.
    #[default]
    Concatenated,
    /// Probe the duration, then one single-frame ffmpeg run per timestamp.
    PerTimestamp,
}

/// Extraction configuration
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    // seconds between two sampled frames
    pub frame_interval: u32,
    pub strategy: FrameStrategy,
    // None = no limit
    pub timeout: Option<Duration>,
    // parallel single-frame runs, PerTimestamp only
    pub frame_concurrency: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            frame_interval: 3,
            strategy: FrameStrategy::Concatenated,
            timeout: None,
            frame_concurrency: 4,
        }
    }
}

impl ExtractConfig {
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder::default()
    }

    /// Seconds between sampled frames, never zero.
    pub fn interval_secs(&self) -> u32 {
        self.frame_interval.max(1)
    }

    /// Streamed WAV without metadata chunks, so the header stays 44 bytes.
    pub fn audio_args(&self) -> Vec<String> {
        to_args(&["-hide_banner", "-i", "-", "-vn", "-f", "wav", "-bitexact", "-"])
    }

    /// One PNG every `frame_interval` seconds, concatenated on stdout.
    pub fn frame_stream_args(&self) -> Vec<String> {
        let fps = format!("fps=1/{}", self.interval_secs());
        to_args(&[
            "-hide_banner",
            "-i",
            "-",
            "-vf",
            &fps,
            "-c:v",
            "png",
            "-f",
            "image2pipe",
            "-",
        ])
    }

    /// A single PNG taken at `secs`.
    pub fn frame_at_args(&self, secs: f64) -> Vec<String> {
        let ts = format_timestamp(secs);
        to_args(&[
            "-hide_banner",
            "-i",
            "-",
            "-ss",
            &ts,
            "-frames:v",
            "1",
            "-c:v",
            "png",
            "-f",
            "image2pipe",
            "-",
        ])
    }

    /// ffprobe arguments printing the container duration in seconds.
    pub fn duration_probe_args(&self) -> Vec<String> {
        to_args(&[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            "-i",
            "-",
        ])
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[derive(Default)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn ffmpeg(mut self, command: impl Into<String>) -> Self {
        self.config.ffmpeg = command.into();
        self
    }

    pub fn ffprobe(mut self, command: impl Into<String>) -> Self {
        self.config.ffprobe = command.into();
        self
    }

    /// Seconds between sampled frames, clamped to at least 1.
    pub fn frame_interval(mut self, secs: u32) -> Self {
        self.config.frame_interval = secs.max(1);
        self
    }

    pub fn strategy(mut self, strategy: FrameStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn frame_concurrency(mut self, n: usize) -> Self {
        self.config.frame_concurrency = n.max(1);
        self
    }

    pub fn build(self) -> ExtractConfig {
        self.config
    }
}
