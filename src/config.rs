use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use ffmpeg_pipe::args::{ExtractConfig, FrameStrategy};

#[derive(Parser, Debug)]
#[command(
    name = "av-extract",
    about = "Extract the audio track and periodic still frames of every video in a directory"
)]
pub struct Cli {
    /// Directory whose files are processed
    #[arg(default_value = "input")]
    pub input: PathBuf,

    /// Output directory, `audio/` and `images/` are created inside
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Seconds between two sampled frames
    #[arg(long, default_value_t = 3)]
    pub interval: u32,

    /// How frames are extracted
    #[arg(long, value_enum, default_value_t = Strategy::Stream)]
    pub strategy: Strategy,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe executable (seek strategy only)
    #[arg(long, env = "FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    /// Kill a transcoder run after this many seconds (0 = never)
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Parallel single-frame runs per input (seek strategy only)
    #[arg(long, default_value_t = 4)]
    pub frame_jobs: usize,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// One ffmpeg run, concatenated PNG output split afterwards
    Stream,
    /// Probe the duration, then one ffmpeg run per sampled timestamp
    Seek,
}

impl From<Strategy> for FrameStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Stream => FrameStrategy::Concatenated,
            Strategy::Seek => FrameStrategy::PerTimestamp,
        }
    }
}

pub struct AppConfig {
    input_dir: PathBuf,
    output_dir: PathBuf,
    report_path: Option<PathBuf>,
    extract: ExtractConfig,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));
        let extract = ExtractConfig::builder()
            .ffmpeg(&cli.ffmpeg)
            .ffprobe(&cli.ffprobe)
            .frame_interval(cli.interval)
            .strategy(cli.strategy.into())
            .timeout(timeout)
            .frame_concurrency(cli.frame_jobs)
            .build();

        Self {
            input_dir: cli.input.clone(),
            output_dir: cli.output.clone(),
            report_path: cli.report.clone(),
            extract,
        }
    }

    pub fn input_dir(&self) -> &PathBuf {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn report_path(&self) -> Option<&PathBuf> {
        self.report_path.as_ref()
    }

    pub fn extract(&self) -> &ExtractConfig {
        &self.extract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["av-extract"]).unwrap();
        let config = AppConfig::from_cli(&cli);

        assert_eq!(config.input_dir(), &PathBuf::from("input"));
        assert_eq!(config.output_dir(), &PathBuf::from("output"));
        assert!(config.report_path().is_none());
        assert_eq!(config.extract().frame_interval, 3);
        assert_eq!(config.extract().strategy, FrameStrategy::Concatenated);
        assert!(config.extract().timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "av-extract",
            "videos",
            "-o",
            "out",
            "--interval",
            "10",
            "--strategy",
            "seek",
            "--ffmpeg",
            "/usr/local/bin/ffmpeg",
            "--timeout",
            "90",
            "--report",
            "run.json",
            "-vv",
        ])
        .unwrap();
        let config = AppConfig::from_cli(&cli);

        assert_eq!(cli.verbose, 2);
        assert_eq!(config.input_dir(), &PathBuf::from("videos"));
        assert_eq!(config.output_dir(), &PathBuf::from("out"));
        assert_eq!(config.report_path(), Some(&PathBuf::from("run.json")));
        assert_eq!(config.extract().ffmpeg, "/usr/local/bin/ffmpeg");
        assert_eq!(config.extract().frame_interval, 10);
        assert_eq!(config.extract().strategy, FrameStrategy::PerTimestamp);
        assert_eq!(config.extract().timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        assert!(Cli::try_parse_from(["av-extract", "--strategy", "magic"]).is_err());
    }
}
