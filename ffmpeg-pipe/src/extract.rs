//! Per-input extraction: audio and frames run concurrently off the same
//! source bytes, results are handed to an [`ArtifactSink`] once both paths
//! succeeded.

use std::{fmt, future::Future};

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};

use crate::{
    args::{ExtractConfig, FrameStrategy},
    error::{PipeError, Result},
    events::EventSender,
    png::{ImageRecord, demux_png_stream},
    probe::{parse_duration, sample_timestamps},
    process::{TranscodeInvocation, Transcoder},
    wav::patch_wav_header,
};

/// Destination for finished artifacts (local disk, object storage, ...).
pub trait ArtifactSink: Send + Sync {
    fn put_audio(
        &self,
        input_name: &str,
        audio: Bytes,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn put_frame(
        &self,
        input_name: &str,
        index: usize,
        frame: ImageRecord,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Removes whatever was stored for `input_name` (audio plus the first
    /// `frames` frames). Called after a failed write; missing entries are
    /// not an error.
    fn discard(
        &self,
        input_name: &str,
        frames: usize,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug)]
pub enum JobOutcome {
    Succeeded {
        name: String,
        audio: Bytes,
        frames: Vec<ImageRecord>,
    },
    Failed {
        name: String,
        error: String,
    },
}

impl JobOutcome {
    pub fn failed(name: impl Into<String>, error: impl fmt::Display) -> Self {
        JobOutcome::Failed {
            name: name.into(),
            error: error.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            JobOutcome::Succeeded { name, .. } | JobOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobOutcome::Failed { error, .. } => Some(error),
            JobOutcome::Succeeded { .. } => None,
        }
    }
}

pub struct Extractor<T, S> {
    config: ExtractConfig,
    transcoder: T,
    sink: S,
    events: EventSender,
}

impl<T: Transcoder, S: ArtifactSink> Extractor<T, S> {
    pub fn new(config: ExtractConfig, transcoder: T, sink: S, events: EventSender) -> Self {
        Self {
            config,
            transcoder,
            sink,
            events,
        }
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs both extraction paths for one input. Never panics on transcoder
    /// or stream errors; those become [`JobOutcome::Failed`].
    pub async fn process(&self, input: Bytes, name: &str) -> JobOutcome {
        self.events
            .info(name, format!("processing {} bytes", input.len()))
            .await;

        // Bytes clones share the buffer; neither path can disturb the other.
        let paths = tokio::try_join!(
            self.extract_audio(input.clone(), name),
            self.extract_frames(input, name),
        );
        let (audio, frames) = match paths {
            Ok(v) => v,
            Err(e) => return self.fail(name, e).await,
        };

        if let Err(e) = self.store(name, &audio, &frames).await {
            return self.fail(name, e).await;
        }

        self.events
            .info(
                name,
                format!("done: {} bytes of audio, {} frames", audio.len(), frames.len()),
            )
            .await;
        JobOutcome::Succeeded {
            name: name.to_string(),
            audio,
            frames,
        }
    }

    async fn fail(&self, name: &str, e: PipeError) -> JobOutcome {
        self.events
            .error(name, format!("processing {} failed: {}", name, e))
            .await;
        JobOutcome::failed(name, e)
    }

    async fn extract_audio(&self, input: Bytes, name: &str) -> Result<Bytes> {
        self.events.info(name, "extracting audio").await;

        let invocation =
            TranscodeInvocation::new(&self.config.ffmpeg, self.config.audio_args(), input);
        let result = self.transcoder.run(invocation).await?;

        let mut audio: Vec<u8> = result.stdout.into();
        patch_wav_header(&mut audio);
        Ok(Bytes::from(audio))
    }

    async fn extract_frames(&self, input: Bytes, name: &str) -> Result<Vec<ImageRecord>> {
        self.events.info(name, "extracting frames").await;

        match self.config.strategy {
            FrameStrategy::Concatenated => {
                let invocation = TranscodeInvocation::new(
                    &self.config.ffmpeg,
                    self.config.frame_stream_args(),
                    input,
                );
                let result = self.transcoder.run(invocation).await?;

                self.events
                    .debug(
                        name,
                        format!("parsing {} bytes of frames", result.stdout.len()),
                    )
                    .await;
                demux_png_stream(&result.stdout)
            }
            FrameStrategy::PerTimestamp => self.extract_frames_at_timestamps(input, name).await,
        }
    }

    async fn extract_frames_at_timestamps(
        &self,
        input: Bytes,
        name: &str,
    ) -> Result<Vec<ImageRecord>> {
        let probe = TranscodeInvocation::new(
            &self.config.ffprobe,
            self.config.duration_probe_args(),
            input.clone(),
        );
        let output = self.transcoder.run(probe).await?;
        let duration = parse_duration(&String::from_utf8_lossy(&output.stdout))?;

        let timestamps = sample_timestamps(duration, f64::from(self.config.interval_secs()));
        self.events
            .debug(
                name,
                format!("{:.3}s long, sampling {} frames", duration, timestamps.len()),
            )
            .await;

        let invocations: Vec<TranscodeInvocation> = timestamps
            .iter()
            .map(|ts| {
                TranscodeInvocation::new(
                    &self.config.ffmpeg,
                    self.config.frame_at_args(*ts),
                    input.clone(),
                )
            })
            .collect();

        let transcoder = &self.transcoder;
        // `buffered` keeps results in timestamp order regardless of finish order
        let per_timestamp: Vec<Vec<ImageRecord>> = futures::stream::iter(invocations)
            .map(move |invocation| async move {
                let result = transcoder.run(invocation).await?;
                demux_png_stream(&result.stdout)
            })
            .buffered(self.config.frame_concurrency.max(1))
            .try_collect()
            .await?;

        // a timestamp past the last decodable frame yields nothing
        Ok(per_timestamp.into_iter().flatten().collect())
    }

    /// Hands every artifact to the sink; on failure the sink is asked to
    /// drop what it already took, so a failed job leaves nothing behind.
    async fn store(&self, name: &str, audio: &Bytes, frames: &[ImageRecord]) -> Result<()> {
        let written = self.write_artifacts(name, audio, frames).await;
        if written.is_err() {
            if let Err(e) = self.sink.discard(name, frames.len()).await {
                self.events
                    .error(name, format!("cleanup after failed write: {:#}", e))
                    .await;
            }
        }
        written
    }

    async fn write_artifacts(
        &self,
        name: &str,
        audio: &Bytes,
        frames: &[ImageRecord],
    ) -> Result<()> {
        self.events.info(name, "writing audio").await;
        self.sink
            .put_audio(name, audio.clone())
            .await
            .map_err(|e| PipeError::Sink(format!("{:#}", e)))?;

        self.events
            .info(name, format!("writing {} frames", frames.len()))
            .await;
        for (index, frame) in frames.iter().enumerate() {
            self.sink
                .put_frame(name, index, frame.clone())
                .await
                .map_err(|e| PipeError::Sink(format!("{:#}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
pub(crate) mod extract_test;
