use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use ffmpeg_pipe::{extract::ArtifactSink, png::ImageRecord};

/// Writes artifacts under `<out>/audio` and `<out>/images`.
pub struct DiskSink {
    audio_dir: PathBuf,
    images_dir: PathBuf,
}

impl DiskSink {
    pub async fn create(output_dir: &Path) -> anyhow::Result<Self> {
        let audio_dir = output_dir.join("audio");
        let images_dir = output_dir.join("images");
        for dir in [&audio_dir, &images_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self {
            audio_dir,
            images_dir,
        })
    }

    pub fn audio_path(&self, input_name: &str) -> PathBuf {
        self.audio_dir.join(format!("{}-audio.wav", input_name))
    }

    pub fn frame_path(&self, input_name: &str, index: usize) -> PathBuf {
        self.images_dir
            .join(format!("{}-image-{}.png", input_name, index))
    }
}

impl ArtifactSink for DiskSink {
    async fn put_audio(&self, input_name: &str, audio: Bytes) -> anyhow::Result<()> {
        let path = self.audio_path(input_name);
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    async fn put_frame(
        &self,
        input_name: &str,
        index: usize,
        frame: ImageRecord,
    ) -> anyhow::Result<()> {
        let path = self.frame_path(input_name, index);
        tokio::fs::write(&path, frame.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    async fn discard(&self, input_name: &str, frames: usize) -> anyhow::Result<()> {
        let paths = std::iter::once(self.audio_path(input_name))
            .chain((0..frames).map(|i| self.frame_path(input_name, i)));
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to remove {}", path.display()));
                }
            }
        }
        Ok(())
    }
}
