use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use ffmpeg_pipe::batch::ByteSource;

/// One file of the input directory.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

impl ByteSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> anyhow::Result<Bytes> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        Ok(Bytes::from(data))
    }
}

/// Every regular file directly inside `dir`, sorted by name. Subdirectories
/// are not descended into.
pub async fn scan_dir(dir: &Path) -> anyhow::Result<Vec<FileSource>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("input directory {} does not exist", dir.display()))?;

    let mut sources = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // follows symlinks
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if metadata.is_file() {
            sources.push(FileSource::new(path));
        }
    }
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_dir_lists_files_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("b.mp4"), b"bbb")?;
        std::fs::write(dir.path().join("a.mkv"), b"aa")?;
        std::fs::create_dir(dir.path().join("nested"))?;
        std::fs::write(dir.path().join("nested").join("c.mp4"), b"c")?;

        let sources = scan_dir(dir.path()).await?;

        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a.mkv", "b.mp4"]);
        assert_eq!(&sources[1].read().await?[..], b"bbb");
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("input");

        let err = scan_dir(&missing).await.unwrap_err();

        assert!(format!("{:#}", err).contains("does not exist"));
    }

    #[tokio::test]
    async fn test_read_vanished_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("gone.mp4"));

        assert_eq!(source.name(), "gone.mp4");
        assert!(source.read().await.is_err());
    }
}
