use std::path::Path;

use anyhow::Context;
use ffmpeg_pipe::{batch::BatchReport, extract::JobOutcome};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct RunSummary<'a> {
    pub succeeded: usize,
    pub failed: usize,
    pub jobs: Vec<JobSummary<'a>>,
}

#[derive(Serialize, Debug)]
pub struct JobSummary<'a> {
    pub name: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

/// Jobs are listed by input name, not completion order.
pub fn summarize(report: &BatchReport) -> RunSummary<'_> {
    let mut jobs: Vec<JobSummary<'_>> = report
        .outcomes()
        .iter()
        .map(|outcome| match outcome {
            JobOutcome::Succeeded {
                name,
                audio,
                frames,
            } => JobSummary {
                name: name.as_str(),
                ok: true,
                audio_bytes: Some(audio.len()),
                frames: Some(frames.len()),
                error: None,
            },
            JobOutcome::Failed { name, error } => JobSummary {
                name: name.as_str(),
                ok: false,
                audio_bytes: None,
                frames: None,
                error: Some(error.as_str()),
            },
        })
        .collect();
    jobs.sort_by(|a, b| a.name.cmp(b.name));

    RunSummary {
        succeeded: report.succeeded(),
        failed: report.failed(),
        jobs,
    }
}

pub async fn write_json(path: &Path, report: &BatchReport) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(&summarize(report))?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report {}", path.display()))
}

/// One line per failed input, for the end of the run log.
pub fn log_failures(report: &BatchReport) {
    for outcome in report.outcomes() {
        if let JobOutcome::Failed { name, error } = outcome {
            log::error!("{} failed:\n{}", name, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn report() -> BatchReport {
        BatchReport::from(vec![
            JobOutcome::failed("b.mp4", "`ffmpeg` exited with error code 1"),
            JobOutcome::Succeeded {
                name: "a.mp4".to_string(),
                audio: Bytes::from_static(&[0u8; 44]),
                frames: Vec::new(),
            },
        ])
    }

    #[test]
    fn test_summary_is_sorted_by_name() {
        let report = report();
        let summary = summarize(&report);

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.jobs[0].name, "a.mp4");
        assert_eq!(summary.jobs[0].audio_bytes, Some(44));
        assert_eq!(summary.jobs[1].name, "b.mp4");
        assert!(!summary.jobs[1].ok);
    }

    #[tokio::test]
    async fn test_write_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.json");

        write_json(&path, &report()).await?;

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
        assert_eq!(value["failed"], 1);
        assert_eq!(value["jobs"][0]["frames"], 0);
        assert!(value["jobs"][0].get("error").is_none());
        assert_eq!(value["jobs"][1]["error"], "`ffmpeg` exited with error code 1");
        Ok(())
    }
}
