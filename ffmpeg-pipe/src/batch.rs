//! Runs one extraction per input source, all in parallel, and collects one
//! [`JobOutcome`] per input. A failing or panicking job never stops the
//! others.

use std::{any::Any, collections::HashMap, future::Future, sync::Arc};

use bytes::Bytes;
use tokio::task::JoinSet;

use crate::{
    extract::{ArtifactSink, Extractor, JobOutcome},
    process::Transcoder,
};

/// Where the raw bytes of one unit of work come from.
pub trait ByteSource: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn read(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send;
}

#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    /// Outcomes in completion order.
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn get(&self, name: &str) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.name() == name)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// False as soon as any input failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl From<Vec<JobOutcome>> for BatchReport {
    fn from(outcomes: Vec<JobOutcome>) -> Self {
        Self { outcomes }
    }
}

pub async fn run_batch<T, S, B>(extractor: Arc<Extractor<T, S>>, sources: Vec<B>) -> BatchReport
where
    T: Transcoder + 'static,
    S: ArtifactSink + 'static,
    B: ByteSource,
{
    let mut jobs = JoinSet::new();
    let mut names = HashMap::new();

    for source in sources {
        let name = source.name().to_string();
        let extractor = Arc::clone(&extractor);
        let handle = jobs.spawn(async move {
            let name = source.name();
            match source.read().await {
                Ok(bytes) => extractor.process(bytes, name).await,
                Err(e) => {
                    let error = format!("reading input failed: {:#}", e);
                    extractor.events().error(name, error.as_str()).await;
                    JobOutcome::failed(name, error)
                }
            }
        });
        names.insert(handle.id(), name);
    }

    let mut outcomes = Vec::with_capacity(names.len());
    while let Some(res) = jobs.join_next_with_id().await {
        match res {
            Ok((_, outcome)) => outcomes.push(outcome),
            Err(e) => {
                let name = names.remove(&e.id()).unwrap_or_default();
                let error = if e.is_panic() {
                    format!("job panicked: {}", panic_message(e.into_panic()))
                } else {
                    "job cancelled".to_string()
                };
                log::error!("{}: {}", name, error);
                outcomes.push(JobOutcome::failed(name, error));
            }
        }
    }

    BatchReport { outcomes }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{args::ExtractConfig, extract::extract_test::shared_extractor};

    struct MemorySource {
        name: String,
        bytes: Option<&'static [u8]>,
    }

    impl MemorySource {
        fn new(name: &str, bytes: Option<&'static [u8]>) -> Self {
            Self {
                name: name.to_string(),
                bytes,
            }
        }
    }

    impl ByteSource for MemorySource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn read(&self) -> anyhow::Result<Bytes> {
            self.bytes
                .map(Bytes::from_static)
                .ok_or_else(|| anyhow::anyhow!("permission denied"))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_one_unreadable_input_fails_only_itself() {
        let extractor = shared_extractor(ExtractConfig::default());
        let sources = vec![
            MemorySource::new("a.mp4", Some(&b"first"[..])),
            MemorySource::new("b.mp4", None),
            MemorySource::new("c.mp4", Some(&b"third"[..])),
        ];

        let report = run_batch(extractor.clone(), sources).await;

        assert_eq!(report.outcomes().len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert!(report.get("a.mp4").unwrap().is_success());
        assert!(report.get("c.mp4").unwrap().is_success());
        let error = report.get("b.mp4").unwrap().error().unwrap();
        assert!(error.contains("permission denied"), "{}", error);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_is_reported_as_failure() {
        let extractor = shared_extractor(ExtractConfig::default());
        let sources = vec![
            MemorySource::new("ok.mp4", Some(&b"fine"[..])),
            MemorySource::new("short.mp4", Some(&b"SHORT"[..])),
        ];

        let report = run_batch(extractor, sources).await;

        assert_eq!(report.succeeded(), 1);
        let error = report.get("short.mp4").unwrap().error().unwrap();
        assert!(error.contains("job panicked"), "{}", error);
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let extractor = shared_extractor(ExtractConfig::default());
        let sources = vec![
            MemorySource::new("a.mp4", Some(&b"1"[..])),
            MemorySource::new("b.mp4", Some(&b"2"[..])),
        ];

        let report = run_batch(extractor.clone(), sources).await;

        assert!(report.is_success());
        // one audio + three frames per input
        assert_eq!(extractor.sink().stored.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let extractor = shared_extractor(ExtractConfig::default());
        let report = run_batch(extractor, Vec::<MemorySource>::new()).await;

        assert!(report.outcomes().is_empty());
        assert!(report.is_success());
    }
}
