//! Job progress events.
//!
//! Components get an [`EventSender`] injected instead of writing to a global
//! logger. Events go through a bounded queue to a single [`EventWriter`] task
//! which forwards them to the `log` facade. [`EventWriter::shutdown`] closes
//! the queue and writes out everything still queued before returning.

use log::Level;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Event {
    pub level: Level,
    /// Input name the event belongs to, None for batch-level events.
    pub job: Option<String>,
    pub message: String,
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// A sender whose events go nowhere.
    pub fn disabled() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self { tx }
    }

    pub async fn emit(&self, level: Level, job: Option<&str>, message: impl Into<String>) {
        let event = Event {
            level,
            job: job.map(str::to_string),
            message: message.into(),
        };
        // receiver gone = writer shut down or disabled
        let _ = self.tx.send(event).await;
    }

    pub async fn info(&self, job: &str, message: impl Into<String>) {
        self.emit(Level::Info, Some(job), message).await
    }

    pub async fn debug(&self, job: &str, message: impl Into<String>) {
        self.emit(Level::Debug, Some(job), message).await
    }

    pub async fn error(&self, job: &str, message: impl Into<String>) {
        self.emit(Level::Error, Some(job), message).await
    }
}

/// Creates the queue and spawns its consumer.
pub fn spawn_event_writer(capacity: usize) -> (EventSender, EventWriter) {
    spawn_event_writer_with(capacity, write_to_log)
}

/// Like [`spawn_event_writer`] with a custom consumer, mostly for tests.
pub fn spawn_event_writer_with<F>(capacity: usize, mut write: F) -> (EventSender, EventWriter)
where
    F: FnMut(Event) + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));
    let shutdown = CancellationToken::new();

    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = rx.recv() => match event {
                    Some(event) => write(event),
                    None => return,
                },
                _ = shutdown_clone.cancelled() => break,
            }
        }
        // no new events after close, but everything already queued is written
        rx.close();
        while let Some(event) = rx.recv().await {
            write(event);
        }
    });

    (EventSender { tx }, EventWriter { shutdown, handle })
}

pub struct EventWriter {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl EventWriter {
    /// Stops accepting events and waits until the queue is drained.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            log::error!("event writer task failed: {}", e);
        }
    }
}

fn write_to_log(event: Event) {
    match event.job {
        Some(job) => log::log!(target: "ffmpeg_pipe::job", event.level, "[{}] {}", job, event.message),
        None => log::log!(target: "ffmpeg_pipe::job", event.level, "{}", event.message),
    }
}
