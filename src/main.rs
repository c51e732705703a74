use std::sync::Arc;

use clap::Parser;
use ffmpeg_pipe::{
    batch::run_batch,
    events::spawn_event_writer,
    extract::Extractor,
    process::{PipeOptions, ProcessPipe},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AppConfig, Cli},
    sink::DiskSink,
};

mod config;
mod report;
mod sink;
mod source;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .filter_module("ffmpeg_pipe", level)
        .init();
}

#[tokio::main]
async fn main() -> ! {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = AppConfig::from_cli(&cli);

    let code = match run(config).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            log::error!("{:#}", e);
            1
        }
    };

    std::process::exit(code);
}

/// Returns whether every input succeeded.
async fn run(config: AppConfig) -> anyhow::Result<bool> {
    let sources = source::scan_dir(config.input_dir()).await?;
    let sink = DiskSink::create(config.output_dir()).await?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel_clone.cancelled() => {},
            _ = tokio::signal::ctrl_c() => {
                log::warn!("interrupted, stopping running transcoders");
                cancel_clone.cancel();
            },
        }
    });

    let (events, writer) = spawn_event_writer(1024);
    log::info!(
        "Started: {} inputs in {}",
        sources.len(),
        config.input_dir().display()
    );

    let pipe = ProcessPipe::new(PipeOptions {
        timeout: config.extract().timeout,
        cancel: cancel.clone(),
    });
    let extractor = Arc::new(Extractor::new(
        config.extract().clone(),
        pipe,
        sink,
        events,
    ));

    let report = run_batch(extractor, sources).await;
    writer.shutdown().await;
    cancel.cancel();

    report::log_failures(&report);
    if let Some(path) = config.report_path() {
        report::write_json(path, &report).await?;
    }

    log::info!(
        "All done: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    Ok(report.is_success())
}
