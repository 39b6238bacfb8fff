//! Download worker - runs the engine, logs its events and writes the payload

use anyhow::Context;
use log::{debug, info, warn};
use range_dl::{DownloadRequest, Downloader, EventSink, TransferEvent, TransferHandle};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedReceiver;

use super::types::DownloadSummary;
use crate::cli::GetArgs;
use crate::config::AppConfig;

const DEFAULT_FILE_NAME: &str = "download.bin";

fn usable_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Local file name for `url`: its decoded last path segment, else the file id.
pub fn output_path(url: &str, file_id: Option<&str>) -> PathBuf {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    let from_url = after_scheme
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').next())
        .and_then(|segment| urlencoding::decode(segment).ok())
        .map(|name| name.into_owned())
        .filter(|name| usable_name(name));

    match from_url {
        Some(name) => PathBuf::from(name),
        None => PathBuf::from(
            file_id
                .filter(|id| usable_name(id))
                .unwrap_or(DEFAULT_FILE_NAME),
        ),
    }
}

fn format_speed(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
    let mut value = bytes_per_second;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

async fn report_events(mut rx: UnboundedReceiver<TransferEvent>, label: String) {
    let mut last_decile: Option<u32> = None;
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::Progress { percent } => {
                let decile = (percent / 10.0).floor() as u32;
                if last_decile.map_or(true, |last| decile > last) {
                    last_decile = Some(decile);
                    info!("download_progress: {} percent={:.1}", label, percent);
                } else {
                    debug!("download_progress: {} percent={:.2}", label, percent);
                }
            }
            TransferEvent::Speed { bytes_per_second } => {
                debug!(
                    "download_speed: {} speed={}",
                    label,
                    format_speed(bytes_per_second)
                );
            }
            TransferEvent::FallbackStarted { reason } => {
                warn!("download_fallback: {} reason={}", label, reason);
            }
        }
    }
}

async fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let mut file = File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.flush().await?;
    Ok(())
}

/// Download `args.url` and save it. Nothing is written unless the download completes.
pub async fn run_get(config: &AppConfig, args: &GetArgs) -> anyhow::Result<DownloadSummary> {
    let client = Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let downloader = Downloader::new(client, config.transfer.clone())
        .with_fallback(config.client.proxy_base.clone());

    let mut request = DownloadRequest::new(args.url.clone());
    if let Some(id) = &args.id {
        request = request.with_file_id(id.clone());
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| output_path(&args.url, args.id.as_deref()));
    let label = output.display().to_string();

    let (events, rx) = EventSink::channel();
    let handle = TransferHandle::new(events);
    let reporter = tokio::spawn(report_events(rx, label.clone()));
    let stopper = handle.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("download_interrupt: ctrl-c received");
            stopper.stop();
        }
    });

    info!("download_start: {} url={}", label, args.url);
    let started = Instant::now();
    let result = downloader.download(&request, &handle).await;

    interrupt.abort();
    handle.events().close();
    let _ = reporter.await;

    let download = result.with_context(|| format!("download of {} failed", args.url))?;
    write_output(&output, &download.bytes).await?;

    let summary = DownloadSummary {
        path: output,
        bytes: download.bytes.len() as u64,
        via: download.via,
        elapsed_ms: started.elapsed().as_millis(),
    };
    info!(
        "download_saved: {} bytes={} via={:?} elapsed_ms={}",
        label, summary.bytes, summary.via, summary.elapsed_ms
    );
    Ok(summary)
}
