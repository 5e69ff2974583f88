use std::{
    future::Future,
    io::SeekFrom,
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use futures::StreamExt;
use reqwest::{
    header::{CONTENT_RANGE, RANGE},
    Client, StatusCode, Url,
};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncSeekExt, AsyncWriteExt},
    task::JoinSet,
};

use crate::error::{KawaError, KawaResult};

/// Whole-file downloader used on the direct branch. Deliberately
/// narrow so any capability-compatible implementation substitutes.
pub trait DirectDownloader {
    fn download(
        &self,
        url: &Url,
        target_dir: &Path,
        file_name: &str,
    ) -> impl Future<Output = KawaResult<PathBuf>> + Send;
}

/// Range-request fan-out over one large resource. Servers that do not
/// honor range requests get a single streaming connection instead.
pub struct MultiConnectionDownloader {
    client: Client,
    connections: NonZeroU32,
}

impl MultiConnectionDownloader {
    pub fn new(client: Client, connections: NonZeroU32) -> Self {
        Self {
            client,
            connections,
        }
    }

    /// A one-byte range probe; servers that honor it reveal the total
    /// length in `Content-Range`.
    async fn probe_total_length(&self, url: &Url) -> KawaResult<Option<u64>> {
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, "bytes=0-0")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(KawaError::HttpError(response.status()));
        }
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Ok(None);
        }

        Ok(response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.rsplit_once('/'))
            .and_then(|(_, total)| total.parse().ok()))
    }

    async fn download_single(&self, url: &Url, destination: &Path) -> KawaResult<()> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(KawaError::HttpError(response.status()));
        }

        let mut file = File::create(destination).await?;
        let write_result: KawaResult<()> = async {
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        // A truncated file must not survive to be mistaken for a
        // completed direct download.
        if let Err(e) = write_result {
            drop(file);
            let _ = tokio::fs::remove_file(destination).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Fetch one range and write it at its own offset. Every task opens
/// its own handle, so the file positions never interfere.
async fn write_range(
    client: Client,
    url: Url,
    destination: PathBuf,
    start: u64,
    end: u64,
) -> KawaResult<()> {
    let response = client
        .get(url)
        .header(RANGE, format!("bytes={start}-{end}"))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(KawaError::HttpError(response.status()));
    }

    let mut file = OpenOptions::new().write(true).open(&destination).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

impl DirectDownloader for MultiConnectionDownloader {
    async fn download(&self, url: &Url, target_dir: &Path, file_name: &str) -> KawaResult<PathBuf> {
        let destination = target_dir.join(file_name);
        let connections = self.connections.get() as u64;

        let total = match self.probe_total_length(url).await? {
            Some(total) if total > 0 && connections > 1 => total,
            _ => {
                tracing::debug!("Range requests unavailable, using a single connection.");
                self.download_single(url, &destination).await?;
                return Ok(destination);
            }
        };

        let chunk = total.div_ceil(connections);
        let part_count = total.div_ceil(chunk);
        tracing::debug!("Downloading {total} bytes over {part_count} connection(s).");

        // Preallocated to the full length so ranges land at their
        // offsets as they arrive; nothing is buffered in memory.
        File::create(&destination).await?.set_len(total).await?;

        let mut tasks: JoinSet<KawaResult<()>> = JoinSet::new();
        for part in 0..part_count {
            let start = part * chunk;
            let end = (start + chunk - 1).min(total - 1);
            tasks.spawn(write_range(
                self.client.clone(),
                url.clone(),
                destination.clone(),
                start,
                end,
            ));
        }

        let mut first_error: Option<KawaError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(KawaError::JoinError(e));
                }
            }
        }
        if let Some(e) = first_error {
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e);
        }

        OpenOptions::new()
            .write(true)
            .open(&destination)
            .await?
            .sync_all()
            .await?;
        Ok(destination)
    }
}
