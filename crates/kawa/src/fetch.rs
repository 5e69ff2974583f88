use std::path::Path;

use futures::StreamExt;
use reqwest::{header::RANGE, Client};
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    error::{KawaError, KawaResult},
    segment::{http_range, SegmentDescriptor},
};

/// Total attempts for one segment, immediate re-tries. The upstream
/// CDNs recover fast enough that backoff buys nothing here.
pub const SEGMENT_ATTEMPTS: u32 = 5;

/// Download one segment into `destination`.
///
/// A file already present at `destination` is trusted as complete and
/// skipped without network I/O, which is what makes interrupted runs
/// resumable. A failed attempt always removes its partial file before
/// the next attempt or the final error, so `destination` either holds
/// a fully written segment or nothing.
pub async fn fetch_segment(
    client: &Client,
    segment: &SegmentDescriptor,
    destination: &Path,
) -> KawaResult<()> {
    if destination.exists() {
        tracing::debug!(
            "Segment already cached at {}, skipping.",
            destination.display()
        );
        return Ok(());
    }

    let mut attempts = SEGMENT_ATTEMPTS;
    loop {
        match fetch_once(client, segment, destination).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if destination.exists() {
                    tokio::fs::remove_file(destination).await?;
                }

                attempts -= 1;
                if attempts == 0 {
                    tracing::error!("Segment {} failed, retry budget exhausted: {e}", segment.url);
                    return Err(KawaError::SegmentUnavailable(segment.url.to_string()));
                }
                tracing::warn!("Segment {} failed, retrying: {e}", segment.url);
            }
        }
    }
}

async fn fetch_once(
    client: &Client,
    segment: &SegmentDescriptor,
    destination: &Path,
) -> KawaResult<()> {
    let mut request = client.get(segment.url.clone());
    if let Some(range) = &segment.byte_range {
        request = request.header(RANGE, http_range(range));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(KawaError::HttpError(response.status()));
    }

    let mut file = File::create(destination).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    // Readers must never observe a file that looks complete while
    // data is still buffered.
    file.sync_all().await?;

    Ok(())
}
