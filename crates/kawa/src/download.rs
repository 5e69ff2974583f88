use std::{
    future::Future,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::Client;
use tokio::{
    sync::{Mutex, Semaphore},
    task::JoinSet,
};

use crate::{
    error::{KawaError, KawaResult},
    fetch::fetch_segment,
    progress::{log_sink, ProgressEvent, SharedProgressSink},
    segment::SegmentDescriptor,
};

/// Drives one worker per segment under a global concurrency cap.
///
/// Completion order is unconstrained; results are collected by
/// sequence index so the returned path list is always in manifest
/// order.
pub struct ParallelFetcher {
    client: Client,
    concurrency: NonZeroU32,
    progress: SharedProgressSink,
}

impl ParallelFetcher {
    pub fn new(client: Client, concurrency: NonZeroU32) -> Self {
        Self {
            client,
            concurrency,
            progress: log_sink(),
        }
    }

    pub fn with_progress(mut self, progress: SharedProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Download every segment into `temp_dir` and return the cache
    /// paths in manifest order.
    pub async fn fetch_all(
        &self,
        asset_id: &str,
        segments: Vec<SegmentDescriptor>,
        temp_dir: &Path,
    ) -> KawaResult<Vec<PathBuf>> {
        let client = self.client.clone();
        let asset_id = asset_id.to_string();
        let temp_dir = temp_dir.to_path_buf();

        self.run_all(segments, move |segment| {
            let client = client.clone();
            let destination = segment.cache_path(&asset_id, &temp_dir);
            async move {
                fetch_segment(&client, &segment, &destination).await?;
                Ok(destination)
            }
        })
        .await
    }

    /// Run `worker` for every segment, at most `concurrency` in
    /// flight. Segment sequences must be contiguous from zero.
    ///
    /// A worker failure does not stop workers already launched, but
    /// the first error is propagated once all in-flight work settles
    /// and no partial result set is ever returned.
    pub async fn run_all<W, Fut>(
        &self,
        segments: Vec<SegmentDescriptor>,
        worker: W,
    ) -> KawaResult<Vec<PathBuf>>
    where
        W: Fn(SegmentDescriptor) -> Fut,
        Fut: Future<Output = KawaResult<PathBuf>> + Send + 'static,
    {
        let total = segments.len();
        let permits = Arc::new(Semaphore::new(self.concurrency.get() as usize));
        let completed = Arc::new(Mutex::new(0usize));

        tracing::info!(
            "Downloading {total} segments with {} thread(s).",
            self.concurrency.get()
        );

        let mut tasks: JoinSet<(usize, KawaResult<PathBuf>)> = JoinSet::new();
        for segment in segments {
            let index = segment.sequence as usize;
            let permit = permits.clone().acquire_owned().await.unwrap();
            let completed = completed.clone();
            let progress = self.progress.clone();
            let fut = worker(segment);

            tasks.spawn(async move {
                let result = fut.await;
                drop(permit);

                if result.is_ok() {
                    // The counter lock also serializes the emission,
                    // keeping reported percentages non-decreasing.
                    let mut done = completed.lock().await;
                    *done += 1;
                    let percent = (*done as f64 * 100.0 / total as f64).round() as u32;
                    progress.emit(ProgressEvent::Download { percent });
                }

                (index, result)
            });
        }

        let mut slots: Vec<Option<PathBuf>> = vec![None; total];
        let mut first_error: Option<KawaError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(path))) => slots[index] = Some(path),
                Ok((_, Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(KawaError::JoinError(e));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.expect("segment sequences must be contiguous from zero"))
            .collect())
    }
}
