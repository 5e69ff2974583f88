use std::{num::NonZeroU32, path::PathBuf};

use reqwest::Client;

use crate::{
    direct::DirectDownloader,
    download::ParallelFetcher,
    error::KawaResult,
    manifest::ManifestResolver,
    merge::concat_merge,
    metadata::AssetDescriptor,
    progress::{log_sink, SharedProgressSink},
    segment::ContainerFormat,
};

/// Run-level parameters of one acquisition.
#[derive(Debug, Clone)]
pub struct AcquisitionJob {
    pub asset_id: String,
    pub output_dir: PathBuf,
    /// Where segment files land. Left in place after the run for
    /// resumability and inspection; cleanup belongs to the caller.
    pub temp_dir: PathBuf,
    pub concurrency: NonZeroU32,
}

/// Where the contiguous stream landed and which container it is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredAsset {
    pub path: PathBuf,
    pub container: ContainerFormat,
}

/// Chooses between the direct whole-file path and the segmented path.
pub struct AcquisitionStrategy<D> {
    client: Client,
    direct: D,
    progress: SharedProgressSink,
}

impl<D> AcquisitionStrategy<D>
where
    D: DirectDownloader + Send + Sync,
{
    pub fn new(client: Client, direct: D) -> Self {
        Self {
            client,
            direct,
            progress: log_sink(),
        }
    }

    pub fn with_progress(mut self, progress: SharedProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Direct download when the descriptor advertises a ready direct
    /// URL; segmented otherwise. A direct failure of any kind falls
    /// through to the segmented path instead of aborting, since a
    /// transient direct error says nothing about the variants.
    pub async fn acquire(
        &self,
        descriptor: &AssetDescriptor,
        job: &AcquisitionJob,
    ) -> KawaResult<AcquiredAsset> {
        if let Some(direct_url) = descriptor.direct_ready() {
            let file_name = format!("{}.{}", job.asset_id, ContainerFormat::Mp4.as_ext());
            tracing::info!("Asset is transcoded upstream, trying direct download.");
            match self
                .direct
                .download(direct_url, &job.output_dir, &file_name)
                .await
            {
                Ok(path) => {
                    return Ok(AcquiredAsset {
                        path,
                        container: ContainerFormat::Mp4,
                    })
                }
                Err(e) => {
                    tracing::warn!("Direct download failed, falling back to segments: {e}");
                }
            }
        }

        self.acquire_segmented(descriptor, job).await
    }

    async fn acquire_segmented(
        &self,
        descriptor: &AssetDescriptor,
        job: &AcquisitionJob,
    ) -> KawaResult<AcquiredAsset> {
        let variant = descriptor.best_variant()?;
        tracing::info!(
            "Selected variant with resolution rank {}.",
            variant.resolution
        );

        let segments = ManifestResolver::new(self.client.clone())
            .resolve(&variant.manifest_url)
            .await?;

        let fetcher = ParallelFetcher::new(self.client.clone(), job.concurrency)
            .with_progress(self.progress.clone());
        let paths = fetcher
            .fetch_all(&job.asset_id, segments, &job.temp_dir)
            .await?;

        let output = job
            .output_dir
            .join(format!("{}.{}", job.asset_id, ContainerFormat::Mpeg2Ts.as_ext()));
        tracing::info!("Merging {} segments...", paths.len());
        concat_merge(&paths, &output).await?;

        Ok(AcquiredAsset {
            path: output,
            container: ContainerFormat::Mpeg2Ts,
        })
    }
}
