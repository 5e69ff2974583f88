mod provider;

use std::{num::NonZeroU32, path::PathBuf, time::Duration};

use anyhow::bail;
use clap::Parser;
use fake_user_agent::get_chrome_rua;
use kawa::{
    acquire::{AcquisitionJob, AcquisitionStrategy},
    direct::MultiConnectionDownloader,
    progress,
    transcode::{EncodeJob, FfmpegEncoder, TranscodeOrchestrator},
    MetadataProvider,
};
use reqwest::{Client, ClientBuilder};
use url::Url;

use crate::provider::HttpMetadataProvider;

#[derive(Parser, Debug, Clone)]
pub struct KawaArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Concurrent segment downloads
    #[clap(long, default_value = "20")]
    threads: NonZeroU32,

    /// Parallel connections for the direct-download path
    #[clap(long, default_value = "5")]
    connections: NonZeroU32,

    /// Output directory
    #[clap(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Temporary segment directory
    #[clap(long, env = "KAWA_TEMP", default_value = "./temp")]
    temp_dir: PathBuf,

    /// Target containers to transcode into
    #[clap(long, default_value = "flv,mp4", value_delimiter = ',')]
    formats: Vec<String>,

    /// VOD metadata endpoint base URL
    #[clap(long)]
    api: Url,

    /// Asset (VOD) id
    asset_id: String,
}

impl KawaArgs {
    fn client(&self) -> Client {
        ClientBuilder::new()
            .user_agent(get_chrome_rua())
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap()
    }

    fn encode_jobs(&self) -> anyhow::Result<Vec<EncodeJob>> {
        let mut jobs = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            let Some(job) = EncodeJob::for_extension(format, &self.output_dir, &self.asset_id)
            else {
                bail!("Unsupported target format: {format}");
            };
            jobs.push(job);
        }
        Ok(jobs)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = KawaArgs::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    tokio::fs::create_dir_all(&args.output_dir).await?;
    tokio::fs::create_dir_all(&args.temp_dir).await?;

    let client = args.client();
    let progress = progress::log_sink();

    tracing::info!("Fetching asset metadata...");
    let provider = HttpMetadataProvider::new(client.clone(), args.api.clone());
    let descriptor = provider.fetch_asset_descriptor(&args.asset_id).await?;

    let job = AcquisitionJob {
        asset_id: args.asset_id.clone(),
        output_dir: args.output_dir.clone(),
        temp_dir: args.temp_dir.clone(),
        concurrency: args.threads,
    };
    let direct = MultiConnectionDownloader::new(client.clone(), args.connections);
    let strategy =
        AcquisitionStrategy::new(client.clone(), direct).with_progress(progress.clone());

    let acquired = strategy.acquire(&descriptor, &job).await?;
    tracing::info!("Acquired stream at {}.", acquired.path.display());

    let jobs = args.encode_jobs()?;
    if !jobs.is_empty() {
        let orchestrator = TranscodeOrchestrator::new(FfmpegEncoder::new()?, progress);
        orchestrator.transcode(&acquired.path, jobs).await?;
    }

    tracing::info!(
        "All finished. Please checkout your files at {}",
        args.output_dir.display()
    );
    Ok(())
}
