use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use kawa::{
    acquire::{AcquisitionJob, AcquisitionStrategy},
    direct::DirectDownloader,
    progress::null_sink,
    AssetDescriptor, ContainerFormat, KawaError, KawaResult, TranscodeStatus, VariantDescriptor,
};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

struct FailingDirect;

impl DirectDownloader for FailingDirect {
    async fn download(&self, _url: &Url, _dir: &Path, _name: &str) -> KawaResult<PathBuf> {
        Err(KawaError::HttpError(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

struct StubDirect;

impl DirectDownloader for StubDirect {
    async fn download(&self, _url: &Url, dir: &Path, name: &str) -> KawaResult<PathBuf> {
        let destination = dir.join(name);
        tokio::fs::write(&destination, b"direct bytes").await?;
        Ok(destination)
    }
}

async fn mock_segmented_asset(server: &MockServer) -> AssetDescriptor {
    Mock::given(method("GET"))
        .and(path("/vod/playlist.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-VERSION:3
#EXTINF:2.0,
seg0.ts
#EXTINF:2.0,
seg1.ts
#EXT-X-ENDLIST
",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vod/seg0.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"alpha-".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vod/seg1.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"beta".to_vec()))
        .mount(server)
        .await;

    AssetDescriptor {
        direct_url: Some(Url::parse(&format!("{}/direct/full.mp4", server.uri())).unwrap()),
        status: TranscodeStatus::Ready,
        variants: vec![VariantDescriptor {
            manifest_url: Url::parse(&format!("{}/vod/playlist.m3u8", server.uri())).unwrap(),
            resolution: 1080,
        }],
    }
}

fn job(output_dir: &Path, temp_dir: &Path) -> AcquisitionJob {
    AcquisitionJob {
        asset_id: "v-1".to_string(),
        output_dir: output_dir.to_path_buf(),
        temp_dir: temp_dir.to_path_buf(),
        concurrency: NonZeroU32::new(2).unwrap(),
    }
}

#[tokio::test]
async fn test_direct_failure_falls_back_to_segments() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let descriptor = mock_segmented_asset(&server).await;

    let output = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;

    let strategy =
        AcquisitionStrategy::new(Default::default(), FailingDirect).with_progress(null_sink());
    let acquired = strategy
        .acquire(&descriptor, &job(output.path(), temp.path()))
        .await?;

    assert_eq!(acquired.container, ContainerFormat::Mpeg2Ts);
    assert_eq!(acquired.path, output.path().join("v-1.ts"));
    assert_eq!(tokio::fs::read(&acquired.path).await?, b"alpha-beta");
    // segment files stay behind for the next run
    assert!(temp.path().join("v-1-0.segment").exists());
    assert!(temp.path().join("v-1-1.segment").exists());
    Ok(())
}

#[tokio::test]
async fn test_ready_direct_url_short_circuits() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let descriptor = mock_segmented_asset(&server).await;

    let output = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;

    let strategy =
        AcquisitionStrategy::new(Default::default(), StubDirect).with_progress(null_sink());
    let acquired = strategy
        .acquire(&descriptor, &job(output.path(), temp.path()))
        .await?;

    assert_eq!(acquired.container, ContainerFormat::Mp4);
    assert_eq!(tokio::fs::read(&acquired.path).await?, b"direct bytes");
    // the segmented machinery never ran
    assert!(!temp.path().join("v-1-0.segment").exists());
    Ok(())
}

#[tokio::test]
async fn test_pending_asset_uses_segments() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let mut descriptor = mock_segmented_asset(&server).await;
    descriptor.status = TranscodeStatus::Pending;

    let output = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;

    let strategy =
        AcquisitionStrategy::new(Default::default(), StubDirect).with_progress(null_sink());
    let acquired = strategy
        .acquire(&descriptor, &job(output.path(), temp.path()))
        .await?;

    assert_eq!(acquired.container, ContainerFormat::Mpeg2Ts);
    Ok(())
}

#[tokio::test]
async fn test_no_variant_is_fatal() -> anyhow::Result<()> {
    let descriptor = AssetDescriptor::default();

    let output = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;

    let strategy =
        AcquisitionStrategy::new(Default::default(), FailingDirect).with_progress(null_sink());
    let result = strategy
        .acquire(&descriptor, &job(output.path(), temp.path()))
        .await;

    assert!(matches!(result, Err(KawaError::NoVariantAvailable)));
    Ok(())
}
