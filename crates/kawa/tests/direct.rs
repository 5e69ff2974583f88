use std::num::NonZeroU32;

use kawa::direct::{DirectDownloader, MultiConnectionDownloader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Answers every request with a 200 whose body stops short of the
/// advertised length, then drops the connection.
async fn truncating_server(body: &'static [u8], advertised: usize) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {advertised}\r\nConnection: close\r\n\r\n"
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body).await;
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_multi_connection_download() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    // 10 byte resource split over two range requests
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .and(header("Range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-0/10")
                .set_body_bytes(b"0".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .and(header("Range", "bytes=0-4"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"01234".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .and(header("Range", "bytes=5-9"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"56789".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader =
        MultiConnectionDownloader::new(Default::default(), NonZeroU32::new(2).unwrap());
    let url = Url::parse(&format!("{}/full.mp4", server.uri()))?;
    let destination = downloader.download(&url, dir.path(), "v-1.mp4").await?;

    assert_eq!(destination, dir.path().join("v-1.mp4"));
    assert_eq!(tokio::fs::read(&destination).await?, b"0123456789");
    Ok(())
}

#[tokio::test]
async fn test_falls_back_to_single_connection() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    // server ignores Range and answers 200 with the whole body
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"whole file".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader =
        MultiConnectionDownloader::new(Default::default(), NonZeroU32::new(4).unwrap());
    let url = Url::parse(&format!("{}/full.mp4", server.uri()))?;
    let destination = downloader.download(&url, dir.path(), "v-1.mp4").await?;

    assert_eq!(tokio::fs::read(&destination).await?, b"whole file");
    Ok(())
}

#[tokio::test]
async fn test_truncated_body_removes_partial_file() -> anyhow::Result<()> {
    let base = truncating_server(b"partial", 100).await;

    let dir = tempfile::tempdir()?;
    let downloader =
        MultiConnectionDownloader::new(Default::default(), NonZeroU32::new(2).unwrap());
    let url = Url::parse(&format!("{base}/full.mp4"))?;

    let result = downloader.download(&url, dir.path(), "v-1.mp4").await;

    assert!(result.is_err());
    assert!(!dir.path().join("v-1.mp4").exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_range_fetch_removes_preallocated_file() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .and(header("Range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-0/10")
                .set_body_bytes(b"0".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .and(header("Range", "bytes=0-4"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"01234".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .and(header("Range", "bytes=5-9"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader =
        MultiConnectionDownloader::new(Default::default(), NonZeroU32::new(2).unwrap());
    let url = Url::parse(&format!("{}/full.mp4", server.uri()))?;

    let result = downloader.download(&url, dir.path(), "v-1.mp4").await;

    assert!(result.is_err());
    assert!(!dir.path().join("v-1.mp4").exists());
    Ok(())
}

#[tokio::test]
async fn test_unavailable_resource_is_an_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/full.mp4"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader =
        MultiConnectionDownloader::new(Default::default(), NonZeroU32::new(2).unwrap());
    let url = Url::parse(&format!("{}/full.mp4", server.uri()))?;

    assert!(downloader.download(&url, dir.path(), "v-1.mp4").await.is_err());
    assert!(!dir.path().join("v-1.mp4").exists());
    Ok(())
}
