use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use reqwest::Client;
use url::Url;

use crate::{
    error::{KawaError, KawaResult},
    segment::SegmentDescriptor,
};

/// Master playlists referencing other master playlists are rare;
/// anything deeper than this is treated as malformed.
const MAX_PLAYLIST_DEPTH: u32 = 5;

/// Fetches a playlist and expands it into an ordered segment list.
///
/// No retry and no caching happen here. Callers that need resilience
/// retry the whole [resolve] call.
///
/// [resolve]: ManifestResolver::resolve
pub struct ManifestResolver {
    client: Client,
}

impl ManifestResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, manifest_url: &Url) -> KawaResult<Vec<SegmentDescriptor>> {
        let mut url = manifest_url.clone();

        for _ in 0..MAX_PLAYLIST_DEPTH {
            tracing::debug!("Fetching playlist: {url}");
            let bytes = self.fetch_bytes(&url).await?;

            let playlist = m3u8_rs::parse_playlist_res(&bytes)
                .map_err(|e| KawaError::ManifestParseError(format!("{e:?}")))?;
            match playlist {
                Playlist::MasterPlaylist(master) => {
                    tracing::info!("Master playlist detected, selecting best quality stream.");
                    url = best_stream_url(&url, master)?;
                }
                Playlist::MediaPlaylist(media) => {
                    return expand_media_playlist(&url, &media);
                }
            }
        }

        Err(KawaError::ManifestParseError(
            "master playlist nesting too deep".to_string(),
        ))
    }

    async fn fetch_bytes(&self, url: &Url) -> KawaResult<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(KawaError::HttpError(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Best variant of a master playlist: resolution first, then frame
/// rate, then bandwidth.
fn best_stream_url(base: &Url, mut master: MasterPlaylist) -> KawaResult<Url> {
    master.variants.sort_by(|a, b| {
        if let (Some(a), Some(b)) = (a.resolution, b.resolution) {
            if a.width != b.width {
                return b.width.cmp(&a.width);
            }
        }

        if let (Some(a), Some(b)) = (a.frame_rate, b.frame_rate) {
            let a = a as u64;
            let b = b as u64;
            if a != b {
                return b.cmp(&a);
            }
        }

        b.bandwidth.cmp(&a.bandwidth)
    });

    let Some(variant) = master.variants.first() else {
        return Err(KawaError::NoVariantAvailable);
    };
    Ok(base.join(&variant.uri)?)
}

/// Document order becomes the zero-based sequence of each segment.
/// Relative URIs resolve against the manifest base path; absolute
/// URIs pass through untouched.
pub fn expand_media_playlist(
    playlist_url: &Url,
    playlist: &MediaPlaylist,
) -> KawaResult<Vec<SegmentDescriptor>> {
    let mut segments = Vec::with_capacity(playlist.segments.len());
    for (sequence, segment) in playlist.segments.iter().enumerate() {
        if segment.byte_range.as_ref().is_some_and(|r| r.length == 0) {
            return Err(KawaError::ManifestParseError(format!(
                "zero-length byte range for segment {}",
                segment.uri
            )));
        }
        let url = playlist_url.join(&segment.uri)?;
        segments.push(SegmentDescriptor {
            sequence: sequence as u64,
            url,
            byte_range: segment.byte_range.clone(),
        });
    }
    Ok(segments)
}
