use kawa::{
    AssetDescriptor, KawaError, KawaResult, MetadataProvider, TranscodeStatus, VariantDescriptor,
};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// The upstream marks an asset's direct file usable at this status.
const TRANSCODE_READY: i32 = 2;

/// Metadata provider backed by the VOD info endpoint:
/// `GET {api_base}/{asset_id}` returning the JSON envelope below.
pub struct HttpMetadataProvider {
    client: Client,
    api_base: Url,
}

impl HttpMetadataProvider {
    pub fn new(client: Client, api_base: Url) -> Self {
        Self { client, api_base }
    }
}

#[derive(Debug, Deserialize)]
struct VodEnvelope {
    data: VodData,
}

#[derive(Debug, Deserialize)]
struct VodData {
    result: VodInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VodInfo {
    tran_code_video_url: Option<String>,
    transcode_status: i32,
    multi_resolution_video_url: Vec<VodVariant>,
}

#[derive(Debug, Deserialize)]
struct VodVariant {
    #[serde(rename = "videoUrl")]
    video_url: String,
    iresolution: u32,
}

impl TryFrom<VodInfo> for AssetDescriptor {
    type Error = KawaError;

    fn try_from(info: VodInfo) -> KawaResult<Self> {
        let direct_url = info
            .tran_code_video_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(Url::parse)
            .transpose()?;
        let status = if info.transcode_status == TRANSCODE_READY {
            TranscodeStatus::Ready
        } else {
            TranscodeStatus::Pending
        };

        let mut variants = Vec::with_capacity(info.multi_resolution_video_url.len());
        for variant in info.multi_resolution_video_url {
            variants.push(VariantDescriptor {
                manifest_url: Url::parse(&variant.video_url)?,
                resolution: variant.iresolution,
            });
        }

        Ok(AssetDescriptor {
            direct_url,
            status,
            variants,
        })
    }
}

impl MetadataProvider for HttpMetadataProvider {
    async fn fetch_asset_descriptor(&self, asset_id: &str) -> KawaResult<AssetDescriptor> {
        let url = self.api_base.join(asset_id)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(KawaError::HttpError(response.status()));
        }

        let envelope: VodEnvelope = serde_json::from_slice(&response.bytes().await?)?;
        envelope.data.result.try_into()
    }
}
