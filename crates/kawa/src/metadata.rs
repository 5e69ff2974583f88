use std::future::Future;

use url::Url;

use crate::error::{KawaError, KawaResult};

/// Readiness of the upstream transcode for an asset. Only a [Ready]
/// asset exposes a usable direct-download URL.
///
/// [Ready]: TranscodeStatus::Ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscodeStatus {
    #[default]
    Pending,
    Ready,
}

/// One resolution variant of an asset, addressed by its own manifest.
#[derive(Debug, Clone)]
pub struct VariantDescriptor {
    pub manifest_url: Url,
    /// Total-order quality rank, larger is better.
    pub resolution: u32,
}

/// Everything the metadata provider knows about a remote asset.
/// Produced once per acquisition run and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct AssetDescriptor {
    pub direct_url: Option<Url>,
    pub status: TranscodeStatus,
    pub variants: Vec<VariantDescriptor>,
}

impl AssetDescriptor {
    /// The direct-download URL, but only while the upstream transcode
    /// reports it valid.
    pub fn direct_ready(&self) -> Option<&Url> {
        match (&self.direct_url, self.status) {
            (Some(url), TranscodeStatus::Ready) => Some(url),
            _ => None,
        }
    }

    /// Variant with the highest resolution rank. Ties keep the
    /// first-seen variant.
    pub fn best_variant(&self) -> KawaResult<&VariantDescriptor> {
        let mut best: Option<&VariantDescriptor> = None;
        for variant in &self.variants {
            match best {
                Some(current) if current.resolution >= variant.resolution => {}
                _ => best = Some(variant),
            }
        }
        best.ok_or(KawaError::NoVariantAvailable)
    }
}

pub trait MetadataProvider {
    fn fetch_asset_descriptor(
        &self,
        asset_id: &str,
    ) -> impl Future<Output = KawaResult<AssetDescriptor>> + Send;
}
