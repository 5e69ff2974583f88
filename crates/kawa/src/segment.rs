use std::path::{Path, PathBuf};

use url::Url;

/// One chunk of the stream, in manifest order.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    /// Zero-based position in the manifest. Defines merge order;
    /// sequences within one run are contiguous with no duplicates.
    pub sequence: u64,
    /// Absolute URL, already resolved against the manifest base.
    pub url: Url,
    pub byte_range: Option<m3u8_rs::ByteRange>,
}

impl SegmentDescriptor {
    /// Deterministic cache file name, stable across runs so a resumed
    /// job finds the segments a previous run already completed.
    pub fn file_name(&self, asset_id: &str) -> String {
        format!("{asset_id}-{}.segment", self.sequence)
    }

    pub fn cache_path(&self, asset_id: &str, temp_dir: &Path) -> PathBuf {
        temp_dir.join(self.file_name(asset_id))
    }
}

/// HTTP `Range` header value for a playlist byte range. An absent
/// offset means the range starts at the beginning of the resource.
/// Zero-length ranges are rejected during playlist expansion.
pub fn http_range(range: &m3u8_rs::ByteRange) -> String {
    let offset = range.offset.unwrap_or(0);
    format!(
        "bytes={}-{}",
        offset,
        offset + range.length.saturating_sub(1)
    )
}

/// Container of an acquired contiguous stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mpeg2Ts,
    Mp4,
}

impl ContainerFormat {
    pub fn as_ext(&self) -> &str {
        match self {
            Self::Mpeg2Ts => "ts",
            Self::Mp4 => "mp4",
        }
    }
}
