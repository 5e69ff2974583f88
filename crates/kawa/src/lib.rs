//! ┌──────────────┐           ┌───────────────┐
//! │   Metadata   │  direct?  │    Direct     │
//! │   Provider   ├───────────►  Downloader   ├──────────┐
//! └──────┬───────┘           └───────┬───────┘          │
//!        │ segmented / fallback      │ on failure       │
//! ┌──────▼───────┐           ┌───────▼───────┐   ┌──────▼───────┐
//! │   Manifest   │ Segment N │   Parallel    │   │  Transcode   │
//! │   Resolver   ├───────────►   Fetcher     │   │ Orchestrator │
//! └──────────────┘           └───────┬───────┘   └──────▲───────┘
//!                            ┌───────▼───────┐          │
//!                            │ Concat Merger ├──────────┘
//!                            └───────────────┘

pub mod acquire;
pub mod direct;
pub mod download;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod merge;
pub mod metadata;
pub mod path;
pub mod progress;
pub mod segment;
pub mod transcode;

pub use m3u8_rs;

pub use error::{KawaError, KawaResult};
pub use metadata::{AssetDescriptor, MetadataProvider, TranscodeStatus, VariantDescriptor};
pub use progress::{ProgressEvent, ProgressSink, SharedProgressSink};
pub use segment::{ContainerFormat, SegmentDescriptor};
