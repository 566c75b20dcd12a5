//! Frame ingestion sources.
//!
//! - Local video files (feature: ffmpeg)
//! - Synthetic `stub://` source (testing, demos)
//!
//! Sources produce BGR `Frame`s in stream order and declare their width,
//! height and fps once, at open time. The ingestion layer MUST NOT:
//! - Reorder, duplicate or drop decoded frames
//! - Retain frames after handing them to the pipeline

pub mod file;
#[cfg(feature = "ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats, SyntheticSpec};
