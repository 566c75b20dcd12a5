//! Annotated video output.
//!
//! - Local video files (feature: ffmpeg), encoded with the configured codec
//! - Discarding `stub://` sink (testing, dry runs)
//!
//! A sink's width, height and fps are fixed when it is opened. Frames that do
//! not match are rejected with a recoverable `FrameWriteError`.

pub mod file;
#[cfg(feature = "ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileSink, SinkConfig, SinkStats};
