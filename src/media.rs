//! Media collaborator interfaces.
//!
//! The pipeline never talks to a container or codec directly. It opens a
//! `VideoSource` and an optional `VideoSink` through a `MediaBackend` and owns
//! both handles until teardown.
//!
//! - `VideoSource`: ordered frames plus declared width, height and fps.
//! - `VideoSink`: consumer of annotated frames with immutable parameters.
//! - `FileMedia`: production backend (local files, `stub://` synthetic media).

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::FrameWriteError;
use crate::frame::Frame;
use crate::ingest::{FileConfig, FileSource};
use crate::record::{FileSink, SinkConfig};

/// Explicit release of an exclusively owned media handle.
pub trait Release {
    /// Release underlying resources. Called exactly once by the owner.
    fn release(&mut self) -> Result<()>;
}

/// Stream properties declared by a source at open time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: i64,
    pub height: i64,
    /// Frames per second; `0.0` means unknown.
    pub fps: f64,
}

/// Ordered, finite-or-unknown-length frame sequence.
pub trait VideoSource: Release {
    fn info(&self) -> StreamInfo;

    /// Next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Consumer of annotated frames.
pub trait VideoSink: Release {
    fn params(&self) -> &SinkParams;

    fn write(&mut self, frame: &Frame) -> Result<(), FrameWriteError>;
}

/// Opens sources and sinks by identifier.
pub trait MediaBackend {
    fn open_source(&mut self, input: &str) -> Result<Box<dyn VideoSource>>;

    fn open_sink(&mut self, output: &str, params: &SinkParams) -> Result<Box<dyn VideoSink>>;
}

/// Fixed parameters a sink is opened with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: FourCc,
}

// ----------------------------------------------------------------------------
// FourCc
// ----------------------------------------------------------------------------

/// Four-character codec tag (e.g. `mp4v`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const MP4V: FourCc = FourCc(*b"mp4v");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl FromStr for FourCc {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(anyhow!(
                "codec identifier must be four printable ASCII characters, got {:?}",
                s
            ));
        }
        Ok(FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl TryFrom<String> for FourCc {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FourCc> for String {
    fn from(value: FourCc) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bytes are validated ASCII.
        for b in self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

// ----------------------------------------------------------------------------
// FileMedia: production backend
// ----------------------------------------------------------------------------

/// Backend for local files and `stub://` synthetic media.
#[derive(Clone, Debug, Default)]
pub struct FileMedia;

impl FileMedia {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FileMedia {
    fn open_source(&mut self, input: &str) -> Result<Box<dyn VideoSource>> {
        let source = FileSource::open(FileConfig {
            path: input.to_string(),
        })?;
        Ok(Box::new(source))
    }

    fn open_sink(&mut self, output: &str, params: &SinkParams) -> Result<Box<dyn VideoSink>> {
        let sink = FileSink::open(SinkConfig {
            path: output.to_string(),
            params: *params,
        })?;
        Ok(Box::new(sink))
    }
}

/// Reject URL schemes other than `stub://`.
pub(crate) fn is_local_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(crate::STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_parses_and_displays() {
        let codec: FourCc = "mp4v".parse().unwrap();
        assert_eq!(codec, FourCc::MP4V);
        assert_eq!(codec.to_string(), "mp4v");
    }

    #[test]
    fn fourcc_rejects_bad_tags() {
        assert!("mp4".parse::<FourCc>().is_err());
        assert!("mp4vv".parse::<FourCc>().is_err());
        assert!("mp\n4".parse::<FourCc>().is_err());
    }

    #[test]
    fn fourcc_roundtrips_through_json() {
        let json = serde_json::to_string(&FourCc::MP4V).unwrap();
        assert_eq!(json, "\"mp4v\"");
        assert!(serde_json::from_str::<FourCc>("\"toolong\"").is_err());
    }

    #[test]
    fn local_path_rules() {
        assert!(is_local_path("clip.mp4"));
        assert!(is_local_path("stub://square"));
        assert!(!is_local_path("rtsp://camera/stream"));
        assert!(!is_local_path("  "));
    }
}
