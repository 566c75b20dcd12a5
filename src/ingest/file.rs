//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file (ffmpeg) or, for
//! `stub://` paths, from an in-process synthetic scene. Network URLs are
//! rejected.

use anyhow::{anyhow, Result};

#[cfg(feature = "ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::{BoundingBox, Frame};
use crate::media::{is_local_path, Release, StreamInfo, VideoSource};
use crate::STUB_SCHEME;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "original.mp4") or `stub://name?frames=90`.
    pub path: String,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with(STUB_SCHEME) {
            let spec = SyntheticSpec::parse(&config.path)?;
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config, spec)),
            })
        } else {
            #[cfg(feature = "ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::open(config)?),
                })
            }
            #[cfg(not(feature = "ffmpeg"))]
            {
                Err(anyhow!("file ingestion requires the ffmpeg feature"))
            }
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl VideoSource for FileSource {
    fn info(&self) -> StreamInfo {
        match &self.backend {
            FileBackend::Synthetic(source) => source.info(),
            #[cfg(feature = "ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

impl Release for FileSource {
    fn release(&mut self) -> Result<()> {
        let stats = self.stats();
        log::info!(
            "FileSource: released {} after {} frames",
            stats.path,
            stats.frames_captured
        );
        match &mut self.backend {
            FileBackend::Synthetic(_) => Ok(()),
            #[cfg(feature = "ffmpeg")]
            FileBackend::Ffmpeg(source) => source.release(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

const SQUARE_SIZE: u32 = 24;
const SPECK_SIZE: u32 = 3;
const BACKGROUND_BGR: [u8; 3] = [40, 30, 20];
const RED_BGR: [u8; 3] = [0, 0, 255];

/// Shape of a synthetic stream, parsed from `stub://name?key=value&...`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30.0,
            frames: 90,
        }
    }
}

impl SyntheticSpec {
    /// Parse optional `width`, `height`, `fps` and `frames` query parameters.
    pub fn parse(path: &str) -> Result<Self> {
        let mut spec = Self::default();
        let Some((_, query)) = path.split_once('?') else {
            return Ok(spec);
        };
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter {:?}", pair))?;
            let bad = |_| anyhow!("invalid value for stub parameter {}: {:?}", key, value);
            match key {
                "width" => spec.width = value.parse().map_err(bad)?,
                "height" => spec.height = value.parse().map_err(bad)?,
                "frames" => spec.frames = value.parse().map_err(bad)?,
                "fps" => {
                    spec.fps = value
                        .parse()
                        .map_err(|_| anyhow!("invalid value for stub parameter fps: {:?}", value))?
                }
                other => return Err(anyhow!("unknown stub parameter {:?}", other)),
            }
        }
        Ok(spec)
    }
}

struct SyntheticFileSource {
    config: FileConfig,
    spec: SyntheticSpec,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig, spec: SyntheticSpec) -> Self {
        log::info!("FileSource: opened {} (synthetic)", config.path);
        Self {
            config,
            spec,
            frame_count: 0,
        }
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            width: self.spec.width as i64,
            height: self.spec.height as i64,
            fps: self.spec.fps,
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.frame_count >= self.spec.frames {
            return None;
        }
        let index = self.frame_count;
        self.frame_count += 1;
        Some(self.render(index))
    }

    /// A red square sweeping left to right, plus a static speck too small to count.
    fn render(&self, index: u64) -> Frame {
        let (w, h) = (self.spec.width, self.spec.height);
        let mut frame = Frame::filled(w, h, BACKGROUND_BGR, index);

        let travel = w.saturating_sub(SQUARE_SIZE).max(1) as u64;
        let x = ((index * 4) % travel) as u32;
        let y = h.saturating_sub(SQUARE_SIZE) / 2;
        frame.fill_rect(BoundingBox::new(x, y, SQUARE_SIZE, SQUARE_SIZE), RED_BGR);
        frame.fill_rect(
            BoundingBox::new(w / 8, h / 8, SPECK_SIZE, SPECK_SIZE),
            RED_BGR,
        );
        frame
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}
