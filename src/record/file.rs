//! Local file video sink.

use anyhow::{anyhow, Result};

#[cfg(feature = "ffmpeg")]
use super::file_ffmpeg::FfmpegFileSink;
use crate::error::FrameWriteError;
use crate::frame::Frame;
use crate::media::{is_local_path, Release, SinkParams, VideoSink};
use crate::STUB_SCHEME;

/// Configuration for a local file sink.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Output path (e.g., "output.mp4") or `stub://name` to discard frames.
    pub path: String,
    pub params: SinkParams,
}

/// Local file video sink.
pub struct FileSink {
    params: SinkParams,
    backend: SinkBackend,
}

enum SinkBackend {
    Discard(DiscardSink),
    #[cfg(feature = "ffmpeg")]
    Ffmpeg(FfmpegFileSink),
}

impl FileSink {
    pub fn open(config: SinkConfig) -> Result<Self> {
        if !is_local_path(&config.path) {
            return Err(anyhow!(
                "video output only supports local paths (no URL schemes)"
            ));
        }
        if config.params.width == 0 || config.params.height == 0 || config.params.fps == 0 {
            return Err(anyhow!(
                "invalid output parameters {}x{} @ {} fps",
                config.params.width,
                config.params.height,
                config.params.fps
            ));
        }
        let params = config.params;
        if config.path.starts_with(STUB_SCHEME) {
            log::info!("FileSink: opened {} (discard)", config.path);
            Ok(Self {
                params,
                backend: SinkBackend::Discard(DiscardSink {
                    path: config.path,
                    frames_written: 0,
                }),
            })
        } else {
            #[cfg(feature = "ffmpeg")]
            {
                Ok(Self {
                    params,
                    backend: SinkBackend::Ffmpeg(FfmpegFileSink::open(config)?),
                })
            }
            #[cfg(not(feature = "ffmpeg"))]
            {
                Err(anyhow!("video output requires the ffmpeg feature"))
            }
        }
    }

    pub fn stats(&self) -> SinkStats {
        match &self.backend {
            SinkBackend::Discard(sink) => SinkStats {
                frames_written: sink.frames_written,
                path: sink.path.clone(),
            },
            #[cfg(feature = "ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink.stats(),
        }
    }
}

impl VideoSink for FileSink {
    fn params(&self) -> &SinkParams {
        &self.params
    }

    fn write(&mut self, frame: &Frame) -> Result<(), FrameWriteError> {
        if frame.width != self.params.width || frame.height != self.params.height {
            return Err(FrameWriteError::new(
                frame.index,
                format!(
                    "frame is {}x{}, output expects {}x{}",
                    frame.width, frame.height, self.params.width, self.params.height
                ),
            ));
        }
        match &mut self.backend {
            SinkBackend::Discard(sink) => {
                sink.frames_written += 1;
                Ok(())
            }
            #[cfg(feature = "ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink
                .write(frame)
                .map_err(|e| FrameWriteError::new(frame.index, format!("{:#}", e))),
        }
    }
}

impl Release for FileSink {
    fn release(&mut self) -> Result<()> {
        let result = match &mut self.backend {
            SinkBackend::Discard(_) => Ok(()),
            #[cfg(feature = "ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink.finish(),
        };
        let stats = self.stats();
        log::info!(
            "FileSink: released {} after {} frames",
            stats.path,
            stats.frames_written
        );
        result
    }
}

/// Statistics for a file sink.
#[derive(Clone, Debug)]
pub struct SinkStats {
    pub frames_written: u64,
    pub path: String,
}

struct DiscardSink {
    path: String,
    frames_written: u64,
}
