//! Local file frame source using FFmpeg.
//!
//! Frames are decoded in-memory and converted to packed BGR24. The decoder is
//! drained at end of input so trailing buffered frames are still delivered.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::{Frame, CHANNELS};
use crate::media::StreamInfo;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: StreamInfo,
    frame_count: u64,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let fps = if rate.denominator() == 0 {
            0.0
        } else {
            f64::from(rate)
        };
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::BGR24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = StreamInfo {
            width: decoder.width() as i64,
            height: decoder.height() as i64,
            fps,
        };
        log::info!(
            "FileSource: opened {} (ffmpeg, {}x{} @ {:.2} fps)",
            config.path,
            info.width,
            info.height,
            info.fps
        );

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            info,
            frame_count: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn info(&self) -> StreamInfo {
        self.info
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut bgr_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut bgr_frame)
                    .context("scale frame to BGR")?;
                let frame = frame_to_bgr(&bgr_frame, self.frame_count)?;
                self.frame_count += 1;
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match next_video_packet(&mut self.input, self.stream_index) {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    pub(crate) fn release(&mut self) -> Result<()> {
        self.decoder.flush();
        Ok(())
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn next_video_packet(
    input: &mut ffmpeg::format::context::Input,
    stream_index: usize,
) -> Option<ffmpeg::Packet> {
    input
        .packets()
        .find(|(stream, _)| stream.index() == stream_index)
        .map(|(_, packet)| packet)
}

fn frame_to_bgr(frame: &ffmpeg::frame::Video, index: u64) -> Result<Frame> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * CHANNELS;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Frame::from_bgr(pixels.to_vec(), width, height, index);
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Frame::from_bgr(pixels, width, height, index)
}
