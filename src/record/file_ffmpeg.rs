//! Local file video sink using FFmpeg.
//!
//! Frames arrive as packed BGR24, are converted to YUV420P and encoded with
//! the codec selected by the configured four-character tag. Presentation
//! timestamps are frame indices in a `1/fps` time base.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;

use super::file::{SinkConfig, SinkStats};
use crate::frame::{Frame, CHANNELS};
use crate::media::FourCc;

pub(crate) struct FfmpegFileSink {
    config: SinkConfig,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    frames_written: u64,
    finished: bool,
}

impl FfmpegFileSink {
    pub(crate) fn open(config: SinkConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let params = config.params;
        let codec_id = codec_for(params.codec)?;
        let codec = ffmpeg::encoder::find(codec_id)
            .ok_or_else(|| anyhow!("ffmpeg has no encoder for codec {}", params.codec))?;

        let mut output = ffmpeg::format::output(&config.path)
            .with_context(|| format!("failed to create output '{}' with ffmpeg", config.path))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let fps = i32::try_from(params.fps).context("output fps out of range")?;
        let encoder_time_base = ffmpeg::Rational::new(1, fps);

        let mut stream = output.add_stream(codec).context("add output video stream")?;
        let stream_index = stream.index();
        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        encoder.set_width(params.width);
        encoder.set_height(params.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        if global_header {
            encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder
            .open_as(codec)
            .with_context(|| format!("open {} encoder", params.codec))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .with_context(|| format!("write container header for '{}'", config.path))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| anyhow!("output stream disappeared after header"))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            Pixel::BGR24,
            params.width,
            params.height,
            Pixel::YUV420P,
            params.width,
            params.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSink: opened {} (ffmpeg, {} {}x{} @ {} fps)",
            config.path,
            params.codec,
            params.width,
            params.height,
            params.fps
        );

        Ok(Self {
            config,
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            frames_written: 0,
            finished: false,
        })
    }

    pub(crate) fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            anyhow::bail!("output already finalized");
        }
        let mut bgr = ffmpeg::frame::Video::new(Pixel::BGR24, frame.width, frame.height);
        copy_into(frame, &mut bgr)?;

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&bgr, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.frames_written as i64));

        self.encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        self.drain_packets()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the encoder and write the container trailer.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .with_context(|| format!("write container trailer for '{}'", self.config.path))
    }

    pub(crate) fn stats(&self) -> SinkStats {
        SinkStats {
            frames_written: self.frames_written,
            path: self.config.path.clone(),
        }
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }
}

/// Map a four-character tag to an ffmpeg encoder.
fn codec_for(codec: FourCc) -> Result<ffmpeg::codec::Id> {
    match codec.as_bytes() {
        b"mp4v" | b"MP4V" | b"FMP4" | b"XVID" | b"DIVX" => Ok(ffmpeg::codec::Id::MPEG4),
        b"avc1" | b"H264" | b"h264" | b"X264" => Ok(ffmpeg::codec::Id::H264),
        _ => Err(anyhow!("unsupported output codec {}", codec)),
    }
}

fn copy_into(frame: &Frame, dst: &mut ffmpeg::frame::Video) -> Result<()> {
    let row_bytes = frame.width as usize * CHANNELS;
    let stride = dst.stride(0);
    let src = frame.as_bytes();
    let data = dst.data_mut(0);
    for row in 0..frame.height as usize {
        let from = &src[row * row_bytes..(row + 1) * row_bytes];
        data.get_mut(row * stride..row * stride + row_bytes)
            .context("ffmpeg frame row is out of bounds")?
            .copy_from_slice(from);
    }
    Ok(())
}
