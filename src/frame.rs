//! Frame and mask buffers.
//!
//! - `Frame`: owned 3-channel BGR pixel buffer, as produced by a source.
//! - `Mask`: single-channel binary buffer (0 or 255) with the same dimensions
//!   as the frame it was derived from.
//! - `BoundingBox`: axis-aligned rectangle in integer pixel coordinates.
//!
//! Both buffers are created fresh per iteration and never retained across frames.

use anyhow::{anyhow, Result};

/// Number of interleaved channels in a `Frame`.
pub const CHANNELS: usize = 3;

/// Mask sample value for foreground pixels.
pub const FOREGROUND: u8 = 255;

/// Mask sample value for background pixels.
pub const BACKGROUND: u8 = 0;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Owned BGR frame.
///
/// Pixel data is packed row-major without padding: `width * height * 3` bytes.
/// `Clone` is cheap enough for per-frame working copies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Zero-based position of this frame in its source stream.
    pub index: u64,
}

impl Frame {
    /// Wrap packed BGR bytes. Fails if the length does not match the dimensions.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = buffer_len(width, height, CHANNELS)?;
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    /// A frame with every pixel set to `bgr`.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3], index: u64) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&bgr);
        }
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// BGR triple at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let offset = self.offset(x, y)?;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Set the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        if let Some(offset) = self.offset(x, y) {
            self.data[offset..offset + CHANNELS].copy_from_slice(&bgr);
        }
    }

    /// Paint a filled rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, rect: BoundingBox, bgr: [u8; 3]) {
        let right = rect.x.saturating_add(rect.width).min(self.width);
        let bottom = rect.y.saturating_add(rect.height).min(self.height);
        for y in rect.y..bottom {
            for x in rect.x..right {
                self.set_pixel(x, y, bgr);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * CHANNELS)
    }
}

// ----------------------------------------------------------------------------
// Mask
// ----------------------------------------------------------------------------

/// Binary object mask. Every sample is either `FOREGROUND` or `BACKGROUND`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Mask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![BACKGROUND; width as usize * height as usize],
            width,
            height,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize] == FOREGROUND
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.data[y as usize * self.width as usize + x as usize] = if foreground {
            FOREGROUND
        } else {
            BACKGROUND
        };
    }

    /// Number of foreground samples.
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&v| v == FOREGROUND).count()
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        self.width == frame.width && self.height == frame.height
    }
}

// ----------------------------------------------------------------------------
// BoundingBox
// ----------------------------------------------------------------------------

/// Axis-aligned rectangle: `x..x + width` by `y..y + height`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the box lies entirely inside a `frame_width` x `frame_height` frame.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x as u64 + self.width as u64 <= frame_width as u64
            && self.y as u64 + self.height as u64 <= frame_height as u64
    }
}

fn buffer_len(width: u32, height: u32, channels: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
