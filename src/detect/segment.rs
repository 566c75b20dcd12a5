//! Color segmentation: BGR frame to binary red mask.
//!
//! Pixels are converted to 8-bit HSV (hue in `0..180`, saturation and value in
//! `0..=255`) and tested against two inclusive ranges, one on each side of the
//! hue wrap-around. The output mask is the pixel-wise union of both tests.

use std::sync::OnceLock;

use serde::Deserialize;

use crate::frame::{Frame, Mask, BACKGROUND, CHANNELS, FOREGROUND};

const HSV_SHIFT: u32 = 12;
const HUE_RANGE: i32 = 180;

/// 8-bit HSV sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive lower/upper bound over all three HSV channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, px: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&px.h)
            && (self.lower.s..=self.upper.s).contains(&px.s)
            && (self.lower.v..=self.upper.v).contains(&px.v)
    }
}

/// Low-hue side of red.
pub const RED_LOW: ColorRange = ColorRange::new(Hsv::new(0, 100, 100), Hsv::new(10, 255, 255));

/// High-hue side of red (wraps toward 180).
pub const RED_HIGH: ColorRange =
    ColorRange::new(Hsv::new(170, 100, 100), Hsv::new(180, 255, 255));

/// Stateless segmenter over a fixed pair of ranges.
#[derive(Clone, Copy, Debug)]
pub struct ColorSegmenter {
    ranges: [ColorRange; 2],
}

impl ColorSegmenter {
    pub fn new(ranges: [ColorRange; 2]) -> Self {
        Self { ranges }
    }

    /// Segmenter for the two fixed red ranges.
    pub fn red() -> Self {
        Self::new([RED_LOW, RED_HIGH])
    }

    /// Build the union mask for `frame`. Output dimensions always match the input.
    pub fn segment(&self, frame: &Frame) -> Mask {
        let mut mask = Mask::new(frame.width, frame.height);
        let [first, second] = self.ranges;
        for (sample, bgr) in mask
            .samples_mut()
            .iter_mut()
            .zip(frame.as_bytes().chunks_exact(CHANNELS))
        {
            let hsv = bgr_to_hsv([bgr[0], bgr[1], bgr[2]]);
            *sample = if first.contains(hsv) || second.contains(hsv) {
                FOREGROUND
            } else {
                BACKGROUND
            };
        }
        mask
    }
}

impl Default for ColorSegmenter {
    fn default() -> Self {
        Self::red()
    }
}

/// Convert one BGR pixel to 8-bit HSV.
///
/// Uses fixed-point reciprocal tables with round-half-up, so results are
/// bit-stable across platforms. Hue is halved to fit `0..180`.
pub fn bgr_to_hsv(bgr: [u8; 3]) -> Hsv {
    let (b, g, r) = (bgr[0] as i32, bgr[1] as i32, bgr[2] as i32);
    let tables = tables();

    let v = b.max(g).max(r);
    let min = b.min(g).min(r);
    let diff = v - min;

    let s = (diff * tables.sat[v as usize] + (1 << (HSV_SHIFT - 1))) >> HSV_SHIFT;

    let raw = if v == r {
        g - b
    } else if v == g {
        b - r + 2 * diff
    } else {
        r - g + 4 * diff
    };
    let mut h = (raw * tables.hue[diff as usize] + (1 << (HSV_SHIFT - 1))) >> HSV_SHIFT;
    if h < 0 {
        h += HUE_RANGE;
    }

    Hsv {
        h: h as u8,
        s: s as u8,
        v: v as u8,
    }
}

struct HsvTables {
    sat: [i32; 256],
    hue: [i32; 256],
}

fn tables() -> &'static HsvTables {
    static TABLES: OnceLock<HsvTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut sat = [0i32; 256];
        let mut hue = [0i32; 256];
        let scale = (1u32 << HSV_SHIFT) as f64;
        for i in 1..256usize {
            sat[i] = (255.0 * scale / i as f64).round() as i32;
            hue[i] = (HUE_RANGE as f64 * scale / (6.0 * i as f64)).round() as i32;
        }
        HsvTables { sat, hue }
    })
}
