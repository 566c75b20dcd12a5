//! Live preview windows.
//!
//! One window shows the annotated frame, the other the red mask. Both are
//! opened on the first frame, sized to it. Pressing a cancellation key in
//! either window, or closing one, requests a stop.

use std::time::Duration;

use anyhow::{Context, Result};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::{Presenter, KEY_ESC};
use crate::frame::{Frame, Mask, CHANNELS};

const ANNOTATED_TITLE: &str = "Original + Rectangles";
const MASK_TITLE: &str = "Red Mask";

struct Windows {
    annotated: Window,
    mask: Window,
}

impl Windows {
    fn open(width: usize, height: usize) -> Result<Self> {
        let annotated = Window::new(ANNOTATED_TITLE, width, height, WindowOptions::default())
            .context("open annotated preview window")?;
        let mask = Window::new(MASK_TITLE, width, height, WindowOptions::default())
            .context("open mask preview window")?;
        Ok(Self { annotated, mask })
    }

    fn all(&self) -> [&Window; 2] {
        [&self.annotated, &self.mask]
    }
}

/// Presenter backed by two `minifb` windows.
pub struct WindowPresenter {
    cancel_keys: Vec<Key>,
    windows: Option<Windows>,
    disabled: bool,
    buffer: Vec<u32>,
}

impl WindowPresenter {
    pub fn new(cancel_keys: [u8; 2]) -> Self {
        let mut keys = Vec::new();
        for byte in cancel_keys {
            match key_for(byte) {
                Some(key) => keys.push(key),
                None => log::warn!("cancellation key {:#04x} has no window key; ignored", byte),
            }
        }
        Self {
            cancel_keys: keys,
            windows: None,
            disabled: false,
            buffer: Vec::new(),
        }
    }

    fn show(&mut self, annotated: &Frame, mask: &Mask) -> Result<()> {
        let (width, height) = (annotated.width as usize, annotated.height as usize);
        if self.windows.is_none() {
            self.windows = Some(Windows::open(width, height)?);
        }
        let Some(windows) = self.windows.as_mut() else {
            return Ok(());
        };

        pack_bgr(annotated, &mut self.buffer);
        windows
            .annotated
            .update_with_buffer(&self.buffer, width, height)
            .context("update annotated preview")?;
        pack_mask(mask, &mut self.buffer);
        windows
            .mask
            .update_with_buffer(&self.buffer, mask.width as usize, mask.height as usize)
            .context("update mask preview")?;
        Ok(())
    }
}

impl Presenter for WindowPresenter {
    fn display(&mut self, annotated: &Frame, mask: &Mask) {
        if self.disabled {
            return;
        }
        if let Err(e) = self.show(annotated, mask) {
            log::warn!("preview disabled: {:#}", e);
            self.disabled = true;
            self.windows = None;
        }
    }

    /// Key state is refreshed by each `display`, so this never waits.
    fn poll_cancellation(&mut self, _timeout: Duration) -> bool {
        let Some(windows) = &self.windows else {
            return false;
        };
        windows.all().into_iter().any(|window| {
            !window.is_open()
                || self
                    .cancel_keys
                    .iter()
                    .any(|&key| window.is_key_pressed(key, KeyRepeat::No))
        })
    }
}

/// Pack BGR pixels into `0RGB` words.
fn pack_bgr(frame: &Frame, out: &mut Vec<u32>) {
    out.clear();
    out.extend(frame.as_bytes().chunks_exact(CHANNELS).map(|bgr| {
        (u32::from(bgr[2]) << 16) | (u32::from(bgr[1]) << 8) | u32::from(bgr[0])
    }));
}

/// Pack mask samples as gray `0RGB` words.
fn pack_mask(mask: &Mask, out: &mut Vec<u32>) {
    out.clear();
    out.extend(mask.as_bytes().iter().map(|&v| u32::from(v) * 0x01_01_01));
}

/// Window key for a cancellation byte. Letters match either case.
fn key_for(byte: u8) -> Option<Key> {
    let key = match byte.to_ascii_lowercase() {
        KEY_ESC => Key::Escape,
        b' ' => Key::Space,
        b'\r' | b'\n' => Key::Enter,
        b'a' => Key::A,
        b'b' => Key::B,
        b'c' => Key::C,
        b'd' => Key::D,
        b'e' => Key::E,
        b'f' => Key::F,
        b'g' => Key::G,
        b'h' => Key::H,
        b'i' => Key::I,
        b'j' => Key::J,
        b'k' => Key::K,
        b'l' => Key::L,
        b'm' => Key::M,
        b'n' => Key::N,
        b'o' => Key::O,
        b'p' => Key::P,
        b'q' => Key::Q,
        b'r' => Key::R,
        b's' => Key::S,
        b't' => Key::T,
        b'u' => Key::U,
        b'v' => Key::V,
        b'w' => Key::W,
        b'x' => Key::X,
        b'y' => Key::Y,
        b'z' => Key::Z,
        b'0' => Key::Key0,
        b'1' => Key::Key1,
        b'2' => Key::Key2,
        b'3' => Key::Key3,
        b'4' => Key::Key4,
        b'5' => Key::Key5,
        b'6' => Key::Key6,
        b'7' => Key::Key7,
        b'8' => Key::Key8,
        b'9' => Key::Key9,
        _ => return None,
    };
    Some(key)
}
