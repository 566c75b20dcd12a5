//! Display and cancellation collaborators.
//!
//! The pipeline hands every annotated frame and its mask to a `Presenter` and
//! polls it once per iteration for a quit request.
//!
//! - `WindowPresenter` (feature: window): two live preview windows, quit on a
//!   cancellation key pressed in either window.
//! - `HeadlessPresenter`: quit keys from a byte stream (stdin by default),
//!   optional JPEG preview snapshots on disk.
//! - `NullPresenter`: shows nothing, never cancels.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::frame::{Frame, Mask};

#[cfg(feature = "window")]
mod window;
#[cfg(feature = "window")]
pub use window::WindowPresenter;

/// Key code for ESC.
pub const KEY_ESC: u8 = 27;

/// Key code for `q`.
pub const KEY_QUIT: u8 = b'q';

/// Display sink and cancellation source.
pub trait Presenter {
    /// Show one annotated frame and its mask.
    fn display(&mut self, annotated: &Frame, mask: &Mask);

    /// Non-blocking beyond `timeout`: true when a quit was requested since the last poll.
    fn poll_cancellation(&mut self, timeout: Duration) -> bool;
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn display(&mut self, annotated: &Frame, mask: &Mask) {
        (**self).display(annotated, mask)
    }

    fn poll_cancellation(&mut self, timeout: Duration) -> bool {
        (**self).poll_cancellation(timeout)
    }
}

/// Shared flag for external cancellation (e.g. Ctrl-C).
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Discards frames and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn display(&mut self, _annotated: &Frame, _mask: &Mask) {}

    fn poll_cancellation(&mut self, _timeout: Duration) -> bool {
        false
    }
}

// ----------------------------------------------------------------------------
// Terminal key decoding
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum EscapeState {
    #[default]
    Ground,
    Escape,
    /// `ESC [` ... final byte in `0x40..=0x7e`.
    Csi,
    /// `ESC O` plus one byte.
    Ss3,
}

/// Splits a terminal byte stream into key presses.
///
/// Cursor and function keys arrive as `ESC [ ...` or `ESC O x` sequences and
/// are swallowed whole; only an ESC that starts no sequence is reported.
#[derive(Debug, Default)]
struct KeyDecoder {
    state: EscapeState,
}

impl KeyDecoder {
    fn push(&mut self, byte: u8, keys: &mut Vec<u8>) {
        match self.state {
            EscapeState::Ground => {
                if byte == KEY_ESC {
                    self.state = EscapeState::Escape;
                } else {
                    keys.push(byte);
                }
            }
            EscapeState::Escape => match byte {
                b'[' => self.state = EscapeState::Csi,
                b'O' => self.state = EscapeState::Ss3,
                KEY_ESC => keys.push(KEY_ESC),
                _ => {
                    self.state = EscapeState::Ground;
                    keys.push(KEY_ESC);
                    keys.push(byte);
                }
            },
            EscapeState::Csi => {
                if (0x40..=0x7e).contains(&byte) {
                    self.state = EscapeState::Ground;
                }
            }
            EscapeState::Ss3 => self.state = EscapeState::Ground,
        }
    }

    /// End of input: a trailing lone ESC still counts.
    fn finish(&mut self, keys: &mut Vec<u8>) {
        if self.state == EscapeState::Escape {
            keys.push(KEY_ESC);
        }
        self.state = EscapeState::Ground;
    }
}

// ----------------------------------------------------------------------------
// HeadlessPresenter
// ----------------------------------------------------------------------------

/// Presenter for terminals: quit keys from a byte stream, optional JPEG previews.
pub struct HeadlessPresenter {
    keys: Option<Receiver<u8>>,
    cancel_keys: [u8; 2],
    snapshots: Option<SnapshotWriter>,
    frames_shown: u64,
}

impl Default for HeadlessPresenter {
    fn default() -> Self {
        Self {
            keys: None,
            cancel_keys: [KEY_ESC, KEY_QUIT],
            snapshots: None,
            frames_shown: 0,
        }
    }
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys that request cancellation (ESC and `q` unless overridden).
    pub fn with_cancel_keys(mut self, keys: [u8; 2]) -> Self {
        self.cancel_keys = keys;
        self
    }

    /// Watch `reader` for quit keys on a background thread.
    pub fn with_key_reader<R: Read + Send + 'static>(mut self, mut reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let mut decoder = KeyDecoder::default();
            let mut keys = Vec::new();
            loop {
                let done = match reader.read(&mut buf) {
                    Ok(0) | Err(_) => {
                        decoder.finish(&mut keys);
                        true
                    }
                    Ok(n) => {
                        for &byte in &buf[..n] {
                            decoder.push(byte, &mut keys);
                        }
                        false
                    }
                };
                if keys.drain(..).any(|key| tx.send(key).is_err()) || done {
                    break;
                }
            }
        });
        self.keys = Some(rx);
        self
    }

    pub fn with_stdin_keys(self) -> Self {
        self.with_key_reader(std::io::stdin())
    }

    /// Write `annotated.jpg` and `mask.jpg` into `dir` every `every` frames.
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>, every: u64) -> Result<Self> {
        self.snapshots = Some(SnapshotWriter::new(dir.into(), every)?);
        Ok(self)
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Presenter for HeadlessPresenter {
    fn display(&mut self, annotated: &Frame, mask: &Mask) {
        self.frames_shown += 1;
        if let Some(writer) = &self.snapshots {
            if (self.frames_shown - 1) % writer.every == 0 {
                if let Err(e) = writer.write(annotated, mask) {
                    log::warn!("preview snapshot failed: {:#}", e);
                }
            }
        }
    }

    fn poll_cancellation(&mut self, timeout: Duration) -> bool {
        let Some(keys) = &self.keys else {
            return false;
        };
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match keys.recv_timeout(remaining) {
                Ok(key) if self.cancel_keys.contains(&key) => return true,
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("key input closed; quit keys disabled");
                    self.keys = None;
                    return false;
                }
            }
        }
    }
}

struct SnapshotWriter {
    dir: PathBuf,
    every: u64,
}

impl SnapshotWriter {
    fn new(dir: PathBuf, every: u64) -> Result<Self> {
        if every == 0 {
            return Err(anyhow!("snapshot interval must be >= 1"));
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create snapshot directory {}", dir.display()))?;
        Ok(Self { dir, every })
    }

    fn write(&self, annotated: &Frame, mask: &Mask) -> Result<()> {
        write_frame_jpeg(annotated, &self.dir.join("annotated.jpg"))?;
        write_mask_jpeg(mask, &self.dir.join("mask.jpg"))
    }
}

/// Encode a BGR frame as JPEG.
pub fn write_frame_jpeg(frame: &Frame, path: &Path) -> Result<()> {
    let rgb: Vec<u8> = frame
        .as_bytes()
        .chunks_exact(3)
        .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
        .collect();
    let image = image::RgbImage::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| anyhow!("failed to convert frame into image buffer"))?;
    image
        .save_with_format(path, image::ImageFormat::Jpeg)
        .with_context(|| format!("write {}", path.display()))
}

/// Encode a mask as grayscale JPEG.
pub fn write_mask_jpeg(mask: &Mask, path: &Path) -> Result<()> {
    let image = image::GrayImage::from_raw(mask.width, mask.height, mask.as_bytes().to_vec())
        .ok_or_else(|| anyhow!("failed to convert mask into image buffer"))?;
    image
        .save_with_format(path, image::ImageFormat::Jpeg)
        .with_context(|| format!("write {}", path.display()))
}
