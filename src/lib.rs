//! redmark: red object detection for video streams.
//!
//! Each frame is segmented into a binary mask by HSV thresholding (two hue
//! ranges around the red wrap-around), outer contours of the mask are
//! extracted, and every contour with enough area gets a bounding rectangle
//! drawn on a copy of the frame. The annotated stream is shown through a
//! `Presenter` and optionally written to an output file.
//!
//! # Module Structure
//!
//! - `frame`: `Frame`, `Mask`, `BoundingBox`
//! - `detect`: color segmentation, contour extraction, annotation
//! - `media`: source/sink interfaces and the file backend
//! - `ingest`: frame sources (local files, synthetic)
//! - `record`: video sinks (local files, discard)
//! - `present`: preview windows (feature: window), terminal keys, cancellation
//! - `pipeline`: the per-run state machine
//! - `config`: pipeline parameters and application config loading

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod media;
pub mod pipeline;
pub mod present;
pub mod record;

pub use config::{PipelineConfig, RedmarkConfig};
pub use detect::{Annotation, ColorRange, ColorSegmenter, Hsv, ObjectAnnotator, StrokeStyle};
pub use error::{FrameWriteError, PipelineError};
pub use frame::{BoundingBox, Frame, Mask};
pub use media::{
    FileMedia, FourCc, MediaBackend, Release, SinkParams, StreamInfo, VideoSink, VideoSource,
};
pub use pipeline::{Lease, PipelineState, RunSummary, Termination, VideoPipeline};
pub use present::{CancelToken, HeadlessPresenter, NullPresenter, Presenter};
#[cfg(feature = "window")]
pub use present::WindowPresenter;

/// Contours must exceed this area (in pixels) to be annotated.
pub const DEFAULT_MIN_AREA: f64 = 100.0;

/// Output frame rate used when the source reports none.
pub const DEFAULT_FPS: u32 = 30;

/// Prefix selecting in-process synthetic media instead of a file.
pub const STUB_SCHEME: &str = "stub://";
