//! Frame-processing pipeline.
//!
//! `VideoPipeline` drives one run: open the source, validate its declared
//! geometry, open the optional sink, then segment, annotate, display and
//! write frames strictly in source order until the stream ends or a
//! cancellation is observed.
//!
//! State machine:
//!
//! ```text
//! Created -> Opened -> Streaming -> Draining -> Closed
//!    |          |
//!    v          v
//! FailedOpen  FailedSinkOpen
//! ```
//!
//! Source and sink are held in `Lease`s, which release their handle exactly
//! once: explicitly during `Draining`, or on drop for early-return paths.

use std::ops::{Deref, DerefMut};

use anyhow::anyhow;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::media::{MediaBackend, Release, SinkParams, VideoSink, VideoSource};
use crate::present::{CancelToken, Presenter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Opened,
    Streaming,
    Draining,
    Closed,
    FailedOpen,
    FailedSinkOpen,
}

/// Why the streaming loop stopped. Neither case is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    EndOfStream,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_written: u64,
    pub write_failures: u64,
    /// Total bounding boxes drawn across all frames.
    pub detections: u64,
    /// Frame rate the sink was (or would have been) opened with.
    pub fps: u32,
    pub termination: Termination,
}

// ----------------------------------------------------------------------------
// Lease: scoped ownership of a media handle
// ----------------------------------------------------------------------------

/// Exclusive owner of a media handle; releases it exactly once.
pub struct Lease<T: Release + ?Sized> {
    handle: Box<T>,
    label: &'static str,
    released: bool,
}

impl<T: Release + ?Sized> Lease<T> {
    pub fn new(handle: Box<T>, label: &'static str) -> Self {
        Self {
            handle,
            label,
            released: false,
        }
    }

    /// Release now. Failures are logged; teardown always continues.
    pub fn close(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.handle.release() {
            log::warn!("failed to release {}: {:#}", self.label, e);
        }
    }
}

impl<T: Release + ?Sized> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.handle
    }
}

impl<T: Release + ?Sized> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.handle
    }
}

impl<T: Release + ?Sized> Drop for Lease<T> {
    fn drop(&mut self) {
        self.release_once();
    }
}

// ----------------------------------------------------------------------------
// VideoPipeline
// ----------------------------------------------------------------------------

pub struct VideoPipeline<'a, M, P> {
    config: &'a PipelineConfig,
    media: M,
    presenter: P,
    cancel: Option<CancelToken>,
    state: PipelineState,
}

impl<'a, M: MediaBackend, P: Presenter> VideoPipeline<'a, M, P> {
    pub fn new(config: &'a PipelineConfig, media: M, presenter: P) -> Self {
        Self {
            config,
            media,
            presenter,
            cancel: None,
            state: PipelineState::Created,
        }
    }

    /// Also stop when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Process `input` to completion, writing to `output` when given.
    ///
    /// Setup failures are fatal and returned after releasing whatever was
    /// already acquired. Once streaming starts the run always completes.
    pub fn run(&mut self, input: &str, output: Option<&str>) -> Result<RunSummary, PipelineError> {
        if self.state != PipelineState::Created {
            return Err(anyhow!("pipeline already ran (state {:?})", self.state).into());
        }
        self.config.validate()?;

        let mut source = match self.media.open_source(input) {
            Ok(source) => Lease::new(source, "video source"),
            Err(e) => {
                self.transition(PipelineState::FailedOpen);
                return Err(PipelineError::Open {
                    input: input.to_string(),
                    reason: format!("{:#}", e),
                });
            }
        };
        self.transition(PipelineState::Opened);

        let info = source.info();
        let (width, height) = match (u32::try_from(info.width), u32::try_from(info.height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                self.transition(PipelineState::FailedOpen);
                source.close();
                return Err(PipelineError::InvalidDimensions {
                    width: info.width,
                    height: info.height,
                });
            }
        };
        let fps = self.config.effective_fps(info.fps);
        if info.fps as u32 != fps {
            log::info!(
                "source reports {:.2} fps; using default {} fps",
                info.fps,
                fps
            );
        }
        log::info!("source {}: {}x{} @ {} fps", input, width, height, fps);

        let mut sink = match output {
            Some(path) => {
                let params = SinkParams {
                    width,
                    height,
                    fps,
                    codec: self.config.codec,
                };
                match self.media.open_sink(path, &params) {
                    Ok(sink) => {
                        let opened = sink.params();
                        log::info!(
                            "sink {}: {}x{} @ {} fps ({})",
                            path,
                            opened.width,
                            opened.height,
                            opened.fps,
                            opened.codec
                        );
                        Some(Lease::new(sink, "video sink"))
                    }
                    Err(e) => {
                        self.transition(PipelineState::FailedSinkOpen);
                        source.close();
                        return Err(PipelineError::SinkOpen {
                            output: path.to_string(),
                            reason: format!("{:#}", e),
                        });
                    }
                }
            }
            None => None,
        };

        self.transition(PipelineState::Streaming);
        let summary = self.stream(
            &mut *source,
            sink.as_mut().map(|s| &mut **s as &mut dyn VideoSink),
            fps,
        );

        self.transition(PipelineState::Draining);
        source.close();
        if let Some(sink) = sink {
            sink.close();
        }
        self.transition(PipelineState::Closed);

        log::info!(
            "processed {} frames ({} written, {} write failures, {} detections), {:?}",
            summary.frames_processed,
            summary.frames_written,
            summary.write_failures,
            summary.detections,
            summary.termination
        );
        Ok(summary)
    }

    fn stream(
        &mut self,
        source: &mut dyn VideoSource,
        mut sink: Option<&mut dyn VideoSink>,
        fps: u32,
    ) -> RunSummary {
        let segmenter = self.config.segmenter();
        let annotator = self.config.annotator();
        let mut summary = RunSummary {
            frames_processed: 0,
            frames_written: 0,
            write_failures: 0,
            detections: 0,
            fps,
            termination: Termination::EndOfStream,
        };

        summary.termination = loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("end of stream after {} frames", summary.frames_processed);
                    break Termination::EndOfStream;
                }
                Err(e) => {
                    log::warn!("frame read failed; treating as end of stream: {:#}", e);
                    break Termination::EndOfStream;
                }
            };

            let mask = segmenter.segment(&frame);
            let annotation = annotator.annotate(&frame, &mask);
            summary.frames_processed += 1;
            summary.detections += annotation.boxes.len() as u64;
            log::debug!(
                "frame {}: {} red pixels, {} objects",
                frame.index,
                mask.count_foreground(),
                annotation.boxes.len()
            );

            self.presenter.display(&annotation.frame, &mask);

            if let Some(sink) = sink.as_mut() {
                match sink.write(&annotation.frame) {
                    Ok(()) => summary.frames_written += 1,
                    Err(e) => {
                        summary.write_failures += 1;
                        log::warn!("{}; continuing", e);
                    }
                }
            }

            if self.cancellation_requested() {
                log::info!(
                    "cancellation requested after {} frames",
                    summary.frames_processed
                );
                break Termination::Cancelled;
            }
        };

        summary
    }

    fn cancellation_requested(&mut self) -> bool {
        let key = self.presenter.poll_cancellation(self.config.poll_interval);
        key || self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn transition(&mut self, next: PipelineState) {
        log::debug!("pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counted(Rc<Cell<u32>>);

    impl Release for Counted {
        fn release(&mut self) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn lease_releases_on_close() {
        let count = Rc::new(Cell::new(0));
        let lease = Lease::new(Box::new(Counted(count.clone())), "test");
        lease.close();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn lease_releases_on_drop() {
        let count = Rc::new(Cell::new(0));
        {
            let _lease = Lease::new(Box::new(Counted(count.clone())), "test");
        }
        assert_eq!(count.get(), 1);
    }

    struct Failing;

    impl Release for Failing {
        fn release(&mut self) -> Result<()> {
            Err(anyhow!("device busy"))
        }
    }

    #[test]
    fn lease_swallows_release_errors() {
        Lease::new(Box::new(Failing), "test").close();
    }
}
