//! Pipeline lifecycle tests.
//!
//! Scripted media and presenter doubles record every open, write, display and
//! release so resource handling and frame ordering can be checked exactly.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use redmark::{
    BoundingBox, CancelToken, FileMedia, Frame, FrameWriteError, Mask, MediaBackend,
    NullPresenter, PipelineConfig, PipelineError, PipelineState, Presenter, Release, SinkParams,
    StreamInfo, Termination, VideoPipeline, VideoSink, VideoSource,
};

#[derive(Default)]
struct Events {
    source_opened: u32,
    source_released: u32,
    sink_opened: u32,
    sink_released: u32,
    sink_params: Option<SinkParams>,
    written: Vec<u64>,
    displayed: Vec<u64>,
}

type Shared = Rc<RefCell<Events>>;

#[derive(Clone)]
struct Script {
    open_fails: bool,
    info: StreamInfo,
    frames: u64,
    read_error_at: Option<u64>,
    sink_open_fails: bool,
    write_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            open_fails: false,
            info: StreamInfo {
                width: 64,
                height: 48,
                fps: 25.0,
            },
            frames: 5,
            read_error_at: None,
            sink_open_fails: false,
            write_fails: false,
        }
    }
}

struct ScriptedMedia {
    script: Script,
    events: Shared,
}

impl MediaBackend for ScriptedMedia {
    fn open_source(&mut self, _input: &str) -> Result<Box<dyn VideoSource>> {
        if self.script.open_fails {
            return Err(anyhow!("no such file"));
        }
        self.events.borrow_mut().source_opened += 1;
        Ok(Box::new(ScriptedSource {
            script: self.script.clone(),
            next: 0,
            events: self.events.clone(),
        }))
    }

    fn open_sink(&mut self, _output: &str, params: &SinkParams) -> Result<Box<dyn VideoSink>> {
        if self.script.sink_open_fails {
            return Err(anyhow!("permission denied"));
        }
        let mut events = self.events.borrow_mut();
        events.sink_opened += 1;
        events.sink_params = Some(*params);
        Ok(Box::new(ScriptedSink {
            params: *params,
            fails: self.script.write_fails,
            events: self.events.clone(),
        }))
    }
}

struct ScriptedSource {
    script: Script,
    next: u64,
    events: Shared,
}

impl VideoSource for ScriptedSource {
    fn info(&self) -> StreamInfo {
        self.script.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if Some(self.next) == self.script.read_error_at {
            return Err(anyhow!("corrupt packet"));
        }
        if self.next >= self.script.frames {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        let width = self.script.info.width as u32;
        let height = self.script.info.height as u32;
        let mut frame = Frame::filled(width, height, [0, 0, 0], index);
        frame.fill_rect(BoundingBox::new(4, 4, 16, 16), [0, 0, 255]);
        Ok(Some(frame))
    }
}

impl Release for ScriptedSource {
    fn release(&mut self) -> Result<()> {
        self.events.borrow_mut().source_released += 1;
        Ok(())
    }
}

struct ScriptedSink {
    params: SinkParams,
    fails: bool,
    events: Shared,
}

impl VideoSink for ScriptedSink {
    fn params(&self) -> &SinkParams {
        &self.params
    }

    fn write(&mut self, frame: &Frame) -> Result<(), FrameWriteError> {
        if self.fails {
            return Err(FrameWriteError::new(frame.index, "disk full"));
        }
        self.events.borrow_mut().written.push(frame.index);
        Ok(())
    }
}

impl Release for ScriptedSink {
    fn release(&mut self) -> Result<()> {
        self.events.borrow_mut().sink_released += 1;
        Ok(())
    }
}

struct RecordingPresenter {
    events: Shared,
    cancel_after: Option<usize>,
}

impl Presenter for RecordingPresenter {
    fn display(&mut self, annotated: &Frame, mask: &Mask) {
        assert!(mask.matches(annotated));
        self.events.borrow_mut().displayed.push(annotated.index);
    }

    fn poll_cancellation(&mut self, _timeout: Duration) -> bool {
        self.cancel_after
            .is_some_and(|n| self.events.borrow().displayed.len() >= n)
    }
}

fn harness(
    script: Script,
    cancel_after: Option<usize>,
) -> (ScriptedMedia, RecordingPresenter, Shared) {
    let events = Shared::default();
    (
        ScriptedMedia {
            script,
            events: events.clone(),
        },
        RecordingPresenter {
            events: events.clone(),
            cancel_after,
        },
        events,
    )
}

#[test]
fn unknown_fps_opens_sink_at_default_rate() {
    let config = PipelineConfig::default();
    let mut script = Script::default();
    script.info.fps = 0.0;
    let (media, presenter, events) = harness(script, None);

    let mut pipeline = VideoPipeline::new(&config, media, presenter);
    let summary = pipeline.run("in.mp4", Some("out.mp4")).expect("run");

    let params = events.borrow().sink_params.expect("sink opened");
    assert_eq!(params.fps, 30);
    assert_eq!((params.width, params.height), (64, 48));
    assert_eq!(params.codec.to_string(), "mp4v");
    assert_eq!(summary.fps, 30);
}

#[test]
fn reported_fps_is_used_when_positive() {
    let config = PipelineConfig::default();
    let (media, presenter, events) = harness(Script::default(), None);

    VideoPipeline::new(&config, media, presenter)
        .run("in.mp4", Some("out.mp4"))
        .expect("run");

    assert_eq!(events.borrow().sink_params.unwrap().fps, 25);
}

#[test]
fn source_open_failure_never_creates_sink() {
    let config = PipelineConfig::default();
    let script = Script {
        open_fails: true,
        ..Script::default()
    };
    let (media, presenter, events) = harness(script, None);

    let mut pipeline = VideoPipeline::new(&config, media, presenter);
    let err = pipeline.run("missing.mp4", Some("out.mp4")).unwrap_err();

    assert!(matches!(err, PipelineError::Open { ref input, .. } if input == "missing.mp4"));
    assert_eq!(pipeline.state(), PipelineState::FailedOpen);
    let events = events.borrow();
    assert_eq!(events.sink_opened, 0);
    assert_eq!(events.source_released, 0);
    assert!(events.displayed.is_empty());
}

#[test]
fn invalid_dimensions_release_source() {
    let config = PipelineConfig::default();
    for (width, height) in [(0, 48), (64, 0), (-1, 48)] {
        let mut script = Script::default();
        script.info.width = width;
        script.info.height = height;
        let (media, presenter, events) = harness(script, None);

        let err = VideoPipeline::new(&config, media, presenter)
            .run("in.mp4", Some("out.mp4"))
            .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidDimensions { .. }));
        let events = events.borrow();
        assert_eq!(events.source_opened, 1);
        assert_eq!(events.source_released, 1);
        assert_eq!(events.sink_opened, 0);
    }
}

#[test]
fn sink_open_failure_releases_source() {
    let config = PipelineConfig::default();
    let script = Script {
        sink_open_fails: true,
        ..Script::default()
    };
    let (media, presenter, events) = harness(script, None);

    let mut pipeline = VideoPipeline::new(&config, media, presenter);
    let err = pipeline.run("in.mp4", Some("/readonly/out.mp4")).unwrap_err();

    assert!(matches!(err, PipelineError::SinkOpen { .. }));
    assert_eq!(err.kind(), "sink-open");
    assert_eq!(pipeline.state(), PipelineState::FailedSinkOpen);
    let events = events.borrow();
    assert_eq!(events.source_released, 1);
    assert!(events.displayed.is_empty());
}

#[test]
fn write_failures_are_recoverable_and_teardown_is_exact() {
    let config = PipelineConfig::default();
    let script = Script {
        write_fails: true,
        frames: 7,
        ..Script::default()
    };
    let (media, presenter, events) = harness(script, None);

    let mut pipeline = VideoPipeline::new(&config, media, presenter);
    let summary = pipeline.run("in.mp4", Some("out.mp4")).expect("run");

    assert_eq!(summary.frames_processed, 7);
    assert_eq!(summary.frames_written, 0);
    assert_eq!(summary.write_failures, 7);
    assert_eq!(summary.termination, Termination::EndOfStream);
    assert_eq!(pipeline.state(), PipelineState::Closed);
    let events = events.borrow();
    assert_eq!(events.source_released, 1);
    assert_eq!(events.sink_released, 1);
}

#[test]
fn frames_flow_in_source_order() {
    let config = PipelineConfig::default();
    let script = Script {
        frames: 12,
        ..Script::default()
    };
    let (media, presenter, events) = harness(script, None);

    let summary = VideoPipeline::new(&config, media, presenter)
        .run("in.mp4", Some("out.mp4"))
        .expect("run");

    let expected: Vec<u64> = (0..12).collect();
    let events = events.borrow();
    assert_eq!(events.displayed, expected);
    assert_eq!(events.written, expected);
    assert_eq!(summary.frames_written, 12);
    // One 16x16 square per frame.
    assert_eq!(summary.detections, 12);
}

#[test]
fn presenter_cancellation_drains_cleanly() {
    let config = PipelineConfig::default();
    let script = Script {
        frames: 50,
        ..Script::default()
    };
    let (media, presenter, events) = harness(script, Some(3));

    let mut pipeline = VideoPipeline::new(&config, media, presenter);
    let summary = pipeline.run("in.mp4", Some("out.mp4")).expect("run");

    assert_eq!(summary.termination, Termination::Cancelled);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(pipeline.state(), PipelineState::Closed);
    let events = events.borrow();
    assert_eq!(events.written, vec![0, 1, 2]);
    assert_eq!(events.source_released, 1);
    assert_eq!(events.sink_released, 1);
}

#[test]
fn cancel_token_stops_after_current_frame() {
    let config = PipelineConfig::default();
    let (media, presenter, events) = harness(Script::default(), None);
    let token = CancelToken::new();
    token.cancel();

    let summary = VideoPipeline::new(&config, media, presenter)
        .with_cancel_token(token)
        .run("in.mp4", None)
        .expect("run");

    assert_eq!(summary.termination, Termination::Cancelled);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(events.borrow().source_released, 1);
}

#[test]
fn read_error_ends_stream_normally() {
    let config = PipelineConfig::default();
    let script = Script {
        frames: 10,
        read_error_at: Some(4),
        ..Script::default()
    };
    let (media, presenter, events) = harness(script, None);

    let summary = VideoPipeline::new(&config, media, presenter)
        .run("in.mp4", Some("out.mp4"))
        .expect("run");

    assert_eq!(summary.termination, Termination::EndOfStream);
    assert_eq!(summary.frames_processed, 4);
    let events = events.borrow();
    assert_eq!(events.source_released, 1);
    assert_eq!(events.sink_released, 1);
}

#[test]
fn no_output_skips_sink() {
    let config = PipelineConfig::default();
    let (media, presenter, events) = harness(Script::default(), None);

    let summary = VideoPipeline::new(&config, media, presenter)
        .run("in.mp4", None)
        .expect("run");

    assert_eq!(summary.frames_written, 0);
    let events = events.borrow();
    assert_eq!(events.sink_opened, 0);
    assert_eq!(events.sink_released, 0);
    assert_eq!(events.displayed.len(), 5);
}

#[test]
fn pipeline_runs_once() {
    let config = PipelineConfig::default();
    let (media, presenter, _events) = harness(Script::default(), None);

    let mut pipeline = VideoPipeline::new(&config, media, presenter);
    pipeline.run("in.mp4", None).expect("first run");
    let err = pipeline.run("in.mp4", None).unwrap_err();
    assert!(matches!(err, PipelineError::Unexpected(_)));
}

#[test]
fn invalid_config_is_unexpected_error() {
    let config = PipelineConfig {
        min_area: f64::NAN,
        ..PipelineConfig::default()
    };
    let (media, presenter, events) = harness(Script::default(), None);

    let err = VideoPipeline::new(&config, media, presenter)
        .run("in.mp4", None)
        .unwrap_err();
    assert_eq!(err.kind(), "unexpected");
    assert_eq!(events.borrow().source_opened, 0);
}

#[test]
fn file_media_synthetic_clip_end_to_end() {
    let config = PipelineConfig::default();
    let mut pipeline = VideoPipeline::new(&config, FileMedia::new(), NullPresenter);

    let summary = pipeline
        .run("stub://clip?frames=10&fps=0", Some("stub://null"))
        .expect("run");

    assert_eq!(summary.frames_processed, 10);
    assert_eq!(summary.frames_written, 10);
    assert_eq!(summary.fps, 30);
    // The moving square is boxed; the static speck is below the area threshold.
    assert_eq!(summary.detections, 10);
    assert_eq!(pipeline.state(), PipelineState::Closed);
}

#[test]
fn file_media_rejects_network_input() {
    let config = PipelineConfig::default();
    let err = VideoPipeline::new(&config, FileMedia::new(), NullPresenter)
        .run("rtsp://camera/stream", None)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Open { .. }));
}

#[test]
fn boxed_presenter_drives_the_run() {
    let config = PipelineConfig::default();
    let (media, presenter, events) = harness(Script::default(), Some(2));
    let boxed: Box<dyn Presenter> = Box::new(presenter);

    let summary = VideoPipeline::new(&config, media, boxed)
        .run("in.mp4", None)
        .expect("run");

    assert_eq!(summary.termination, Termination::Cancelled);
    assert_eq!(events.borrow().displayed, vec![0, 1]);
}
