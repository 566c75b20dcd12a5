use thiserror::Error;

/// Fatal pipeline failures. All of these surface during setup, before streaming starts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open video source {input:?}: {reason}")]
    Open { input: String, reason: String },
    #[error("video source reports invalid frame size {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("failed to create video output {output:?}: {reason}")]
    SinkOpen { output: String, reason: String },
    #[error("unexpected pipeline failure: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl PipelineError {
    /// Short classification label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Open { .. } => "open",
            PipelineError::InvalidDimensions { .. } => "invalid-dimensions",
            PipelineError::SinkOpen { .. } => "sink-open",
            PipelineError::Unexpected(_) => "unexpected",
        }
    }
}

/// A single frame could not be written to the sink. Always recoverable.
#[derive(Debug, Error)]
#[error("failed to write frame {index}: {reason}")]
pub struct FrameWriteError {
    pub index: u64,
    pub reason: String,
}

impl FrameWriteError {
    pub fn new(index: u64, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}
