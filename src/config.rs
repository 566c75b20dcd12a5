use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{ColorRange, ColorSegmenter, ObjectAnnotator, StrokeStyle, RED_HIGH, RED_LOW};
use crate::media::FourCc;
use crate::present::{KEY_ESC, KEY_QUIT};
use crate::{DEFAULT_FPS, DEFAULT_MIN_AREA};

const DEFAULT_INPUT: &str = "original.mp4";
const DEFAULT_OUTPUT: &str = "output.mp4";
const DEFAULT_SNAPSHOT_EVERY: u64 = 30;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Immutable per-run processing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Contours must have strictly greater area to be annotated.
    pub min_area: f64,
    pub ranges: [ColorRange; 2],
    pub codec: FourCc,
    /// Output fps when the source reports none.
    pub default_fps: u32,
    /// Upper bound on the per-iteration cancellation poll.
    pub poll_interval: Duration,
    pub stroke: StrokeStyle,
    /// Key codes that stop the run when pressed in the presenter.
    pub cancel_keys: [u8; 2],
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
            ranges: [RED_LOW, RED_HIGH],
            codec: FourCc::MP4V,
            default_fps: DEFAULT_FPS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stroke: StrokeStyle::default(),
            cancel_keys: [KEY_ESC, KEY_QUIT],
        }
    }
}

impl PipelineConfig {
    pub fn segmenter(&self) -> ColorSegmenter {
        ColorSegmenter::new(self.ranges)
    }

    pub fn annotator(&self) -> ObjectAnnotator {
        ObjectAnnotator::new(self.min_area, self.stroke)
    }

    /// Whole frames per second for the sink: the reported rate truncated, or
    /// `default_fps` when that is not positive.
    pub fn effective_fps(&self, reported: f64) -> u32 {
        if reported.is_finite() && reported >= 1.0 {
            reported.min(u32::MAX as f64) as u32
        } else {
            self.default_fps
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(anyhow!(
                "min_area must be a finite, non-negative number (got {})",
                self.min_area
            ));
        }
        if self.default_fps == 0 {
            return Err(anyhow!("default_fps must be greater than zero"));
        }
        for range in &self.ranges {
            let (lo, hi) = (range.lower, range.upper);
            if lo.h > hi.h || lo.s > hi.s || lo.v > hi.v {
                return Err(anyhow!("color range lower bound exceeds upper bound: {:?}", range));
            }
            if hi.h > 180 {
                return Err(anyhow!("hue bound {} is above 180", hi.h));
            }
        }
        if self.stroke.width == 0 {
            return Err(anyhow!("stroke width must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct RedmarkConfigFile {
    input: Option<String>,
    output: Option<String>,
    min_area: Option<f64>,
    codec: Option<FourCc>,
    default_fps: Option<u32>,
    ranges: Option<[ColorRange; 2]>,
    stroke: Option<StrokeStyle>,
    snapshots: Option<SnapshotConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    dir: Option<PathBuf>,
    every: Option<u64>,
}

/// Application configuration: paths plus the pipeline parameters.
#[derive(Debug, Clone)]
pub struct RedmarkConfig {
    pub input: String,
    /// `None` disables the output file.
    pub output: Option<String>,
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_every: u64,
    pub pipeline: PipelineConfig,
}

impl Default for RedmarkConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.to_string(),
            output: Some(DEFAULT_OUTPUT.to_string()),
            snapshot_dir: None,
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl RedmarkConfig {
    /// Defaults, then the JSON file named by `REDMARK_CONFIG`, then `REDMARK_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("REDMARK_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RedmarkConfigFile) -> Self {
        let defaults = Self::default();
        let pipeline = PipelineConfig {
            min_area: file.min_area.unwrap_or(defaults.pipeline.min_area),
            codec: file.codec.unwrap_or(defaults.pipeline.codec),
            default_fps: file.default_fps.unwrap_or(defaults.pipeline.default_fps),
            ranges: file.ranges.unwrap_or(defaults.pipeline.ranges),
            stroke: file.stroke.unwrap_or(defaults.pipeline.stroke),
            ..defaults.pipeline
        };
        let output = match file.output {
            Some(output) => non_empty(output),
            None => defaults.output,
        };
        Self {
            input: file.input.unwrap_or(defaults.input),
            output,
            snapshot_dir: file.snapshots.as_ref().and_then(|s| s.dir.clone()),
            snapshot_every: file
                .snapshots
                .and_then(|s| s.every)
                .unwrap_or(defaults.snapshot_every),
            pipeline,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(input) = std::env::var("REDMARK_INPUT") {
            if !input.trim().is_empty() {
                self.input = input;
            }
        }
        if let Ok(output) = std::env::var("REDMARK_OUTPUT") {
            self.output = non_empty(output);
        }
        if let Ok(min_area) = std::env::var("REDMARK_MIN_AREA") {
            self.pipeline.min_area = min_area
                .trim()
                .parse()
                .map_err(|_| anyhow!("REDMARK_MIN_AREA must be a number"))?;
        }
        if let Ok(codec) = std::env::var("REDMARK_CODEC") {
            self.pipeline.codec = codec.trim().parse()?;
        }
        if let Ok(dir) = std::env::var("REDMARK_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.snapshot_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(anyhow!("input must not be empty"));
        }
        if self.snapshot_every == 0 {
            return Err(anyhow!("snapshot interval must be >= 1"));
        }
        self.pipeline.validate()
    }
}

fn read_config_file(path: &Path) -> Result<RedmarkConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_fps_falls_back() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.effective_fps(0.0), 30);
        assert_eq!(cfg.effective_fps(-5.0), 30);
        assert_eq!(cfg.effective_fps(f64::NAN), 30);
        assert_eq!(cfg.effective_fps(0.5), 30);
        assert_eq!(cfg.effective_fps(25.0), 25);
        assert_eq!(cfg.effective_fps(29.97), 29);
    }

    #[test]
    fn validate_rejects_bad_min_area() {
        let mut cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.min_area = -1.0;
        assert!(cfg.validate().is_err());
        cfg.min_area = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_output_in_file_disables_sink() {
        let file: RedmarkConfigFile =
            serde_json::from_str(r#"{ "output": "", "min_area": 250 }"#).unwrap();
        let cfg = RedmarkConfig::from_file(file);
        assert_eq!(cfg.output, None);
        assert_eq!(cfg.pipeline.min_area, 250.0);
        assert_eq!(cfg.input, "original.mp4");
    }

    #[test]
    fn ranges_and_stroke_load_from_file() {
        let file: RedmarkConfigFile = serde_json::from_str(
            r#"{
                "ranges": [
                    { "lower": { "h": 0, "s": 50, "v": 50 }, "upper": { "h": 8, "s": 255, "v": 255 } },
                    { "lower": { "h": 172, "s": 50, "v": 50 }, "upper": { "h": 180, "s": 255, "v": 255 } }
                ],
                "stroke": { "color": [255, 0, 0], "width": 3 }
            }"#,
        )
        .unwrap();
        let cfg = RedmarkConfig::from_file(file);
        assert_eq!(cfg.pipeline.ranges[0].upper.h, 8);
        assert_eq!(cfg.pipeline.ranges[1].lower.s, 50);
        assert_eq!(cfg.pipeline.stroke.color, [255, 0, 0]);
        assert_eq!(cfg.pipeline.stroke.width, 3);
        assert!(cfg.validate().is_ok());
        // Value 60 passes only the widened lower saturation/value bound.
        let dim_red = crate::Frame::filled(2, 2, [0, 0, 60], 0);
        assert_eq!(cfg.pipeline.segmenter().segment(&dim_red).count_foreground(), 4);
        assert_eq!(ColorSegmenter::red().segment(&dim_red).count_foreground(), 0);
    }

    #[test]
    fn validate_rejects_inverted_range_and_zero_stroke() {
        let mut cfg = PipelineConfig::default();
        cfg.ranges[0].lower.h = 20;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.stroke.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_match_fixed_constants() {
        let cfg = RedmarkConfig::from_file(RedmarkConfigFile::default());
        assert_eq!(cfg.output.as_deref(), Some("output.mp4"));
        assert_eq!(cfg.pipeline.min_area, 100.0);
        assert_eq!(cfg.pipeline.codec.to_string(), "mp4v");
        assert_eq!(cfg.pipeline.default_fps, 30);
        assert_eq!(cfg.pipeline.cancel_keys, [27, b'q']);
    }
}
