use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::filename::default_output_path;

/// What to do when a photo after the first one fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Abort the run, leaving the source folder in place
    #[default]
    FailFast,
    /// Log a warning and leave the frame out of the video
    Skip,
}

/// Validated settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output: Option<PathBuf>,
    pub fps: NonZeroU32,
    pub frame_policy: FramePolicy,
    pub verify_before_delete: bool,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>, fps: NonZeroU32) -> Self {
        PipelineConfig {
            input_dir: input_dir.into(),
            output: None,
            fps,
            frame_policy: FramePolicy::default(),
            verify_before_delete: false,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_frame_policy(mut self, policy: FramePolicy) -> Self {
        self.frame_policy = policy;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify_before_delete = verify;
        self
    }

    /// Parse a frame rate given on the command line
    pub fn parse_fps(value: &str) -> PipelineResult<NonZeroU32> {
        value
            .trim()
            .parse::<NonZeroU32>()
            .map_err(|_| PipelineError::InvalidFrameRate {
                value: value.to_string(),
            })
    }

    /// Output path for the selected date folder
    pub fn output_for(&self, date_folder: &Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(date_folder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_fps() {
        assert_eq!(PipelineConfig::parse_fps("5").unwrap().get(), 5);
        assert_eq!(PipelineConfig::parse_fps(" 30 ").unwrap().get(), 30);

        for bad in ["abc", "0", "-5", "2.5", ""] {
            let err = PipelineConfig::parse_fps(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "input {bad:?}");
        }
    }

    #[test]
    fn test_output_for() {
        let fps = NonZeroU32::new(5).unwrap();
        let config = PipelineConfig::new("/cam", fps);
        assert_eq!(
            config.output_for(Path::new("/cam/2023-06-01")),
            PathBuf::from("/cam/2023-06-01.mp4")
        );

        let config = config.with_output("/videos/today.mp4");
        assert_eq!(
            config.output_for(Path::new("/cam/2023-06-01")),
            PathBuf::from("/videos/today.mp4")
        );
    }
}
