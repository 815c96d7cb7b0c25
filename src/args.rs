use clap::Parser;
use std::path::PathBuf;

use crate::config::{FramePolicy, PipelineConfig};
use crate::error::PipelineResult;

/// Combine all snapshot photos of the oldest date folder into a video,
/// then delete the photos.
#[derive(Debug, Parser)]
#[command(name = "time_lapse", version)]
pub struct Args {
    /// The input directory that contains the dated snapshot folders
    #[arg(short, long)]
    pub input: PathBuf,

    /// The output video file (default: <date folder>.mp4)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The FPS of the output video
    #[arg(short, long)]
    pub fps: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Leave out frames that fail to decode instead of aborting the run
    #[arg(long)]
    pub skip_bad_frames: bool,

    /// Count the frames of the finished video before deleting the photos
    #[arg(long)]
    pub verify: bool,

    /// Do not echo log lines to the terminal
    #[arg(short, long)]
    pub quiet: bool,

    /// ffmpeg executable used to encode the video
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe executable used by --verify
    #[arg(long, default_value = "ffprobe")]
    pub ffprobe: PathBuf,
}

impl Args {
    /// Validate the arguments into a pipeline configuration
    pub fn into_config(self) -> PipelineResult<PipelineConfig> {
        let fps = PipelineConfig::parse_fps(&self.fps)?;
        let frame_policy = if self.skip_bad_frames {
            FramePolicy::Skip
        } else {
            FramePolicy::FailFast
        };

        Ok(PipelineConfig {
            input_dir: self.input,
            output: self.output,
            fps,
            frame_policy,
            verify_before_delete: self.verify,
            ffmpeg: self.ffmpeg,
            ffprobe: self.ffprobe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["time_lapse", "--input", "/cam"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_arg_parsing() {
        let args = parse(&["--fps", "5", "-o", "/tmp/out.mp4", "-d"]).unwrap();
        assert_eq!(args.input, PathBuf::from("/cam"));
        assert_eq!(args.output, Some(PathBuf::from("/tmp/out.mp4")));
        assert!(args.debug);
        assert!(!args.verify);

        let config = args.into_config().unwrap();
        assert_eq!(config.fps.get(), 5);
        assert_eq!(config.frame_policy, FramePolicy::FailFast);
        assert_eq!(config.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_fps_is_required() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_non_numeric_fps_is_invalid_argument() {
        let args = parse(&["--fps", "abc"]).unwrap();
        let err = args.into_config().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_opt_in_flags() {
        let args = parse(&["-f", "30", "--skip-bad-frames", "--verify", "-q"]).unwrap();
        assert!(args.quiet);
        let config = args.into_config().unwrap();
        assert_eq!(config.frame_policy, FramePolicy::Skip);
        assert!(config.verify_before_delete);
    }
}
