//! Post-encode check of the finished video, run before the source photos are deleted.

use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::error::{PipelineError, PipelineResult};
use crate::metadata::FrameSize;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_read_frames: Option<String>,
}

/// What ffprobe reports for the first video stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStats {
    pub frame_count: u64,
    pub size: FrameSize,
    /// As ffprobe prints it, e.g. "5/1"
    pub frame_rate: Option<String>,
}

fn parse_probe_output(json: &str) -> Result<VideoStats, String> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let frame_count = stream
        .nb_read_frames
        .as_deref()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| "frame count not reported".to_string())?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err("dimensions not reported".to_string());
    };

    Ok(VideoStats {
        frame_count,
        size: FrameSize { width, height },
        frame_rate: stream.r_frame_rate,
    })
}

/// Decode the whole video with ffprobe and count its frames
pub fn probe_video(ffprobe: &Path, video: &Path) -> PipelineResult<VideoStats> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-count_frames",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_read_frames",
            "-of",
            "json",
        ])
        .arg(video)
        .output()
        .map_err(|_| PipelineError::ToolNotFound {
            tool: ffprobe.display().to_string(),
        })?;

    if !output.status.success() {
        return Err(PipelineError::VerifyFailed {
            output: video.to_path_buf(),
            message: format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(|message| {
        PipelineError::VerifyFailed {
            output: video.to_path_buf(),
            message,
        }
    })
}

/// Make sure the video holds exactly the frames that were written
pub fn verify_video(
    ffprobe: &Path,
    video: &Path,
    expected_frames: u64,
    expected_size: FrameSize,
) -> PipelineResult<VideoStats> {
    let stats = probe_video(ffprobe, video)?;
    tracing::debug!(
        "Probed {}: {} frames of {}",
        video.display(),
        stats.frame_count,
        stats.size
    );

    if stats.frame_count != expected_frames {
        return Err(PipelineError::VerifyFailed {
            output: video.to_path_buf(),
            message: format!(
                "expected {} frames, found {}",
                expected_frames, stats.frame_count
            ),
        });
    }
    if stats.size != expected_size {
        return Err(PipelineError::VerifyFailed {
            output: video.to_path_buf(),
            message: format!("expected size {}, found {}", expected_size, stats.size),
        });
    }
    Ok(stats)
}
