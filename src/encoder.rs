//! MPEG-4 (`mp4v`) video writer backed by an ffmpeg child process.
//!
//! Frames are streamed as packed rgb24 over ffmpeg's stdin, so every frame
//! written must be exactly [`FrameSize::frame_bytes`] long.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::io::{BufWriter, Write};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::error::{PipelineError, PipelineResult};
use crate::metadata::FrameSize;

/// Four-character code written into the container
pub const FOURCC: &str = "mp4v";

const PIPE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

pub fn ensure_ffmpeg_available(ffmpeg: &Path) -> PipelineResult<()> {
    let not_found = || PipelineError::ToolNotFound {
        tool: ffmpeg.display().to_string(),
    };
    let out = Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|_| not_found())?;
    if !out.success() {
        return Err(not_found());
    }
    Ok(())
}

pub struct VideoEncoder {
    output: PathBuf,
    size: FrameSize,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    frames_written: u64,
}

impl VideoEncoder {
    /// Start ffmpeg writing to `output`, overwriting any existing file
    pub fn open(
        ffmpeg: &Path,
        output: &Path,
        fps: NonZeroU32,
        size: FrameSize,
    ) -> PipelineResult<Self> {
        let mut cmd = Command::new(ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", size.width, size.height))
            .arg("-r")
            .arg(fps.to_string())
            .arg("-i")
            .arg("pipe:0")
            .arg("-c:v")
            .arg("mpeg4")
            .arg("-vtag")
            .arg(FOURCC)
            .arg("-q:v")
            .arg("2")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-f")
            .arg("mp4")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!("Spawning {:?} ({} bytes per frame)", cmd, size.frame_bytes());

        let mut child = cmd
            .spawn()
            .map_err(|e| PipelineError::io("start ffmpeg for", output, e))?;
        let stdin = child.stdin.take().ok_or_else(|| PipelineError::Encoder {
            output: output.to_path_buf(),
            message: "ffmpeg stdin was not captured".to_string(),
            stderr: None,
        })?;

        Ok(VideoEncoder {
            output: output.to_path_buf(),
            size,
            child: Some(child),
            stdin: Some(BufWriter::with_capacity(PIPE_BUFFER_BYTES, stdin)),
            frames_written: 0,
        })
    }

    /// Append the next frame.
    ///
    /// Frames that do not match the size taken from the first photo are
    /// scaled to it so the raw stream stays aligned.
    pub fn write_frame(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        let resized;
        let frame = if FrameSize::of(frame) != self.size {
            tracing::warn!(
                "Frame {} is {}, resizing to {}",
                self.frames_written,
                FrameSize::of(frame),
                self.size
            );
            resized = imageops::resize(
                frame,
                self.size.width,
                self.size.height,
                FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        debug_assert_eq!(frame.as_raw().len(), self.size.frame_bytes());

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.encoder_error("video writer already released", None));
        };
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            let stderr = self.kill_and_collect_stderr();
            return Err(self.encoder_error(&format!("writing frame failed: {e}"), stderr));
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush and close the stream, then wait for ffmpeg to finish the container
    pub fn finish(mut self) -> PipelineResult<u64> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.flush() {
                let stderr = self.kill_and_collect_stderr();
                return Err(self.encoder_error(&format!("flushing frames failed: {e}"), stderr));
            }
        }

        let Some(child) = self.child.take() else {
            return Err(self.encoder_error("video writer already released", None));
        };
        let output = child
            .wait_with_output()
            .map_err(|e| PipelineError::io("wait for ffmpeg writing", &self.output, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            remove_partial(&self.output);
            return Err(self.encoder_error(
                &format!("ffmpeg exited with {}", output.status),
                Some(stderr),
            ));
        }
        Ok(self.frames_written)
    }

    /// Stop ffmpeg and remove whatever it wrote so far
    pub fn abort(mut self) {
        self.abort_in_place();
    }

    fn abort_in_place(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            remove_partial(&self.output);
        }
    }

    fn kill_and_collect_stderr(&mut self) -> Option<String> {
        self.stdin.take();
        let mut child = self.child.take()?;
        let _ = child.kill();
        let output = child.wait_with_output().ok()?;
        remove_partial(&self.output);
        Some(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }

    fn encoder_error(&self, message: &str, stderr: Option<String>) -> PipelineError {
        if let Some(stderr) = stderr.as_deref().filter(|s| !s.is_empty()) {
            tracing::error!("ffmpeg: {}", stderr);
        }
        PipelineError::Encoder {
            output: self.output.clone(),
            message: message.to_string(),
            stderr,
        }
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        // Only reached with a live child when the run bailed out mid-encode
        self.abort_in_place();
    }
}

fn remove_partial(output: &Path) {
    if output.exists() {
        match std::fs::remove_file(output) {
            Ok(()) => tracing::debug!("Removed partial video {}", output.display()),
            Err(e) => tracing::warn!("Could not remove partial video {}: {}", output.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_missing_ffmpeg_is_tool_not_found() {
        let err = ensure_ffmpeg_available(Path::new("/nonexistent/ffmpeg-binary")).unwrap_err();
        assert!(matches!(err, PipelineError::ToolNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_open_with_missing_ffmpeg_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let size = FrameSize { width: 10, height: 10 };
        let fps = NonZeroU32::new(5).unwrap();

        let ffmpeg = Path::new("/nonexistent/ffmpeg-binary");
        let result = VideoEncoder::open(ffmpeg, &output, fps, size);
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
