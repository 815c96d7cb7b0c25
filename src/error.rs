//! Error types for the snapshot-to-video pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification an operator can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    EmptyFrameSet,
    DecodeError,
    InvalidArgument,
    IoError,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no matching date folder (YYYY-MM-DD) under {}", input.display())]
    NoDateFolder { input: PathBuf },

    #[error("no photos (*.jpg) in folder {}", folder.display())]
    EmptyFrameSet { folder: PathBuf },

    #[error("bad image at frame {index}: {}", path.display())]
    Decode {
        path: PathBuf,
        index: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("bad frame rate {value:?}: expected a positive integer")]
    InvalidFrameRate { value: String },

    #[error("could not {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} not found or not runnable")]
    ToolNotFound { tool: String },

    #[error("could not write video {}: {message}", output.display())]
    Encoder {
        output: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("verification of {} failed: {message}", output.display())]
    VerifyFailed { output: PathBuf, message: String },

    #[error("output {} would be deleted along with {}", output.display(), folder.display())]
    OutputInsideSource { output: PathBuf, folder: PathBuf },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NoDateFolder { .. } => ErrorKind::NotFound,
            PipelineError::EmptyFrameSet { .. } => ErrorKind::EmptyFrameSet,
            PipelineError::Decode { .. } => ErrorKind::DecodeError,
            PipelineError::InvalidFrameRate { .. } | PipelineError::OutputInsideSource { .. } => {
                ErrorKind::InvalidArgument
            }
            PipelineError::Io { .. }
            | PipelineError::ToolNotFound { .. }
            | PipelineError::Encoder { .. }
            | PipelineError::VerifyFailed { .. } => ErrorKind::IoError,
        }
    }

    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        PipelineError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = PipelineError::NoDateFolder { input: "/cam".into() };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = PipelineError::InvalidFrameRate { value: "abc".into() };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = PipelineError::io(
            "delete",
            "/cam/2023-06-01",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.kind(), ErrorKind::IoError);

        let err = PipelineError::OutputInsideSource {
            output: "/cam/2023-06-01/out.mp4".into(),
            folder: "/cam/2023-06-01".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = PipelineError::VerifyFailed {
            output: "/cam/2023-06-01.mp4".into(),
            message: "expected 3 frames, found 2".into(),
        };
        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = PipelineError::EmptyFrameSet { folder: "/cam/2023-06-01".into() };
        assert_eq!(err.to_string(), "no photos (*.jpg) in folder /cam/2023-06-01");

        let err = PipelineError::InvalidFrameRate { value: "abc".into() };
        assert!(err.to_string().starts_with("bad frame rate \"abc\""));
    }
}
