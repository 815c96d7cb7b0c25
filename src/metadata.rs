use image::{ImageReader, RgbImage};
use std::fmt;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Output video dimensions, taken from the first snapshot photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn of(image: &RgbImage) -> Self {
        FrameSize {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Bytes in one packed rgb24 frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.width, self.height)
    }
}

/// Decode a photo into a packed RGB buffer.
///
/// `index` is the photo's position in the enumerated sequence and is only
/// used to make the error point at the offending frame.
pub fn decode_photo(path: &Path, index: usize) -> PipelineResult<RgbImage> {
    let decode_err = |source| PipelineError::Decode {
        path: path.to_path_buf(),
        index,
        source,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?;
    let image = reader.decode().map_err(decode_err)?;

    let rgb = image.into_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(decode_err(image::ImageError::Limits(
            image::error::LimitError::from_kind(image::error::LimitErrorKind::DimensionError),
        )));
    }
    Ok(rgb)
}

/// Decode the first photo and take its dimensions
pub fn probe_frame_size(first_photo: &Path) -> PipelineResult<FrameSize> {
    let image = decode_photo(first_photo, 0)?;
    Ok(FrameSize::of(&image))
}
