use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Extension of the snapshot photos, matched case-sensitively
pub const PHOTO_EXTENSION: &str = "jpg";

/// Extension appended to the date folder path when no output is given
pub const VIDEO_EXTENSION: &str = "mp4";

/// Name of the run log inside the source directory
pub const LOG_FILE_NAME: &str = "video.log";

fn date_folder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Digit shapes only, so "2023-13-39" is accepted
    RE.get_or_init(|| Regex::new(r"^\d{4}-(0[0-9]|1[0-9])-([0-3][0-9])$").unwrap())
}

/// Check whether a directory name looks like YYYY-MM-DD
pub fn is_date_folder_name(name: &str) -> bool {
    date_folder_regex().is_match(name)
}

/// Check whether a file name is a snapshot photo
pub fn is_photo_name(name: &str) -> bool {
    // Hidden files (including AppleDouble "._*") never count as photos
    if name.starts_with('.') {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .map_or(false, |ext| ext == PHOTO_EXTENSION)
}

/// Derive the default output path: `<folder>.mp4` next to the folder
pub fn default_output_path(date_folder: &Path) -> PathBuf {
    let mut name = date_folder.as_os_str().to_os_string();
    name.push(".");
    name.push(VIDEO_EXTENSION);
    PathBuf::from(name)
}

/// Get the file name of a path as a string, for ordering and logging
pub fn file_name_str(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
