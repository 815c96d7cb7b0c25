use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{FramePolicy, PipelineConfig};
use crate::encoder::{ensure_ffmpeg_available, VideoEncoder};
use crate::error::{PipelineError, PipelineResult};
use crate::filename::{file_name_str, is_date_folder_name, is_photo_name};
use crate::metadata::{decode_photo, probe_frame_size, FrameSize};
use crate::verify::verify_video;

/// A date-named folder and the mtime it is ordered by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFolder {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub date_folder: PathBuf,
    pub output: PathBuf,
    pub frame_size: FrameSize,
    pub frames_written: u64,
    pub frames_skipped: usize,
    pub verified: bool,
    pub elapsed: Duration,
}

/// List the date folders directly under `input_dir`, oldest mtime first.
///
/// Folders with equal mtimes are ordered by name.
pub fn find_date_folders(input_dir: &Path) -> PipelineResult<Vec<DateFolder>> {
    let mut folders = Vec::new();

    for entry_result in WalkDir::new(input_dir).min_depth(1).max_depth(1) {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                return Err(PipelineError::io("list", input_dir, source));
            }
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };

        // Symlinked folders count; their target's mtime orders them
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_date_folder_name(&name) {
            continue;
        }

        let modified = fs::metadata(entry.path())
            .map_err(|e| PipelineError::io("read metadata of", entry.path(), e))?
            .modified()
            .map_err(|e| PipelineError::io("read mtime of", entry.path(), e))?;

        folders.push(DateFolder {
            path: entry.into_path(),
            modified,
        });
    }

    folders.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(folders)
}

/// Pick the date folder with the earliest mtime
pub fn select_date_folder(input_dir: &Path) -> PipelineResult<DateFolder> {
    find_date_folders(input_dir)?
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::NoDateFolder {
            input: input_dir.to_path_buf(),
        })
}

/// List the snapshot photos in a folder, sorted by file name
pub fn list_photos(folder: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut photos = Vec::new();

    for entry_result in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry_result.map_err(|err| {
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            PipelineError::io("list", folder, source)
        })?;

        // A dangling link is kept so that decoding reports it
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && !entry.path().is_dir());
        if !is_file {
            continue;
        }
        if !is_photo_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        photos.push(entry.into_path());
    }

    photos.sort_by_cached_key(|p| file_name_str(p));
    Ok(photos)
}

/// Refuse an output path that would be deleted along with the source folder
pub fn ensure_output_outside(output: &Path, folder: &Path) -> PipelineResult<()> {
    let inside = || PipelineError::OutputInsideSource {
        output: output.to_path_buf(),
        folder: folder.to_path_buf(),
    };
    if output.starts_with(folder) {
        return Err(inside());
    }

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let (Ok(parent), Ok(folder)) = (parent.canonicalize(), folder.canonicalize()) {
        if parent.starts_with(&folder) {
            return Err(inside());
        }
    }
    Ok(())
}

/// Runs the snapshot-to-video pipeline once against one input directory
pub struct Processor {
    config: PipelineConfig,
}

impl Processor {
    pub fn new(config: PipelineConfig) -> Self {
        Processor { config }
    }

    /// Select, encode, optionally verify, then delete the source folder.
    ///
    /// Any error returns before the folder is touched.
    pub fn run(&self) -> PipelineResult<RunSummary> {
        let started = Instant::now();

        let folder = select_date_folder(&self.config.input_dir)?;
        info!("Selected date folder {}", folder.path.display());

        info!("Getting all the snapshot photos");
        let photos = list_photos(&folder.path)?;
        info!("Found {} snapshot photos", photos.len());
        debug!(
            "Snapshot photos: {:?}",
            photos.iter().map(|p| file_name_str(p)).collect::<Vec<_>>()
        );
        let Some(first_photo) = photos.first() else {
            return Err(PipelineError::EmptyFrameSet {
                folder: folder.path.clone(),
            });
        };

        info!("Getting the size of the first snapshot photo");
        let frame_size = probe_frame_size(first_photo)?;
        info!("Size of the first snapshot photo: {}", frame_size);

        let output = self.config.output_for(&folder.path);
        ensure_output_outside(&output, &folder.path)?;
        let (frames_written, frames_skipped) = self.encode(&photos, &output, frame_size)?;

        let verified = if self.config.verify_before_delete {
            info!("Verifying {}", output.display());
            verify_video(&self.config.ffprobe, &output, frames_written, frame_size)?;
            true
        } else {
            false
        };

        remove_source_folder(&folder.path)?;
        info!("Deleted the input directory");
        info!("Cleaning up");

        Ok(RunSummary {
            date_folder: folder.path,
            output,
            frame_size,
            frames_written,
            frames_skipped,
            verified,
            elapsed: started.elapsed(),
        })
    }

    fn encode(
        &self,
        photos: &[PathBuf],
        output: &Path,
        frame_size: FrameSize,
    ) -> PipelineResult<(u64, usize)> {
        ensure_ffmpeg_available(&self.config.ffmpeg)?;

        info!("Creating the video writer");
        debug!("Output video: {}", output.display());
        let mut writer =
            VideoEncoder::open(&self.config.ffmpeg, output, self.config.fps, frame_size)?;

        info!("Writing each snapshot photo to the video writer");
        let mut skipped = 0;
        for (index, photo) in photos.iter().enumerate() {
            let frame = match decode_photo(photo, index) {
                Ok(frame) => frame,
                Err(e) if self.config.frame_policy == FramePolicy::Skip => {
                    warn!("Skipping frame: {}", e);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    writer.abort();
                    return Err(e);
                }
            };
            debug!("Writing frame {} from {}", index, file_name_str(photo));
            writer.write_frame(&frame)?;
        }

        info!("Releasing the video writer");
        let frames_written = writer.finish()?;
        Ok((frames_written, skipped))
    }
}

fn remove_source_folder(folder: &Path) -> PipelineResult<()> {
    fs::remove_dir_all(folder).map_err(|e| PipelineError::io("delete", folder, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_date_folders_ignores_other_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("2023-06-01")).unwrap();
        fs::create_dir(dir.path().join("2023-6-02")).unwrap();
        fs::create_dir(dir.path().join("misc")).unwrap();
        fs::write(dir.path().join("2023-06-03"), b"a file, not a folder").unwrap();
        fs::write(dir.path().join("video.log"), b"").unwrap();

        let folders = find_date_folders(dir.path()).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].path, dir.path().join("2023-06-01"));
    }

    #[test]
    fn test_list_photos_sorts_by_name() {
        let dir = TempDir::new().unwrap();
        for name in ["10.jpg", "002.jpg", "9.jpg", "001.jpg", "notes.txt", "003.png", "._004.jpg"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let names: Vec<String> = list_photos(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name_str(p))
            .collect();
        assert_eq!(names, vec!["001.jpg", "002.jpg", "10.jpg", "9.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_photos_are_listed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        fs::write(elsewhere.path().join("real.jpg"), b"").unwrap();
        fs::create_dir(elsewhere.path().join("subdir")).unwrap();

        fs::write(dir.path().join("000.jpg"), b"").unwrap();
        symlink(elsewhere.path().join("real.jpg"), dir.path().join("001.jpg")).unwrap();
        symlink(elsewhere.path().join("gone.jpg"), dir.path().join("002.jpg")).unwrap();
        symlink(elsewhere.path().join("subdir"), dir.path().join("003.jpg")).unwrap();

        let names: Vec<String> = list_photos(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name_str(p))
            .collect();
        assert_eq!(names, vec!["000.jpg", "001.jpg", "002.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_date_folder_is_found() {
        use filetime::FileTime;
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("day");
        fs::create_dir(&target).unwrap();
        filetime::set_file_mtime(&target, FileTime::from_unix_time(1_000, 0)).unwrap();
        symlink(&target, dir.path().join("2023-06-02")).unwrap();

        let real = dir.path().join("2023-06-01");
        fs::create_dir(&real).unwrap();
        filetime::set_file_mtime(&real, FileTime::from_unix_time(2_000, 0)).unwrap();

        let folders = find_date_folders(dir.path()).unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].path, dir.path().join("2023-06-02"));
        assert_eq!(
            folders[0].modified,
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
        );
    }

    #[test]
    fn test_output_inside_source_folder_is_rejected() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("2023-06-01");
        fs::create_dir(&folder).unwrap();

        let err = ensure_output_outside(&folder.join("out.mp4"), &folder).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);

        let dotted = dir.path().join(".").join("2023-06-01").join("out.mp4");
        assert!(ensure_output_outside(&dotted, &folder).is_err());

        assert!(ensure_output_outside(&dir.path().join("2023-06-01.mp4"), &folder).is_ok());
    }

    #[test]
    fn test_select_without_date_folder() {
        let dir = TempDir::new().unwrap();
        let err = select_date_folder(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::NoDateFolder { .. }));
    }

    #[test]
    fn test_missing_input_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = find_date_folders(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IoError);
    }
}
