// Disk-backed collaborators: a frame store that writes encoded images into a
// directory, and a video source that replays a directory of still frames.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, warn};

use crate::collaborators::{FrameStore, VideoSource};
use crate::error::{MotionError, Result};

/// File extensions accepted as still frames.
pub const FRAME_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Encodes `image` with the format implied by `path`'s extension.
pub fn save(path: &Path, image: &RgbImage) -> Result<(), image::ImageError> {
    image.save(path)
}

pub fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Writes every image as `<dir>/<key>`, creating `dir` on first use.
pub struct DirectoryFrameStore {
    dir: PathBuf,
    created: bool,
}

impl DirectoryFrameStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl FrameStore for DirectoryFrameStore {
    fn write(&mut self, key: &str, image: &RgbImage) -> Result<()> {
        let to_failure = |source: image::ImageError| MotionError::WriteFailure {
            key: key.to_string(),
            source,
        };

        if !self.created {
            fs::create_dir_all(&self.dir).map_err(|e| to_failure(image::ImageError::IoError(e)))?;
            self.created = true;
        }

        let path = self.path_for(key);
        save(&path, image).map_err(to_failure)?;
        debug!(path = %path.display(), "stored image");
        Ok(())
    }
}

/// Replays the still frames of a directory in lexical file-name order.
/// Files that fail to decode are logged and skipped.
pub struct ImageSequenceSource {
    name: String,
    frames: std::vec::IntoIter<PathBuf>,
    skipped: usize,
}

impl ImageSequenceSource {
    /// Lists the frames of `dir`. Fails with `SourceUnavailable` when the
    /// directory cannot be read or holds no frames.
    pub fn open(dir: &Path) -> Result<Self> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let unavailable = |reason: String| MotionError::SourceUnavailable {
            source_name: name.clone(),
            reason,
        };

        let entries = fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        if frames.is_empty() {
            return Err(unavailable("directory contains no frames".into()));
        }
        frames.sort();

        Ok(Self {
            name,
            frames: frames.into_iter(),
            skipped: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Number of files skipped because they could not be decoded.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl VideoSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        for path in self.frames.by_ref() {
            match image::open(&path) {
                Ok(decoded) => return Ok(Some(decoded.into_rgb8())),
                Err(source) => {
                    let err = MotionError::FrameDecode { path, source };
                    warn!(source = %self.name, error = %err, "skipping undecodable frame");
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn frame_files_are_recognized_case_insensitively() {
        assert!(is_frame_file(Path::new("a/frame_001.PNG")));
        assert!(is_frame_file(Path::new("b.jpeg")));
        assert!(!is_frame_file(Path::new("clip.mp4")));
        assert!(!is_frame_file(Path::new("noext")));
    }

    #[test]
    fn store_creates_directory_and_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirectoryFrameStore::new(tmp.path().join("out").join("clip"));
        store.write("frame_5.png", &RgbImage::from_pixel(4, 4, Rgb([9, 8, 7]))).unwrap();
        let written = image::open(store.path_for("frame_5.png")).unwrap().into_rgb8();
        assert_eq!(written.get_pixel(2, 2).0, [9, 8, 7]);
    }

    #[test]
    fn store_reports_write_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let mut store = DirectoryFrameStore::new(blocker.join("clip"));
        let err = store.write("frame_1.png", &RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, MotionError::WriteFailure { .. }));
    }

    #[test]
    fn sequence_replays_frames_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            save(&tmp.path().join(name), &RgbImage::from_pixel(3, 3, Rgb([value; 3]))).unwrap();
        }
        fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequenceSource::open(tmp.path()).unwrap();
        assert_eq!(source.remaining(), 3);
        let values: Vec<u8> = std::iter::from_fn(|| source.read_frame().unwrap())
            .map(|frame| frame.get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ImageSequenceSource::open(tmp.path()).err().unwrap();
        assert!(matches!(err, MotionError::SourceUnavailable { .. }));
        let err = ImageSequenceSource::open(&tmp.path().join("missing")).err().unwrap();
        assert!(matches!(err, MotionError::SourceUnavailable { .. }));
    }

    #[test]
    fn undecodable_frames_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        save(&tmp.path().join("a.png"), &RgbImage::from_pixel(3, 3, Rgb([10; 3]))).unwrap();
        fs::write(tmp.path().join("b.png"), b"definitely not a png").unwrap();
        save(&tmp.path().join("c.png"), &RgbImage::from_pixel(3, 3, Rgb([30; 3]))).unwrap();

        let mut source = ImageSequenceSource::open(tmp.path()).unwrap();
        let values: Vec<u8> = std::iter::from_fn(|| source.read_frame().unwrap())
            .map(|frame| frame.get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(values, vec![10, 30]);
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn directory_of_only_broken_frames_ends_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("broken.png"), b"definitely not a png").unwrap();
        let mut source = ImageSequenceSource::open(tmp.path()).unwrap();
        assert!(source.read_frame().unwrap().is_none());
        assert_eq!(source.skipped(), 1);
    }
}
