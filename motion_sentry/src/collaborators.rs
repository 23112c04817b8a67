// THEORY:
// The engine itself never opens a file. Frames come in through a `VideoSource`
// and persisted images go out through a `FrameStore`; both are plain traits so
// the pipeline can be driven by a video decoder, a directory of stills, or an
// in-memory list in tests. Directory-backed implementations live in
// `utils::image_helper`; an OpenCV decoder lives in the batch runner.

use std::collections::{BTreeMap, VecDeque};

use image::RgbImage;

use crate::error::{MotionError, Result};

/// Supplies color frames in arrival order.
pub trait VideoSource {
    /// Name used in logs and for the per-source output directory.
    fn name(&self) -> &str;

    /// Next frame, `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Durably stores an image under a key such as `frame_25.jpg`.
pub trait FrameStore {
    fn write(&mut self, key: &str, image: &RgbImage) -> Result<()>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).read_frame()
    }
}

impl<F: FrameStore + ?Sized> FrameStore for Box<F> {
    fn write(&mut self, key: &str, image: &RgbImage) -> Result<()> {
        (**self).write(key, image)
    }
}

/// A finite, pre-decoded stream.
pub struct MemorySource {
    name: String,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl VideoSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Keeps written images in a map. Keys listed in `fail_on` are rejected with a
/// `WriteFailure`, which is how tests exercise the failure path.
#[derive(Default)]
pub struct MemoryFrameStore {
    images: BTreeMap<String, RgbImage>,
    fail_on: Vec<String>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            images: BTreeMap::new(),
            fail_on: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RgbImage> {
        self.images.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl FrameStore for MemoryFrameStore {
    fn write(&mut self, key: &str, image: &RgbImage) -> Result<()> {
        if self.fail_on.iter().any(|k| k == key) {
            return Err(MotionError::WriteFailure {
                key: key.to_string(),
                source: image::ImageError::IoError(std::io::Error::other("rejected by store")),
            });
        }
        self.images.insert(key.to_string(), image.clone());
        Ok(())
    }
}
