use std::path::Path;

use image::RgbImage;
use motion_sentry::{MotionError, Result, VideoSource};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::info;

/// Decodes a video container frame by frame through OpenCV.
pub struct OpenCvSource {
    name: String,
    capture: VideoCapture,
    frame: Mat,
    rgb: Mat,
}

impl OpenCvSource {
    pub fn open(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let unavailable = |reason: String| MotionError::SourceUnavailable {
            source_name: name.clone(),
            reason,
        };

        let capture = VideoCapture::from_file(&name, videoio::CAP_ANY).map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("could not open video".into()));
        }
        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        info!(video = %name, fps, "opened video");

        Ok(Self {
            name,
            capture,
            frame: Mat::default(),
            rgb: Mat::default(),
        })
    }

    fn decode_error(&self, err: opencv::Error) -> MotionError {
        MotionError::SourceUnavailable {
            source_name: self.name.clone(),
            reason: err.to_string(),
        }
    }
}

impl VideoSource for OpenCvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let got_frame = self.capture.read(&mut self.frame).map_err(|e| self.decode_error(e))?;
        if !got_frame || self.frame.empty() {
            return Ok(None);
        }

        // OpenCV decodes to BGR.
        imgproc::cvt_color(&self.frame, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0).map_err(|e| self.decode_error(e))?;
        let width = self.rgb.cols() as u32;
        let height = self.rgb.rows() as u32;
        let bytes = self.rgb.data_bytes().map_err(|e| self.decode_error(e))?.to_vec();

        RgbImage::from_raw(width, height, bytes).map(Some).ok_or_else(|| MotionError::SourceUnavailable {
            source_name: self.name.clone(),
            reason: format!("decoded buffer does not match {width}x{height}"),
        })
    }
}
