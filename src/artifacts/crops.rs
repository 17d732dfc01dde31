//! Crop writer: saves the region of a frame named by an artifact request.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, RgbImage};
use tracing::{debug, warn};

use crate::dispatcher::ArtifactRequest;
use crate::{Error, Result};

/// Writes crops into one directory, named by [`ArtifactRequest::file_name`].
pub struct CropWriter {
    dir: PathBuf,
    written: usize,
}

impl CropWriter {
    /// Create the writer, creating `dir` if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to create crop folder '{}': {}", dir.display(), e),
            ))
        })?;
        Ok(Self { dir, written: 0 })
    }

    /// Path the crop for `request` is (or would be) written to.
    pub fn path_for(&self, request: &ArtifactRequest) -> PathBuf {
        self.dir.join(request.file_name())
    }

    /// Crop `frame` to the request's box (clipped to the frame) and save it.
    ///
    /// # Returns
    /// The written path, or `None` if the box lies outside the frame.
    pub fn write(&mut self, request: &ArtifactRequest, frame: &RgbImage) -> Result<Option<PathBuf>> {
        let Some(region) = request.bbox.clamp_to(frame.width(), frame.height()) else {
            warn!(
                frame = request.frame_index,
                bbox = %request.bbox,
                width = frame.width(),
                height = frame.height(),
                "crop region outside frame, skipping"
            );
            return Ok(None);
        };

        let crop = imageops::crop_imm(
            frame,
            region.x1 as u32,
            region.y1 as u32,
            region.width() as u32,
            region.height() as u32,
        )
        .to_image();

        let path = self.path_for(request);
        crop.save(&path)?;
        self.written += 1;
        debug!(path = %path.display(), "crop saved");

        Ok(Some(path))
    }

    /// Number of crops written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
