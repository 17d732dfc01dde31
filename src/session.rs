//! Thin frame orchestrator.
//!
//! Feeds detection records to a [`Dispatcher`] in order, loads the source
//! frame only when something needs pixels (a crop or an annotated output),
//! and hands artifact requests to an [`ArtifactSink`].

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::dispatcher::{FrameOutput, SessionSummary};
use crate::records::FrameRecord;
use crate::{ArtifactSink, CaptionFont, Dispatcher, DrawInstruction, Error, Result};

/// Outline thickness of overlay rectangles, in pixels.
pub const OVERLAY_THICKNESS: i32 = 2;

/// Source of decoded frames, looked up by index.
pub trait FrameSource {
    /// Decoded frame `frame_index`, or `None` if it is not available.
    fn frame(&mut self, frame_index: u64) -> Result<Option<RgbImage>>;
}

/// Frame source with no pixels; crops are skipped, logging still happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrames;

impl FrameSource for NoFrames {
    fn frame(&mut self, _frame_index: u64) -> Result<Option<RgbImage>> {
        Ok(None)
    }
}

/// Frames stored as `frame_{index:06}.jpg` (or `.png`) in one directory.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    dir: PathBuf,
}

impl ImageDirectory {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("frame directory '{}' does not exist", dir.display()),
            )));
        }
        Ok(Self { dir })
    }

    /// Candidate paths for a frame, in lookup order.
    pub fn paths_for(&self, frame_index: u64) -> [PathBuf; 2] {
        [
            self.dir.join(format!("frame_{:06}.jpg", frame_index)),
            self.dir.join(format!("frame_{:06}.png", frame_index)),
        ]
    }
}

impl FrameSource for ImageDirectory {
    fn frame(&mut self, frame_index: u64) -> Result<Option<RgbImage>> {
        for path in self.paths_for(frame_index) {
            if path.is_file() {
                return Ok(Some(image::open(&path)?.to_rgb8()));
            }
        }
        debug!(frame = frame_index, dir = %self.dir.display(), "frame image not found");
        Ok(None)
    }
}

/// Draw overlay rectangles, and captions when a font is given, onto a frame.
///
/// Boxes and text are clipped to the frame; degenerate boxes are skipped.
pub fn annotate(frame: &mut RgbImage, draws: &[DrawInstruction], font: Option<&CaptionFont>) {
    for draw in draws {
        let color = Rgb(draw.color.to_array());
        if let Some(font) = font {
            let (x, y) = font.text_origin(draw.caption_anchor());
            draw_text_mut(frame, color, x, y, font.scale(), font.font(), &draw.caption());
        }
        for inset in 0..OVERLAY_THICKNESS {
            let width = draw.bbox.width() - 2 * inset as i64;
            let height = draw.bbox.height() - 2 * inset as i64;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(draw.bbox.x1 + inset, draw.bbox.y1 + inset)
                .of_size(width as u32, height as u32);
            draw_hollow_rect_mut(frame, rect, color);
        }
    }
}

/// One processing session: dispatcher, artifact sink and frame source.
pub struct Session<S, F> {
    dispatcher: Dispatcher,
    sink: S,
    frames: F,
    start_frame: u64,
    annotate_dir: Option<PathBuf>,
    caption_font: Option<CaptionFont>,
}

impl<S: ArtifactSink, F: FrameSource> Session<S, F> {
    pub fn new(dispatcher: Dispatcher, sink: S, frames: F) -> Self {
        Self {
            dispatcher,
            sink,
            frames,
            start_frame: 0,
            annotate_dir: None,
            caption_font: None,
        }
    }

    /// Ignore records with a frame index below `start_frame`.
    pub fn with_start_frame(mut self, start_frame: u64) -> Self {
        self.start_frame = start_frame;
        self
    }

    /// Also write every available frame with its overlay into `dir`.
    pub fn with_annotation_dir<P: AsRef<Path>>(mut self, dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        self.annotate_dir = Some(dir);
        Ok(self)
    }

    /// Caption annotated boxes with `"{label} {confidence}"`.
    pub fn with_caption_font(mut self, font: CaptionFont) -> Self {
        self.caption_font = Some(font);
        self
    }

    /// Process one record.
    ///
    /// # Returns
    /// `None` if the record is before the start frame.
    pub fn process(&mut self, record: &FrameRecord) -> Result<Option<FrameOutput>> {
        if record.frame_index < self.start_frame {
            return Ok(None);
        }

        let output = self.dispatcher.process_frame(record.frame_index, &record.detections)?;

        let needs_pixels = !output.artifacts.is_empty() || self.annotate_dir.is_some();
        let mut frame = if needs_pixels {
            self.frames.frame(record.frame_index)?
        } else {
            None
        };

        for request in &output.artifacts {
            self.sink.consume(request, frame.as_ref())?;
        }

        if let (Some(dir), Some(frame)) = (&self.annotate_dir, frame.as_mut()) {
            annotate(frame, &output.draws, self.caption_font.as_ref());
            let path = dir.join(format!("frame_{:06}.jpg", record.frame_index));
            frame.save(&path)?;
        } else if self.annotate_dir.is_some() {
            warn!(frame = record.frame_index, "no frame image, annotation skipped");
        }

        Ok(Some(output))
    }

    /// Process every record in order and flush the sink.
    pub fn run<I>(&mut self, records: I) -> Result<SessionSummary>
    where
        I: IntoIterator<Item = Result<FrameRecord>>,
    {
        for record in records {
            self.process(&record?)?;
        }
        self.sink.flush()?;

        let summary = self.dispatcher.summary();
        info!(
            frames = summary.frames,
            violations = summary.violations,
            sightings = summary.sightings,
            compliant = summary.compliant_persons,
            "session finished"
        );
        Ok(summary)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (Dispatcher, S) {
        (self.dispatcher, self.sink)
    }
}
