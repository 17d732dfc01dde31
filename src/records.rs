//! Detection record reader (JSON lines, one frame per line).
//!
//! ```json
//! {"frame": 3, "detections": [{"label": "person", "box": [100, 100, 140, 220], "confidence": 0.91}]}
//! ```
//!
//! Box coordinates may be fractional; they are truncated toward zero like the
//! detector's integer cast. Inverted boxes are normalized, zero-area boxes are
//! dropped with a warning.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::{BBox, Detection, Error, Result};

#[derive(Debug, Deserialize)]
struct FrameRecordJson {
    frame: u64,
    #[serde(default)]
    detections: Vec<DetectionJson>,
}

#[derive(Debug, Deserialize)]
struct DetectionJson {
    label: String,
    #[serde(rename = "box")]
    bbox: [f64; 4],
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

/// Detections of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub detections: Vec<Detection>,
}

/// Parse one JSON-lines record.
///
/// `line_number` is only used for error and warning messages.
pub fn parse_record(line: &str, line_number: usize) -> Result<FrameRecord> {
    let record: FrameRecordJson = serde_json::from_str(line).map_err(|e| Error::Record {
        line: line_number,
        message: e.to_string(),
    })?;

    let mut detections = Vec::with_capacity(record.detections.len());
    for det in record.detections {
        if det.bbox.iter().any(|v| !v.is_finite()) {
            warn!(line = line_number, label = %det.label, "non-finite box coordinate, detection dropped");
            continue;
        }

        let [x1, y1, x2, y2] = det.bbox.map(|v| v.trunc() as i32);
        match BBox::normalized(x1, y1, x2, y2) {
            Ok(bbox) => detections.push(Detection::new(det.label, bbox, det.confidence)),
            Err(e) => warn!(line = line_number, label = %det.label, "{}, detection dropped", e),
        }
    }

    Ok(FrameRecord {
        frame_index: record.frame,
        detections,
    })
}

/// Streaming reader over a detection record file.
///
/// Yields one `Result<FrameRecord>` per non-blank line, in file order.
pub struct DetectionRecordReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl DetectionRecordReader<BufReader<File>> {
    /// Open a detection record file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to open detection records '{}': {}", path.display(), e),
            ))
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> DetectionRecordReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for DetectionRecordReader<R> {
    type Item = Result<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(Error::IoError(e))),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_record(&line, self.line_number));
        }
    }
}
