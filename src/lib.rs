//! # ppe-watch - helmet compliance over detector output
//!
//! Consumes per-frame object detections from an external detector and:
//!
//! - deduplicates detections into persistent per-class identities (IoU matching)
//! - checks whether each person has a helmet fully inside their head region
//! - emits exactly one artifact request per newly seen violating person or
//!   newly seen vehicle
//!
//! The core (`geometry`, `compliance`, `registry`, `dispatcher`) is pure and
//! performs no I/O. `artifacts`, `records` and `session` are the file-backed
//! collaborators used by the `ppe-watch` binary.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ppe_watch::{BBox, Detection, Dispatcher, SentryConfig};
//!
//! let mut dispatcher = Dispatcher::new(SentryConfig::default()).unwrap();
//! let person = Detection::new("person", BBox::new(100, 100, 140, 220).unwrap(), 0.9);
//! let output = dispatcher.process_frame(0, &[person]).unwrap();
//! assert_eq!(output.artifacts.len(), 1);
//! ```

// Core
pub mod geometry;
pub mod detection;
pub mod compliance;
pub mod matching;
pub mod registry;
pub mod overlay;
pub mod dispatcher;
pub mod config;

// Collaborators
pub mod records;
pub mod artifacts;
pub mod session;

// Re-exports for convenience
pub use geometry::{iou, BBox};
pub use detection::{Detection, ObjectClass};
pub use compliance::{head_region, is_head_protected};
pub use matching::MatchPolicy;
pub use registry::{IdentityRegistry, Resolution};
pub use overlay::{CaptionFont, Color, ColorPalette, DrawInstruction};
pub use dispatcher::{ArtifactKind, ArtifactRequest, Dispatcher, FrameOutput};
pub use config::{ClassLabels, SentryConfig};
pub use artifacts::{ArtifactSink, FsArtifactSink};
pub use session::Session;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the ppe-watch library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid box ({x1}, {y1}, {x2}, {y2}): {reason}")]
        InvalidBox {
            x1: i32,
            y1: i32,
            x2: i32,
            y2: i32,
            reason: &'static str,
        },

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Frame {got} supplied after frame {last}; frames must be strictly increasing")]
        FrameOutOfOrder { last: u64, got: u64 },

        #[error("Detection record error at line {line}: {message}")]
        Record { line: usize, message: String },

        #[error("Invalid caption font: {0}")]
        Font(String),

        #[error("Image error: {0}")]
        Image(#[from] image::ImageError),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for ppe-watch operations
    pub type Result<T> = std::result::Result<T, Error>;
}
