//! Artifact persistence.
//!
//! The dispatcher only describes artifacts; this module performs them:
//!
//! - `AlertLog` - append-only alert log, reset once per session
//! - `CropWriter` - crops a frame to a request's box and saves it as JPEG
//! - `FsArtifactSink` - routes requests to the two writers above

mod alert_log;
mod crops;
mod sink;

pub use alert_log::{AlertLog, ALERT_LOG_HEADER};
pub use crops::CropWriter;
pub use sink::{ArtifactSink, FsArtifactSink};
