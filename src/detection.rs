//! Detection struct supplied by the external detector for one frame.

use crate::BBox;

/// A single detector output.
///
/// Produced fresh each frame and owned by the dispatcher only while that
/// frame is processed.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class label as emitted by the detector (e.g. "person", "helmet").
    pub label: String,

    /// Box in frame pixel coordinates.
    pub bbox: BBox,

    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    /// Create a new detection.
    ///
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(label: impl Into<String>, bbox: BBox, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }
}

/// Role a label plays in rule evaluation.
///
/// Resolved from the detector's label through [`crate::ClassLabels`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    /// Subject of the helmet rule; tracked and alerted on.
    Person,
    /// Protective headgear; only used by the compliance test, never tracked.
    Headgear,
    /// Vehicle; tracked, cropped once per identity.
    Vehicle,
    /// Additional crop-only tracked class, carrying its canonical label.
    Tracked(String),
    /// Anything else; drawn but never tracked.
    Other,
}

impl ObjectClass {
    /// Whether detections of this class go through the identity registry.
    pub fn is_tracked(&self) -> bool {
        matches!(self, ObjectClass::Person | ObjectClass::Vehicle | ObjectClass::Tracked(_))
    }
}
