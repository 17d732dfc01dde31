//! Axis-aligned boxes and IoU (Intersection over Union).

use nalgebra::DMatrix;
use std::fmt;

use crate::{Error, Result};

/// Axis-aligned pixel box in one frame's coordinate space.
///
/// Corners are `(x1, y1)` top-left and `(x2, y2)` bottom-right. Boxes built
/// with [`BBox::new`] satisfy `x1 < x2` and `y1 < y2`; boxes built with
/// [`BBox::from_corners_unchecked`] may be degenerate and every computation in
/// this crate treats their negative extents as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    /// Create a validated box.
    ///
    /// # Errors
    /// `Error::InvalidBox` if the box has zero or negative width or height.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x1 >= x2 {
            return Err(Error::InvalidBox { x1, y1, x2, y2, reason: "x1 must be less than x2" });
        }
        if y1 >= y2 {
            return Err(Error::InvalidBox { x1, y1, x2, y2, reason: "y1 must be less than y2" });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Create a box with inverted corners swapped into place.
    ///
    /// Zero-extent boxes are still rejected.
    pub fn normalized(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        Self::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
    }

    /// Create a box without validation.
    pub const fn from_corners_unchecked(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from an `[x1, y1, x2, y2]` array.
    pub fn from_xyxy(xyxy: [i32; 4]) -> Result<Self> {
        Self::new(xyxy[0], xyxy[1], xyxy[2], xyxy[3])
    }

    pub fn to_xyxy(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Width, clamped to zero for degenerate boxes.
    pub fn width(&self) -> i64 {
        (self.x2 as i64 - self.x1 as i64).max(0)
    }

    /// Height, clamped to zero for degenerate boxes.
    pub fn height(&self) -> i64 {
        (self.y2 as i64 - self.y1 as i64).max(0)
    }

    /// Area in `i128`; a full-range `i32` box does not fit in `i64`.
    pub fn area(&self) -> i128 {
        self.width() as i128 * self.height() as i128
    }

    /// Area of the overlap between two boxes (0 when disjoint).
    pub fn intersection_area(&self, other: &BBox) -> i128 {
        let ix1 = self.x1.max(other.x1) as i64;
        let iy1 = self.y1.max(other.y1) as i64;
        let ix2 = self.x2.min(other.x2) as i64;
        let iy2 = self.y2.min(other.y2) as i64;

        (ix2 - ix1).max(0) as i128 * (iy2 - iy1).max(0) as i128
    }

    /// True if `other` lies entirely within `self` (edges may coincide).
    pub fn contains(&self, other: &BBox) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }

    /// Clip the box to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BBox> {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        BBox::new(
            self.x1.clamp(0, w),
            self.y1.clamp(0, h),
            self.x2.clamp(0, w),
            self.y2.clamp(0, h),
        )
        .ok()
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Intersection over Union of two boxes, in `[0, 1]`.
///
/// Degenerate boxes have area 0; a union of 0 yields 0.0 rather than NaN.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let inter = a.intersection_area(b);
    let union = a.area() + b.area() - inter;

    if union > 0 {
        inter as f64 / union as f64
    } else {
        0.0
    }
}

/// Compute the IoU matrix between two sets of boxes.
///
/// Batch entry point for callers that score whole frames at once, e.g. to
/// inspect how a frame's detections overlap a label's stored identities.
/// Resolution itself goes through [`crate::matching::find_match`], which
/// scans candidates in id order and stops at the first hit.
///
/// # Returns
/// Matrix of shape (n, m) where entry (i, j) is `iou(&boxes_a[i], &boxes_b[j])`.
pub fn iou_matrix(boxes_a: &[BBox], boxes_b: &[BBox]) -> DMatrix<f64> {
    DMatrix::from_fn(boxes_a.len(), boxes_b.len(), |i, j| iou(&boxes_a[i], &boxes_b[j]))
}
