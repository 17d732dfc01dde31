//! Overlay draw instructions.
//!
//! Every detection produces one instruction regardless of tracking or
//! compliance outcome. Rendering itself happens outside the core (see
//! [`crate::session`]).

use std::fs;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use serde::{Deserialize, Serialize};

use crate::{BBox, Detection, Error, ObjectClass, Result};

/// Vertical offset of the caption above the box's top edge.
pub const CAPTION_OFFSET: i32 = 10;

/// Default caption glyph height, in pixels.
pub const DEFAULT_CAPTION_SCALE: f32 = 16.0;

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const RED: Color = Color(255, 0, 0);
    pub const GREEN: Color = Color(0, 255, 0);
    pub const BLUE: Color = Color(0, 0, 255);
    pub const WHITE: Color = Color(255, 255, 255);

    pub fn to_array(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

/// Fixed role-to-color mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorPalette {
    pub person: Color,
    pub headgear: Color,
    pub vehicle: Color,
    /// Used for every other label, including extra tracked classes.
    pub default: Color,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            person: Color::RED,
            headgear: Color::GREEN,
            vehicle: Color::BLUE,
            default: Color::WHITE,
        }
    }
}

impl ColorPalette {
    pub fn color_for(&self, class: &ObjectClass) -> Color {
        match class {
            ObjectClass::Person => self.person,
            ObjectClass::Headgear => self.headgear,
            ObjectClass::Vehicle => self.vehicle,
            ObjectClass::Tracked(_) | ObjectClass::Other => self.default,
        }
    }
}

/// How to draw one detection on the output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub bbox: BBox,
    /// Label exactly as the detector reported it.
    pub label: String,
    pub confidence: f32,
    pub color: Color,
}

impl DrawInstruction {
    pub fn new(detection: &Detection, color: Color) -> Self {
        Self {
            bbox: detection.bbox,
            label: detection.label.clone(),
            confidence: detection.confidence,
            color,
        }
    }

    /// Caption text, e.g. `"person 0.87"`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }

    /// Where the caption baseline starts; may be negative near the top edge.
    pub fn caption_anchor(&self) -> (i32, i32) {
        (self.bbox.x1, self.bbox.y1.saturating_sub(CAPTION_OFFSET))
    }
}

/// Font used to render captions on annotated frames.
pub struct CaptionFont {
    font: FontVec,
    scale: PxScale,
}

impl CaptionFont {
    /// Parse a TrueType / OpenType font.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(data).map_err(|e| Error::Font(e.to_string()))?;
        Ok(Self {
            font,
            scale: PxScale::from(DEFAULT_CAPTION_SCALE),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to read font '{}': {}", path.display(), e),
            ))
        })?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| Error::Font(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            font,
            scale: PxScale::from(DEFAULT_CAPTION_SCALE),
        })
    }

    pub fn with_scale(mut self, pixels: f32) -> Self {
        self.scale = PxScale::from(pixels);
        self
    }

    pub fn font(&self) -> &FontVec {
        &self.font
    }

    pub fn scale(&self) -> PxScale {
        self.scale
    }

    /// Top-left corner for text whose baseline sits at `anchor`.
    pub fn text_origin(&self, anchor: (i32, i32)) -> (i32, i32) {
        (anchor.0, anchor.1.saturating_sub(self.scale.y.round() as i32))
    }
}
