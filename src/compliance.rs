//! Helmet compliance rule.
//!
//! A person is protected when at least one headgear box lies entirely inside
//! the top third of the person's box. Overlap alone does not count.

use crate::BBox;

/// The head region is the top `1 / HEAD_FRACTION_DIVISOR` of a person box.
pub const HEAD_FRACTION_DIVISOR: i64 = 3;

/// Head sub-region of a person: full width, top third of the height.
///
/// The vertical split uses floor division.
pub fn head_region(person: &BBox) -> BBox {
    let height = person.y2 as i64 - person.y1 as i64;
    let head_y2 = person.y1 as i64 + height.div_euclid(HEAD_FRACTION_DIVISOR);
    BBox::from_corners_unchecked(person.x1, person.y1, person.x2, head_y2 as i32)
}

/// Whether any headgear box is fully contained in the person's head region.
///
/// Candidates are checked in order and the first contained one short-circuits.
/// No candidates means not protected.
pub fn is_head_protected<'a, I>(person: &BBox, headgear: I) -> bool
where
    I: IntoIterator<Item = &'a BBox>,
{
    let head = head_region(person);
    headgear.into_iter().any(|helmet| head.contains(helmet))
}
