//! Detection-to-identity matching policies.

use serde::{Deserialize, Serialize};

use crate::geometry::iou;
use crate::BBox;

/// How a detection picks among existing identities above the IoU threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First identity in ascending id order whose IoU exceeds the threshold.
    ///
    /// Not similarity-ranked: a later identity with a higher IoU loses.
    #[default]
    FirstMatch,

    /// Identity with the highest IoU above the threshold; ties go to the
    /// lowest id.
    BestIou,
}

/// Match a box against candidate identities.
///
/// # Arguments
/// * `bbox` - Incoming detection box
/// * `candidates` - `(identity, stored box)` pairs in ascending identity order
/// * `threshold` - A match requires IoU strictly greater than this
/// * `policy` - Tie-break when several candidates pass the threshold
///
/// # Returns
/// The matched identity and its IoU, or `None` if no candidate passes.
pub fn find_match<'a, I>(
    bbox: &BBox,
    candidates: I,
    threshold: f64,
    policy: MatchPolicy,
) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = (usize, &'a BBox)>,
{
    let mut scored = candidates
        .into_iter()
        .map(|(id, stored)| (id, iou(bbox, stored)))
        .filter(|&(_, score)| score > threshold);

    match policy {
        MatchPolicy::FirstMatch => scored.next(),
        MatchPolicy::BestIou => scored.fold(None, |best, (id, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((id, score)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BBox {
        BBox::new(x1, y1, x2, y2).unwrap()
    }

    fn indexed(boxes: &[BBox]) -> impl Iterator<Item = (usize, &BBox)> {
        boxes.iter().enumerate()
    }

    // ===== Threshold =====

    #[test]
    fn test_no_candidates() {
        let b = bbox(0, 0, 10, 10);
        assert_eq!(find_match(&b, indexed(&[]), 0.5, MatchPolicy::FirstMatch), None);
        assert_eq!(find_match(&b, indexed(&[]), 0.5, MatchPolicy::BestIou), None);
    }

    #[test]
    fn test_threshold_is_strict() {
        // IoU exactly 0.5: 10x10 vs 10x20 sharing the 10x10 part -> 100 / 200
        let stored = [bbox(0, 0, 10, 20)];
        let b = bbox(0, 0, 10, 10);
        assert_eq!(find_match(&b, indexed(&stored), 0.5, MatchPolicy::FirstMatch), None);
        assert!(find_match(&b, indexed(&stored), 0.49, MatchPolicy::FirstMatch).is_some());
    }

    // ===== Tie-break =====

    #[test]
    fn test_first_match_prefers_lowest_id() {
        // id 0: IoU 100 / 160, id 1: IoU 1.0
        let stored = [bbox(0, 0, 10, 16), bbox(0, 0, 10, 10)];
        let b = bbox(0, 0, 10, 10);

        let (id, score) = find_match(&b, indexed(&stored), 0.5, MatchPolicy::FirstMatch).unwrap();
        assert_eq!(id, 0);
        assert_relative_eq!(score, 0.625, epsilon = 1e-12);
    }

    #[test]
    fn test_best_iou_prefers_highest_score() {
        let stored = [bbox(0, 0, 10, 16), bbox(0, 0, 10, 11), bbox(0, 0, 10, 12)];
        let b = bbox(0, 0, 10, 10);

        let (id, score) = find_match(&b, indexed(&stored), 0.5, MatchPolicy::BestIou).unwrap();
        assert_eq!(id, 1);
        assert_relative_eq!(score, 100.0 / 110.0, epsilon = 1e-12);

        let (first, _) = find_match(&b, indexed(&stored), 0.5, MatchPolicy::FirstMatch).unwrap();
        assert_eq!(first, 0);
    }

    #[test]
    fn test_best_iou_ties_go_to_lowest_id() {
        let stored = [bbox(0, 0, 10, 12), bbox(0, 0, 10, 12)];
        let b = bbox(0, 0, 10, 10);
        let (id, _) = find_match(&b, indexed(&stored), 0.5, MatchPolicy::BestIou).unwrap();
        assert_eq!(id, 0);
    }

    #[test]
    fn test_candidate_ids_are_passed_through() {
        let stored = [bbox(100, 100, 110, 110), bbox(0, 0, 10, 10)];
        let b = bbox(0, 0, 10, 10);
        let candidates = stored.iter().enumerate().map(|(i, s)| (i + 7, s));
        assert_eq!(find_match(&b, candidates, 0.5, MatchPolicy::FirstMatch).map(|m| m.0), Some(8));
    }

    #[test]
    fn test_policy_deserializes_from_snake_case() {
        let p: MatchPolicy = serde_json::from_str("\"best_iou\"").unwrap();
        assert_eq!(p, MatchPolicy::BestIou);
        let p: MatchPolicy = serde_json::from_str("\"first_match\"").unwrap();
        assert_eq!(p, MatchPolicy::FirstMatch);
    }
}
