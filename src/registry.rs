//! Identity registry: per-label deduplication of detections across frames.
//!
//! Each label owns a growing list of identities numbered `0, 1, 2, ...` in the
//! order they were first seen. A detection either matches an existing
//! identity (IoU above the threshold, picked by the [`MatchPolicy`]) and
//! overwrites its stored box, or becomes a new identity with the next number.
//! Identities are never removed.

use std::collections::BTreeMap;

use tracing::debug;

use crate::matching::{find_match, MatchPolicy};
use crate::BBox;

/// IoU a detection must exceed to match an existing identity.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

/// One registered identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Identity number, unique within its label.
    pub id: usize,

    /// Most recently matched box.
    pub bbox: BBox,

    /// Frame index at which the identity was created.
    pub first_seen: u64,

    /// Frame index of the most recent match.
    pub last_seen: u64,
}

/// Outcome of resolving one detection against the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub identity: usize,

    /// True if the detection created a new identity.
    pub is_new: bool,

    /// IoU against the matched identity's previous box (`None` when new).
    pub iou: Option<f64>,
}

/// Identities of a single label. Position in the vector is the identity number.
#[derive(Debug, Clone, Default)]
pub struct LabelIdentities {
    identities: Vec<Identity>,
}

impl LabelIdentities {
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Identity> {
        self.identities.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }
}

/// Per-label identity registry for one processing session.
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    labels: BTreeMap<String, LabelIdentities>,
    iou_threshold: f64,
    policy: MatchPolicy,
    dormant_after: Option<u64>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    ///
    /// # Arguments
    /// * `iou_threshold` - A match requires IoU strictly greater than this
    /// * `policy` - Tie-break between several matching identities
    pub fn new(iou_threshold: f64, policy: MatchPolicy) -> Self {
        Self {
            labels: BTreeMap::new(),
            iou_threshold,
            policy,
            dormant_after: None,
        }
    }

    /// Stop matching identities that have gone unseen for more than
    /// `frames` frames.
    ///
    /// Dormant identities keep their number and box; a detection that would
    /// have matched one becomes a new identity instead.
    pub fn with_dormancy(mut self, frames: Option<u64>) -> Self {
        self.dormant_after = frames;
        self
    }

    pub fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Resolve a detection box to an identity of `label`.
    ///
    /// On a match the identity's stored box is replaced by `bbox`. Otherwise a
    /// new identity numbered `count(label)` is registered. Never fails; an
    /// empty label always yields a new identity.
    pub fn resolve(&mut self, label: &str, bbox: BBox, frame_index: u64) -> Resolution {
        let threshold = self.iou_threshold;
        let policy = self.policy;
        let dormant_after = self.dormant_after;

        let entry = self.labels.entry(label.to_string()).or_default();

        let candidates = entry
            .identities
            .iter()
            .filter(|identity| match dormant_after {
                Some(frames) => frame_index.saturating_sub(identity.last_seen) <= frames,
                None => true,
            })
            .map(|identity| (identity.id, &identity.bbox));

        if let Some((id, score)) = find_match(&bbox, candidates, threshold, policy) {
            let identity = &mut entry.identities[id];
            identity.bbox = bbox;
            identity.last_seen = frame_index;
            debug!(label, id, iou = score, frame = frame_index, "matched existing identity");
            return Resolution { identity: id, is_new: false, iou: Some(score) };
        }

        let id = entry.identities.len();
        entry.identities.push(Identity {
            id,
            bbox,
            first_seen: frame_index,
            last_seen: frame_index,
        });
        debug!(label, id, frame = frame_index, %bbox, "registered new identity");

        Resolution { identity: id, is_new: true, iou: None }
    }

    /// Number of identities registered for `label`.
    pub fn count(&self, label: &str) -> usize {
        self.labels.get(label).map_or(0, LabelIdentities::len)
    }

    /// Total identities across all labels.
    pub fn total(&self) -> usize {
        self.labels.values().map(LabelIdentities::len).sum()
    }

    pub fn get(&self, label: &str, id: usize) -> Option<&Identity> {
        self.labels.get(label).and_then(|l| l.get(id))
    }

    pub fn identities(&self, label: &str) -> Option<&LabelIdentities> {
        self.labels.get(label)
    }

    /// Labels that have at least been resolved against once, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, MatchPolicy::default())
    }
}
