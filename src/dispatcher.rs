//! Per-frame rule evaluation and artifact dispatch.
//!
//! For each frame the [`Dispatcher`]:
//!
//! 1. classifies detections into persons, headgear, tracked classes and others
//! 2. checks every person against the frame's headgear; compliant persons are
//!    skipped entirely (never registered)
//! 3. resolves non-compliant persons against the registry and requests a
//!    [`ArtifactKind::PersonViolation`] for each new identity
//! 4. resolves vehicles and extra tracked classes and requests a
//!    [`ArtifactKind::VehicleSighting`] for each new identity
//! 5. emits a draw instruction for every detection
//!
//! The registry is the only state carried between frames, and frames must
//! arrive in strictly increasing index order.

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::compliance::is_head_protected;
use crate::registry::IdentityRegistry;
use crate::{BBox, Detection, DrawInstruction, Error, ObjectClass, Result, SentryConfig};

/// What an artifact request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// New identity of a person without a helmet: crop and alert line.
    PersonViolation,
    /// New identity of a vehicle (or extra tracked class): crop only.
    VehicleSighting,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::PersonViolation => write!(f, "person_violation"),
            ArtifactKind::VehicleSighting => write!(f, "vehicle_sighting"),
        }
    }
}

/// A side effect for an external collaborator to perform, exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRequest {
    pub kind: ArtifactKind,
    pub frame_index: u64,
    pub identity: usize,
    /// Registry label the identity belongs to.
    pub label: String,
    /// Crop region in frame coordinates.
    pub bbox: BBox,
}

impl ArtifactRequest {
    /// Crop file name, unique per `(frame_index, label, identity)`.
    pub fn file_name(&self) -> String {
        match self.kind {
            ArtifactKind::PersonViolation => {
                format!("frame_{}_person_{}.jpg", self.frame_index, self.identity)
            }
            ArtifactKind::VehicleSighting => {
                format!("frame_{}_{}_{}.jpg", self.frame_index, self.label, self.identity)
            }
        }
    }

    /// Alert log line for a violation; `None` for sightings.
    pub fn alert_line(&self, crop_path: Option<&Path>) -> Option<String> {
        if self.kind != ArtifactKind::PersonViolation {
            return None;
        }

        let mut line = format!(
            "[ALERT] Person without helmet detected in frame {}",
            self.frame_index
        );
        match crop_path {
            Some(path) => line.push_str(&format!(". Crop saved to {}", path.display())),
            None => line.push('.'),
        }
        Some(line)
    }
}

/// Counters for one processed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub detections: usize,
    pub persons: usize,
    pub compliant_persons: usize,
    /// New violating identities (= person violation artifacts).
    pub violations: usize,
    /// New vehicle / tracked identities (= sighting artifacts).
    pub sightings: usize,
}

/// Everything produced by one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub frame_index: u64,
    /// One per detection, in detector order.
    pub draws: Vec<DrawInstruction>,
    pub artifacts: Vec<ArtifactRequest>,
    pub stats: FrameStats,
}

/// Cumulative counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub detections: u64,
    pub compliant_persons: u64,
    pub violations: u64,
    pub sightings: u64,
}

impl SessionSummary {
    fn add(&mut self, stats: &FrameStats) {
        self.frames += 1;
        self.detections += stats.detections as u64;
        self.compliant_persons += stats.compliant_persons as u64;
        self.violations += stats.violations as u64;
        self.sightings += stats.sightings as u64;
    }
}

/// Session-scoped dispatcher owning the identity registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: SentryConfig,
    registry: IdentityRegistry,
    last_frame: Option<u64>,
    summary: SessionSummary,
}

impl Dispatcher {
    /// Create a dispatcher with an empty registry.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the configuration fails validation.
    pub fn new(config: SentryConfig) -> Result<Self> {
        config.validate()?;

        let registry = IdentityRegistry::new(config.iou_threshold, config.match_policy)
            .with_dormancy(config.dormant_after);

        Ok(Self {
            config,
            registry,
            last_frame: None,
            summary: SessionSummary::default(),
        })
    }

    /// Process one frame's detections.
    ///
    /// # Arguments
    /// * `frame_index` - Must be greater than every index processed before
    /// * `detections` - Detections in detector order
    ///
    /// # Errors
    /// `Error::FrameOutOfOrder` if `frame_index` does not increase; the
    /// registry is left untouched in that case.
    pub fn process_frame(&mut self, frame_index: u64, detections: &[Detection]) -> Result<FrameOutput> {
        if let Some(last) = self.last_frame {
            if frame_index <= last {
                return Err(Error::FrameOutOfOrder { last, got: frame_index });
            }
        }
        self.last_frame = Some(frame_index);

        let labels = &self.config.labels;
        let classes: Vec<ObjectClass> = detections.iter().map(|d| labels.classify(&d.label)).collect();

        let headgear: Vec<BBox> = detections
            .iter()
            .zip(&classes)
            .filter(|(_, class)| **class == ObjectClass::Headgear)
            .map(|(d, _)| d.bbox)
            .collect();

        let mut stats = FrameStats { detections: detections.len(), ..Default::default() };
        let mut artifacts = Vec::new();

        // Persons first: helmet rule, then registry
        for (detection, class) in detections.iter().zip(&classes) {
            if *class != ObjectClass::Person {
                continue;
            }
            stats.persons += 1;

            if is_head_protected(&detection.bbox, &headgear) {
                stats.compliant_persons += 1;
                debug!(frame = frame_index, bbox = %detection.bbox, "person wears helmet");
                continue;
            }

            let label = labels.person.as_str();
            let resolution = self.registry.resolve(label, detection.bbox, frame_index);
            if resolution.is_new {
                stats.violations += 1;
                info!(
                    frame = frame_index,
                    identity = resolution.identity,
                    bbox = %detection.bbox,
                    "person without helmet"
                );
                artifacts.push(ArtifactRequest {
                    kind: ArtifactKind::PersonViolation,
                    frame_index,
                    identity: resolution.identity,
                    label: label.to_string(),
                    bbox: detection.bbox,
                });
            }
        }

        // Vehicles and other tracked classes
        for (detection, class) in detections.iter().zip(&classes) {
            if *class == ObjectClass::Person {
                continue;
            }
            let Some(label) = labels.registry_label(class) else {
                continue;
            };

            let resolution = self.registry.resolve(label, detection.bbox, frame_index);
            if resolution.is_new {
                stats.sightings += 1;
                info!(
                    frame = frame_index,
                    label,
                    identity = resolution.identity,
                    bbox = %detection.bbox,
                    "new tracked object"
                );
                artifacts.push(ArtifactRequest {
                    kind: ArtifactKind::VehicleSighting,
                    frame_index,
                    identity: resolution.identity,
                    label: label.to_string(),
                    bbox: detection.bbox,
                });
            }
        }

        let palette = &self.config.palette;
        let draws = detections
            .iter()
            .zip(&classes)
            .map(|(detection, class)| DrawInstruction::new(detection, palette.color_for(class)))
            .collect();

        self.summary.add(&stats);

        Ok(FrameOutput { frame_index, draws, artifacts, stats })
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Index of the most recently processed frame.
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Consume the dispatcher, keeping the final registry.
    pub fn into_registry(self) -> IdentityRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassLabels, Color, MatchPolicy};

    fn det(label: &str, x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(label, BBox::new(x1, y1, x2, y2).unwrap(), 0.9)
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(SentryConfig::default()).unwrap()
    }

    // ===== Compliance =====

    #[test]
    fn test_compliant_person_produces_no_artifact() {
        let mut d = dispatcher();
        let out = d
            .process_frame(0, &[det("person", 100, 100, 140, 220), det("helmet", 100, 100, 140, 140)])
            .unwrap();

        assert!(out.artifacts.is_empty());
        assert_eq!(out.stats.compliant_persons, 1);
        assert_eq!(d.registry().count("person"), 0);
        assert_eq!(out.draws.len(), 2);
    }

    #[test]
    fn test_helmet_below_head_region_is_violation() {
        let mut d = dispatcher();
        let out = d
            .process_frame(0, &[det("person", 100, 100, 140, 220), det("helmet", 100, 100, 140, 145)])
            .unwrap();

        assert_eq!(out.artifacts.len(), 1);
        let artifact = &out.artifacts[0];
        assert_eq!(artifact.kind, ArtifactKind::PersonViolation);
        assert_eq!(artifact.identity, 0);
        assert_eq!(artifact.frame_index, 0);
        assert_eq!(artifact.bbox, BBox::new(100, 100, 140, 220).unwrap());
    }

    #[test]
    fn test_headgear_from_previous_frame_is_ignored() {
        let mut d = dispatcher();
        d.process_frame(0, &[det("helmet", 100, 100, 140, 140)]).unwrap();
        let out = d.process_frame(1, &[det("person", 100, 100, 140, 220)]).unwrap();
        assert_eq!(out.stats.violations, 1);
    }

    #[test]
    fn test_one_helmet_can_protect_several_persons() {
        // Two overlapping persons sharing the same head area
        let mut d = dispatcher();
        let out = d
            .process_frame(
                0,
                &[
                    det("person", 100, 100, 140, 220),
                    det("person", 95, 100, 145, 221),
                    det("helmet", 105, 102, 135, 130),
                ],
            )
            .unwrap();
        assert_eq!(out.stats.compliant_persons, 2);
        assert!(out.artifacts.is_empty());
    }

    // ===== At-most-once =====

    #[test]
    fn test_violation_reported_once_per_identity() {
        let mut d = dispatcher();
        let mut total = Vec::new();
        for frame in 1..=10u64 {
            let x = 100 + frame as i32 * 2;
            let out = d.process_frame(frame, &[det("person", x, 100, x + 40, 220)]).unwrap();
            total.extend(out.artifacts);
        }

        assert_eq!(total.len(), 1);
        assert_eq!(total[0].frame_index, 1);
        assert_eq!(d.registry().count("person"), 1);
        assert_eq!(d.summary().violations, 1);
        assert_eq!(d.summary().frames, 10);
    }

    #[test]
    fn test_person_becoming_compliant_keeps_registry() {
        let mut d = dispatcher();
        d.process_frame(0, &[det("person", 100, 100, 140, 220)]).unwrap();
        let out = d
            .process_frame(1, &[det("person", 100, 100, 140, 220), det("helmet", 100, 100, 140, 140)])
            .unwrap();
        assert!(out.artifacts.is_empty());

        // Helmet off again: same identity, already reported
        let out = d.process_frame(2, &[det("person", 100, 100, 140, 220)]).unwrap();
        assert!(out.artifacts.is_empty());
        assert_eq!(d.registry().count("person"), 1);
    }

    // ===== Vehicles =====

    #[test]
    fn test_vehicle_sighting_once() {
        let mut d = dispatcher();
        let first = d.process_frame(0, &[det("vehicle", 0, 0, 200, 100)]).unwrap();
        let second = d.process_frame(1, &[det("vehicle", 5, 0, 205, 100)]).unwrap();

        assert_eq!(first.artifacts.len(), 1);
        assert_eq!(first.artifacts[0].kind, ArtifactKind::VehicleSighting);
        assert_eq!(first.artifacts[0].label, "vehicle");
        assert!(second.artifacts.is_empty());
    }

    #[test]
    fn test_person_and_vehicle_numbering_is_independent() {
        let mut d = dispatcher();
        let out = d
            .process_frame(0, &[det("vehicle", 0, 0, 200, 100), det("person", 300, 0, 340, 120)])
            .unwrap();

        // Persons are dispatched before vehicles
        assert_eq!(out.artifacts[0].kind, ArtifactKind::PersonViolation);
        assert_eq!(out.artifacts[0].identity, 0);
        assert_eq!(out.artifacts[1].kind, ArtifactKind::VehicleSighting);
        assert_eq!(out.artifacts[1].identity, 0);
    }

    #[test]
    fn test_extra_tracked_class_and_aliases() {
        let mut config = SentryConfig::default();
        config.labels.extra_tracked.push("forklift".to_string());
        config.labels = config.labels.with_alias("veiculo", "vehicle");
        let mut d = Dispatcher::new(config).unwrap();

        let out = d
            .process_frame(0, &[det("forklift", 0, 0, 50, 50), det("veiculo", 100, 100, 300, 200)])
            .unwrap();

        assert_eq!(out.artifacts.len(), 2);
        assert_eq!(out.artifacts[0].label, "forklift");
        assert_eq!(out.artifacts[0].file_name(), "frame_0_forklift_0.jpg");
        assert_eq!(out.artifacts[1].label, "vehicle");
        assert_eq!(d.registry().count("vehicle"), 1);
        assert_eq!(d.registry().count("veiculo"), 0);
        // Drawn with the detector's own label
        assert_eq!(out.draws[1].label, "veiculo");
        assert_eq!(out.draws[1].color, Color::BLUE);
    }

    // ===== Pass-through =====

    #[test]
    fn test_unknown_labels_are_drawn_only() {
        let mut d = dispatcher();
        let out = d.process_frame(0, &[det("dog", 0, 0, 10, 10), det("helmet", 0, 0, 5, 5)]).unwrap();

        assert!(out.artifacts.is_empty());
        assert_eq!(d.registry().total(), 0);
        assert_eq!(out.draws.len(), 2);
        assert_eq!(out.draws[0].color, Color::WHITE);
        assert_eq!(out.draws[1].color, Color::GREEN);
    }

    #[test]
    fn test_empty_frame() {
        let mut d = dispatcher();
        let out = d.process_frame(0, &[]).unwrap();
        assert!(out.draws.is_empty());
        assert!(out.artifacts.is_empty());
        assert_eq!(out.stats, FrameStats::default());
    }

    // ===== Ordering =====

    #[test]
    fn test_out_of_order_frames_rejected() {
        let mut d = dispatcher();
        d.process_frame(5, &[det("person", 0, 0, 40, 120)]).unwrap();

        let err = d.process_frame(5, &[det("person", 500, 0, 540, 120)]).unwrap_err();
        assert!(matches!(err, Error::FrameOutOfOrder { last: 5, got: 5 }));
        assert!(d.process_frame(3, &[]).is_err());

        assert_eq!(d.registry().count("person"), 1);
        assert_eq!(d.last_frame(), Some(5));
        assert!(d.process_frame(6, &[]).is_ok());
    }

    #[test]
    fn test_frames_may_skip_indices() {
        let mut d = dispatcher();
        d.process_frame(0, &[]).unwrap();
        assert!(d.process_frame(100, &[]).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SentryConfig { iou_threshold: 1.5, ..Default::default() };
        assert!(matches!(Dispatcher::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_best_iou_policy_is_wired_through() {
        let config = SentryConfig { match_policy: MatchPolicy::BestIou, ..Default::default() };
        let d = Dispatcher::new(config).unwrap();
        assert_eq!(d.registry().policy(), MatchPolicy::BestIou);
    }

    // ===== Artifact text =====

    #[test]
    fn test_file_names_and_alert_line() {
        let violation = ArtifactRequest {
            kind: ArtifactKind::PersonViolation,
            frame_index: 12,
            identity: 3,
            label: "person".to_string(),
            bbox: BBox::new(0, 0, 10, 10).unwrap(),
        };
        assert_eq!(violation.file_name(), "frame_12_person_3.jpg");
        assert_eq!(
            violation.alert_line(Some(Path::new("out/persons/frame_12_person_3.jpg"))).unwrap(),
            "[ALERT] Person without helmet detected in frame 12. Crop saved to out/persons/frame_12_person_3.jpg"
        );
        assert_eq!(
            violation.alert_line(None).unwrap(),
            "[ALERT] Person without helmet detected in frame 12."
        );

        let sighting = ArtifactRequest { kind: ArtifactKind::VehicleSighting, label: "vehicle".into(), ..violation };
        assert_eq!(sighting.file_name(), "frame_12_vehicle_3.jpg");
        assert_eq!(sighting.alert_line(None), None);
    }

    #[test]
    fn test_vehicle_crop_name_follows_canonical_label() {
        let labels = ClassLabels { vehicle: "car".to_string(), ..ClassLabels::default() }
            .with_alias("vehicle", "car");
        let config = SentryConfig { labels, ..SentryConfig::default() };
        let mut d = Dispatcher::new(config).unwrap();

        let out = d.process_frame(4, &[det("vehicle", 0, 0, 200, 100)]).unwrap();
        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].file_name(), "frame_4_car_0.jpg");
    }
}
