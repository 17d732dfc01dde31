//! Session configuration.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::matching::MatchPolicy;
use crate::overlay::ColorPalette;
use crate::registry::DEFAULT_IOU_THRESHOLD;
use crate::{Error, ObjectClass, Result};

/// Detector vocabulary: which labels play which role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassLabels {
    /// Canonical person label.
    pub person: String,

    /// Canonical protective headgear label.
    pub headgear: String,

    /// Canonical vehicle label.
    pub vehicle: String,

    /// More labels tracked and cropped like vehicles.
    pub extra_tracked: Vec<String>,

    /// Detector label -> canonical label (e.g. "pessoa" -> "person").
    pub aliases: HashMap<String, String>,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self {
            person: "person".to_string(),
            headgear: "helmet".to_string(),
            vehicle: "vehicle".to_string(),
            extra_tracked: Vec::new(),
            aliases: HashMap::new(),
        }
    }
}

impl ClassLabels {
    /// Add an alias mapping a detector label to a canonical one.
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    /// Canonical form of a detector label (the label itself if not aliased).
    pub fn canonical<'a>(&'a self, label: &'a str) -> &'a str {
        self.aliases.get(label).map_or(label, String::as_str)
    }

    /// Role of a detector label.
    pub fn classify(&self, label: &str) -> ObjectClass {
        let label = self.canonical(label);
        if label == self.person {
            ObjectClass::Person
        } else if label == self.headgear {
            ObjectClass::Headgear
        } else if label == self.vehicle {
            ObjectClass::Vehicle
        } else if self.extra_tracked.iter().any(|l| l == label) {
            ObjectClass::Tracked(label.to_string())
        } else {
            ObjectClass::Other
        }
    }

    /// Registry key for a tracked class, `None` for untracked ones.
    pub fn registry_label<'a>(&'a self, class: &'a ObjectClass) -> Option<&'a str> {
        match class {
            ObjectClass::Person => Some(self.person.as_str()),
            ObjectClass::Vehicle => Some(self.vehicle.as_str()),
            ObjectClass::Tracked(label) => Some(label.as_str()),
            ObjectClass::Headgear | ObjectClass::Other => None,
        }
    }

    fn validate(&self) -> Result<()> {
        let roles = [&self.person, &self.headgear, &self.vehicle];
        if roles.iter().any(|l| l.is_empty()) || self.extra_tracked.iter().any(String::is_empty) {
            return Err(Error::InvalidConfig("class labels must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for label in roles.into_iter().chain(self.extra_tracked.iter()) {
            if !seen.insert(label.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "label '{}' is assigned to more than one role",
                    label
                )));
            }
        }

        if let Some(from) = self.aliases.keys().find(|from| seen.contains(from.as_str())) {
            return Err(Error::InvalidConfig(format!(
                "alias '{}' shadows a canonical label",
                from
            )));
        }

        Ok(())
    }
}

/// Configuration for a [`crate::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// IoU a detection must exceed to match an existing identity.
    pub iou_threshold: f64,

    /// Tie-break between several identities above the threshold.
    pub match_policy: MatchPolicy,

    /// Frames after which an unseen identity stops being matched.
    /// `None` keeps every identity matchable for the whole session.
    pub dormant_after: Option<u64>,

    pub labels: ClassLabels,

    pub palette: ColorPalette,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            match_policy: MatchPolicy::FirstMatch,
            dormant_after: None,
            labels: ClassLabels::default(),
            palette: ColorPalette::default(),
        }
    }
}

impl SentryConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SentryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Check value ranges and label consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.iou_threshold.is_finite() || !(0.0..1.0).contains(&self.iou_threshold) {
            return Err(Error::InvalidConfig(format!(
                "iou_threshold must be in [0, 1), got {}",
                self.iou_threshold
            )));
        }

        if self.dormant_after == Some(0) {
            return Err(Error::InvalidConfig(
                "dormant_after must be at least 1 frame".to_string(),
            ));
        }

        self.labels.validate()
    }
}
